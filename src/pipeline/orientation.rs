//! Orientation transform selection
//!
//! Maps the host's (flip, rotation) selector onto a single `videoflip` method.
//! The table is fixed: flips and rotations are not composed freely, each pair
//! has exactly one resulting method, and the identity pair yields no stage at
//! all so the pipeline stays minimal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mirror/invert selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flip {
    #[default]
    None,
    HFlip,
    VFlip,
    Invert,
}

/// Quarter-turn selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    #[default]
    None,
    Left,
    Right,
}

/// Operation performed by the transform stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlipMethod {
    Clockwise,
    Counterclockwise,
    Rotate180,
    HorizontalFlip,
    VerticalFlip,
    UpperLeftDiagonal,
    UpperRightDiagonal,
}

impl FlipMethod {
    /// Method name as understood by the `videoflip` element.
    pub fn as_str(&self) -> &'static str {
        match self {
            FlipMethod::Clockwise => "clockwise",
            FlipMethod::Counterclockwise => "counterclockwise",
            FlipMethod::Rotate180 => "rotate-180",
            FlipMethod::HorizontalFlip => "horizontal-flip",
            FlipMethod::VerticalFlip => "vertical-flip",
            FlipMethod::UpperLeftDiagonal => "upper-left-diagonal",
            FlipMethod::UpperRightDiagonal => "upper-right-diagonal",
        }
    }
}

impl fmt::Display for FlipMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Select the transform for a (flip, rotation) pair.
///
/// Returns `None` only for the identity pair, in which case the transform
/// stage must be left out of the pipeline.
pub fn transform_for(flip: Flip, rotation: Rotation) -> Option<FlipMethod> {
    use FlipMethod::*;

    match (flip, rotation) {
        (Flip::Invert, Rotation::Left) => Some(Clockwise),
        (Flip::Invert, Rotation::Right) => Some(Counterclockwise),
        (Flip::Invert, Rotation::None) => Some(Rotate180),

        (Flip::HFlip, Rotation::Left) => Some(UpperLeftDiagonal),
        (Flip::HFlip, Rotation::Right) => Some(UpperRightDiagonal),
        (Flip::HFlip, Rotation::None) => Some(HorizontalFlip),

        (Flip::VFlip, Rotation::Left) => Some(UpperRightDiagonal),
        (Flip::VFlip, Rotation::Right) => Some(UpperLeftDiagonal),
        (Flip::VFlip, Rotation::None) => Some(VerticalFlip),

        (Flip::None, Rotation::Left) => Some(Counterclockwise),
        (Flip::None, Rotation::Right) => Some(Clockwise),
        (Flip::None, Rotation::None) => None,
    }
}

/// Error returned when a flip or rotation selector cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} selector '{value}'")]
pub struct ParseOrientationError {
    kind: &'static str,
    value: String,
}

impl FromStr for Flip {
    type Err = ParseOrientationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Flip::None),
            "h" | "hflip" => Ok(Flip::HFlip),
            "v" | "vflip" => Ok(Flip::VFlip),
            "i" | "invert" => Ok(Flip::Invert),
            _ => Err(ParseOrientationError {
                kind: "flip",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for Rotation {
    type Err = ParseOrientationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Rotation::None),
            "l" | "left" => Ok(Rotation::Left),
            "r" | "right" => Ok(Rotation::Right),
            _ => Err(ParseOrientationError {
                kind: "rotation",
                value: s.to_string(),
            }),
        }
    }
}
