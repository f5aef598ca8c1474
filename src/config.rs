use crate::pipeline::orientation::{Flip, Rotation};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_PARSER: &str = "h264parse";
pub const DEFAULT_DECODER: &str = "decodebin";
pub const DEFAULT_CONVERTER: &str = "videoconvert";
pub const DEFAULT_SINK: &str = "autovideosink";

/// Sinks that open their own window on screen. Only these get their window
/// title rewritten to the server name.
pub const ONSCREEN_SINKS: [&str; 3] = ["autovideosink", "ximagesink", "xvimagesink"];

/// Host-supplied renderer configuration.
///
/// Stage names are free text and reach the engine untouched; the engine is
/// the only one validating them, when the pipeline is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Shown as the display window title
    pub server_name: String,
    pub flip: Flip,
    pub rotation: Rotation,
    pub parser: String,
    pub decoder: String,
    pub converter: String,
    pub sink: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        RendererConfig {
            server_name: app_name().to_string(),
            flip: Flip::None,
            rotation: Rotation::None,
            parser: DEFAULT_PARSER.to_string(),
            decoder: DEFAULT_DECODER.to_string(),
            converter: DEFAULT_CONVERTER.to_string(),
            sink: DEFAULT_SINK.to_string(),
        }
    }
}

impl RendererConfig {
    pub fn new(server_name: impl Into<String>) -> Self {
        RendererConfig {
            server_name: server_name.into(),
            ..Default::default()
        }
    }

    /// Load a JSON configuration; missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading renderer config {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing renderer config {}", path.display()))
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Whether the configured sink is one that opens its own window.
    pub fn is_onscreen_sink(&self) -> bool {
        ONSCREEN_SINKS.contains(&self.sink.trim())
    }
}

/// Returns a version as specified in Cargo.toml
pub fn app_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}
