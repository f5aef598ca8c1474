//! Pipeline topology
//!
//! Builds the ordered stage list
//!
//! ```text
//! ingest → queue → parser → decoder → converter → [videoflip] → sink
//! ```
//!
//! as typed descriptors. Stage names come from the host verbatim and are not
//! validated here; resolving them is the engine's job when the description is
//! handed over for construction.

use crate::config::RendererConfig;
use crate::pipeline::orientation::{Flip, FlipMethod, Rotation, transform_for};
use std::fmt;

/// Name of the stage buffers are pushed into.
pub const INGEST_STAGE: &str = "video_source";
/// Name of the display stage.
pub const SINK_STAGE: &str = "video_sink";

const INGEST_ELEMENT: &str = "appsrc";
const QUEUE_ELEMENT: &str = "queue";
const TRANSFORM_ELEMENT: &str = "videoflip";

/// One stage of the pipeline: an element (possibly carrying host-supplied
/// properties), an optional name and properties added by the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDescriptor {
    element: String,
    name: Option<String>,
    properties: Vec<(String, String)>,
}

impl StageDescriptor {
    pub fn new(element: impl Into<String>) -> Self {
        Self {
            element: element.into(),
            name: None,
            properties: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    pub fn element(&self) -> &str {
        &self.element
    }

    /// Factory name, i.e. the element text up to the first property.
    pub fn factory(&self) -> &str {
        self.element
            .split_whitespace()
            .next()
            .unwrap_or(self.element.as_str())
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Render the stage in the engine's launch syntax.
    pub fn to_launch(&self) -> String {
        let mut out = self.element.trim().to_string();
        if let Some(name) = &self.name {
            out.push_str(" name=");
            out.push_str(name);
        }
        for (key, value) in &self.properties {
            out.push(' ');
            out.push_str(key);
            out.push('=');
            out.push_str(value);
        }
        out
    }
}

/// Ordered stage list handed to the engine for construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDescription {
    stages: Vec<StageDescriptor>,
}

impl PipelineDescription {
    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    pub fn stage(&self, name: &str) -> Option<&StageDescriptor> {
        self.stages.iter().find(|s| s.name() == Some(name))
    }

    /// Index of the first stage built from `factory`.
    pub fn position(&self, factory: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.factory() == factory)
    }

    /// Method of the transform stage, if the pipeline has one.
    pub fn transform(&self) -> Option<&str> {
        self.stages
            .iter()
            .find(|s| s.factory() == TRANSFORM_ELEMENT)
            .and_then(|s| s.property("method"))
    }

    pub fn to_launch(&self) -> String {
        self.stages
            .iter()
            .map(StageDescriptor::to_launch)
            .collect::<Vec<_>>()
            .join(" ! ")
    }
}

impl fmt::Display for PipelineDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_launch())
    }
}

/// Assembles a [`PipelineDescription`] from stage names and orientation.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    parser: String,
    decoder: String,
    converter: String,
    sink: String,
    flip: Flip,
    rotation: Rotation,
}

impl PipelineBuilder {
    pub fn new(
        parser: impl Into<String>,
        decoder: impl Into<String>,
        converter: impl Into<String>,
        sink: impl Into<String>,
    ) -> Self {
        Self {
            parser: parser.into(),
            decoder: decoder.into(),
            converter: converter.into(),
            sink: sink.into(),
            flip: Flip::None,
            rotation: Rotation::None,
        }
    }

    pub fn from_config(config: &RendererConfig) -> Self {
        Self::new(
            config.parser.as_str(),
            config.decoder.as_str(),
            config.converter.as_str(),
            config.sink.as_str(),
        )
        .orientation(config.flip, config.rotation)
    }

    pub fn orientation(mut self, flip: Flip, rotation: Rotation) -> Self {
        self.flip = flip;
        self.rotation = rotation;
        self
    }

    pub fn transform(&self) -> Option<FlipMethod> {
        transform_for(self.flip, self.rotation)
    }

    pub fn build(&self) -> PipelineDescription {
        let mut stages = Vec::with_capacity(7);

        stages.push(
            StageDescriptor::new(INGEST_ELEMENT)
                .with_name(INGEST_STAGE)
                .with_property("stream-type", "0")
                .with_property("format", "GST_FORMAT_TIME")
                .with_property("is-live", "true"),
        );
        stages.push(StageDescriptor::new(QUEUE_ELEMENT));
        stages.push(StageDescriptor::new(self.parser.as_str()));
        stages.push(StageDescriptor::new(self.decoder.as_str()));
        stages.push(StageDescriptor::new(self.converter.as_str()));

        if let Some(method) = self.transform() {
            stages.push(
                StageDescriptor::new(TRANSFORM_ELEMENT).with_property("method", method.as_str()),
            );
        }

        stages.push(
            StageDescriptor::new(self.sink.as_str())
                .with_name(SINK_STAGE)
                .with_property("sync", "false"),
        );

        PipelineDescription { stages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_builder() -> PipelineBuilder {
        PipelineBuilder::new("h264parse", "decodebin", "videoconvert", "autovideosink")
    }

    #[test]
    fn test_identity_pipeline_has_no_transform() {
        let description = default_builder().build();

        assert_eq!(description.stages().len(), 6);
        assert_eq!(description.transform(), None);
        assert_eq!(
            description.to_launch(),
            "appsrc name=video_source stream-type=0 format=GST_FORMAT_TIME is-live=true ! queue ! \
             h264parse ! decodebin ! videoconvert ! autovideosink name=video_sink sync=false"
        );
    }

    #[test]
    fn test_transform_between_converter_and_sink() {
        let description = default_builder()
            .orientation(Flip::HFlip, Rotation::Right)
            .build();

        assert_eq!(description.transform(), Some("upper-right-diagonal"));

        let converter = description.position("videoconvert").unwrap();
        let transform = description.position("videoflip").unwrap();
        let sink = description.position("autovideosink").unwrap();
        assert_eq!(transform, converter + 1);
        assert_eq!(sink, transform + 1);
        assert!(description
            .to_launch()
            .contains("videoconvert ! videoflip method=upper-right-diagonal ! autovideosink"));
    }

    #[test]
    fn test_named_stages() {
        let description = default_builder().build();

        let ingest = description.stage(INGEST_STAGE).unwrap();
        assert_eq!(ingest.factory(), "appsrc");
        assert_eq!(ingest.property("is-live"), Some("true"));

        let sink = description.stage(SINK_STAGE).unwrap();
        assert_eq!(sink.factory(), "autovideosink");
        assert_eq!(sink.property("sync"), Some("false"));
    }

    #[test]
    fn test_stage_names_are_passed_verbatim() {
        let description = PipelineBuilder::new(
            "h264parse",
            "vaapih264dec low-latency=true",
            "videoconvert",
            "waylandsink fullscreen=true",
        )
        .build();

        let sink = description.stage(SINK_STAGE).unwrap();
        assert_eq!(sink.factory(), "waylandsink");
        assert_eq!(
            sink.to_launch(),
            "waylandsink fullscreen=true name=video_sink sync=false"
        );
        assert_eq!(description.position("vaapih264dec"), Some(3));
    }
}
