//! Pipeline description layer
//!
//! Everything the renderer needs to know about the pipeline before an engine
//! gets involved:
//! - `orientation`: (flip, rotation) to transform method
//! - `builder`: ordered stage descriptors and their launch syntax
//! - `state`: engine state machine as seen by a session
//! - `types`: access units, ingest media type, geometry
//! - `health`: submission counters

pub mod builder;
pub mod health;
pub mod orientation;
pub mod state;
pub mod types;

pub use builder::{INGEST_STAGE, PipelineBuilder, PipelineDescription, SINK_STAGE, StageDescriptor};
pub use health::{RenderStats, StatsSummary};
pub use orientation::{Flip, FlipMethod, Rotation, transform_for};
pub use state::PipelineState;
pub use types::{AccessUnit, Geometry, H264_INGEST_CAPS, MediaCaps, is_decrypted};
