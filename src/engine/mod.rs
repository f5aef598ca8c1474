//! Media engine seam
//!
//! The renderer drives the decode/convert/display work through these traits
//! and never looks inside the engine. Two backends exist:
//! - `gst`: GStreamer, behind the `gstreamer` cargo feature
//! - `mock`: in-memory, records every call in order
//!
//! Handles are reference counted. Dropping the last `Arc` of a handle releases
//! the underlying engine object.

use crate::error::EngineError;
use crate::pipeline::{MediaCaps, PipelineDescription, PipelineState};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "gstreamer")]
pub mod gst;
pub mod mock;

/// Factory side of an engine.
pub trait MediaEngine: Send + Sync {
    /// Build a pipeline from an ordered stage list. Stage names are resolved
    /// here, so a bad name surfaces as [`EngineError::Construction`].
    fn construct(
        &self,
        description: &PipelineDescription,
    ) -> Result<Arc<dyn EnginePipeline>, EngineError>;

    /// Process-wide application name, used by on-screen sinks as window title
    fn application_name(&self) -> Option<String>;

    fn set_application_name(&self, name: &str);
}

/// A constructed pipeline.
pub trait EnginePipeline: Send + Sync {
    fn ingest(&self, name: &str) -> Option<Arc<dyn IngestStage>>;

    fn sink(&self, name: &str) -> Option<Arc<dyn SinkStage>>;

    fn set_state(&self, state: PipelineState) -> Result<(), EngineError>;

    /// Current state without waiting for pending transitions.
    /// `None` when the engine cannot tell.
    fn current_state(&self) -> Option<PipelineState>;

    fn bus(&self) -> Option<Arc<dyn EngineBus>>;
}

/// Entry point for encoded buffers.
pub trait IngestStage: Send + Sync {
    fn set_caps(&self, caps: &MediaCaps) -> Result<(), EngineError>;

    /// Copy `data` into a new engine buffer stamped with `pts` and queue it.
    /// Must not block; queuing and back-pressure belong to the engine.
    fn push(&self, data: &[u8], pts: u64) -> Result<(), EngineError>;

    fn end_of_stream(&self) -> Result<(), EngineError>;
}

/// Called once, with the sink, when the sink's display window comes to life.
pub type WindowCallback = Box<dyn FnOnce(&dyn SinkStage) + Send>;

/// Display stage.
pub trait SinkStage: Send + Sync {
    fn factory_name(&self) -> String;

    /// Subscribe to window creation. A later subscription replaces an earlier
    /// one that has not fired yet.
    fn on_window_created(&self, callback: WindowCallback);

    fn set_window_title(&self, title: &str) -> Result<(), EngineError>;
}

/// Bus messages the renderer cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMessage {
    Error {
        /// Path of the element that posted the error, when known
        source: Option<String>,
        message: String,
        debug: Option<String>,
    },
    Eos,
    /// Anything else, by message type name
    Other(String),
}

/// Whether a bus watch stays installed after handling a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchControl {
    Continue,
    Remove,
}

pub type BusHandler = Box<dyn FnMut(&BusMessage) -> WatchControl + Send>;

/// Asynchronous message channel of a pipeline.
pub trait EngineBus: Send + Sync {
    /// While flushing, pending and future messages are discarded.
    fn set_flushing(&self, flushing: bool);

    /// Install `handler`. It runs on whatever thread the engine dispatches
    /// bus messages from.
    fn add_watch(&self, handler: BusHandler) -> Result<WatchToken, EngineError>;
}

/// Keeps a bus watch installed. Dropping the token removes the watch.
#[must_use = "dropping the token removes the bus watch"]
pub struct WatchToken {
    _guard: Box<dyn Any + Send>,
}

impl WatchToken {
    pub fn new(guard: impl Any + Send) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }

    /// Remove the watch now.
    pub fn remove(self) {}
}

impl fmt::Debug for WatchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WatchToken")
    }
}
