//! Video renderer of a screen-mirroring receiver.
//!
//! The host hands over decrypted H.264 access units; the renderer feeds them
//! into a media engine pipeline (ingest, parse, decode, convert, optional
//! flip/rotate, display) and watches that pipeline's bus for errors.
//!
//! The engine is reached through the traits in [`engine`]. The GStreamer
//! backend is behind the `gstreamer` feature; [`engine::mock`] is always
//! available.

pub mod config;
pub mod engine;
pub mod error;
pub mod logger;
pub mod pipeline;
pub mod renderer;
pub mod stream;
pub mod utils;

pub use config::RendererConfig;
pub use error::{EngineError, RendererError};
pub use logger::{LogFacade, LogSink};
pub use renderer::{HostLoop, SubmitOutcome, VideoRenderer};
