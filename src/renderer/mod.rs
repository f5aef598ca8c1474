//! Video renderer
//!
//! [`VideoRenderer`] is the context object the host creates once and threads
//! through every call. It holds at most one live session at a time:
//!
//! ```text
//! init ─▶ READY ─start─▶ PLAYING ─stop/error─▶ NULL ─destroy─▶ (no session)
//! ```
//!
//! NULL is terminal for a session. Streaming again takes `destroy` + `init`.
//!
//! Lifecycle calls take `&mut self` and belong to one control thread.
//! `submit_buffer` takes `&self` and does not lock anything of its own; a host
//! feeding buffers from another thread shares the renderer behind its own
//! mutex, which also serializes submissions against `stop`/`destroy`.

mod bus;
mod window;

pub use bus::HostLoop;

use crate::config::RendererConfig;
use crate::engine::{EngineBus, EnginePipeline, IngestStage, MediaEngine, SinkStage, WatchToken};
use crate::error::{EngineError, RendererError};
use crate::logger::LogSink;
use crate::pipeline::{
    AccessUnit, Geometry, H264_INGEST_CAPS, INGEST_STAGE, PipelineBuilder, PipelineDescription,
    PipelineState, RenderStats, SINK_STAGE, StatsSummary, is_decrypted,
};
use crate::utils::SignalOfStop;
use bus::BusWatcher;
use log::Level;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use window::WindowAssociation;

/// What happened to a submitted buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Handed to the ingest stage
    Forwarded,
    /// Decrypt stage flagged the payload as invalid
    DroppedUndecrypted,
    /// Nothing to submit
    DroppedEmpty,
    /// The ingest stage refused the buffer
    PushFailed,
    /// No live session
    NoSession,
}

/// Engine objects shared between the renderer and its bus watcher.
///
/// Fields drop in declaration order, which is the release order: bus, sink,
/// ingest, pipeline.
pub(crate) struct Session {
    bus: OnceLock<Arc<dyn EngineBus>>,
    sink: Arc<dyn SinkStage>,
    ingest: Arc<dyn IngestStage>,
    pipeline: Arc<dyn EnginePipeline>,
    /// Last state the renderer asked the engine for
    requested: Mutex<PipelineState>,
}

impl Session {
    fn is_null(&self) -> bool {
        self.pipeline.current_state() == Some(PipelineState::Null)
    }

    fn requested(&self) -> MutexGuard<'_, PipelineState> {
        self.requested.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask the engine for `target` if the session may get there from where it
    /// was last sent. Once NULL has been requested the session is over.
    fn transition(&self, target: PipelineState) -> Result<(), RendererError> {
        let mut requested = self.requested();
        if !requested.can_transition_to(&target) {
            return Err(match *requested {
                PipelineState::Null => RendererError::Terminated,
                from => EngineError::StateChange(format!("{} (from {})", target, from)).into(),
            });
        }
        self.pipeline.set_state(target)?;
        *requested = target;
        Ok(())
    }

    /// NULL is always reachable and ends the session even if the engine
    /// reports a failure.
    fn force_null(&self) -> Result<(), EngineError> {
        *self.requested() = PipelineState::Null;
        self.pipeline.set_state(PipelineState::Null)
    }
}

/// The live session.
struct RendererHandle {
    session: Arc<Session>,
    description: PipelineDescription,
    window: Option<WindowAssociation>,
    first_buffer: AtomicBool,
    stats: RenderStats,
    stop: SignalOfStop,
}

pub struct VideoRenderer {
    engine: Arc<dyn MediaEngine>,
    logger: Arc<dyn LogSink>,
    handle: Option<RendererHandle>,
    geometry: Option<Geometry>,
}

impl VideoRenderer {
    pub fn new(engine: Arc<dyn MediaEngine>, logger: Arc<dyn LogSink>) -> Self {
        Self {
            engine,
            logger,
            handle: None,
            geometry: None,
        }
    }

    fn log(&self, level: Level, message: &str) {
        self.logger.log(level, message);
    }

    /// Build the pipeline for `config` and bring it to READY.
    ///
    /// A [`RendererError::Construction`] means the configured stage graph is
    /// unusable. That is a host configuration defect, not a transient
    /// condition: fix the stage names, do not retry.
    pub fn init(&mut self, config: &RendererConfig) -> Result<(), RendererError> {
        if self.handle.is_some() {
            return Err(RendererError::AlreadyInitialized);
        }

        // on-screen sinks title their window after the application name
        if self.engine.application_name().as_deref() != Some(config.server_name.as_str()) {
            self.engine.set_application_name(&config.server_name);
        }

        let description = PipelineBuilder::from_config(config).build();
        self.log(
            Level::Debug,
            &format!("video pipeline will be:\n\"{}\"", description),
        );

        let pipeline = self.engine.construct(&description).map_err(|source| {
            self.log(
                Level::Error,
                &format!("failed to construct video pipeline: {}", source),
            );
            RendererError::Construction {
                launch: description.to_launch(),
                source,
            }
        })?;

        let (ingest, sink) = resolve_stages(pipeline.as_ref())
            .inspect_err(|e| self.log(Level::Error, &e.to_string()))?;

        let stop = SignalOfStop::new();
        let window = config.is_onscreen_sink().then(|| {
            WindowAssociation::attach(
                sink.as_ref(),
                &config.server_name,
                stop.clone(),
                Arc::clone(&self.logger),
            )
        });

        if let Err(e) = pipeline.set_state(PipelineState::Ready) {
            self.log(Level::Error, &e.to_string());
        }
        match pipeline.current_state() {
            Some(PipelineState::Ready) => self.log(Level::Debug, "Initialized video renderer"),
            _ => self.log(Level::Error, "Failed to initialize video renderer"),
        }

        self.handle = Some(RendererHandle {
            session: Arc::new(Session {
                bus: OnceLock::new(),
                sink,
                ingest,
                pipeline,
                requested: Mutex::new(PipelineState::Ready),
            }),
            description,
            window,
            first_buffer: AtomicBool::new(false),
            stats: RenderStats::new(),
            stop,
        });

        Ok(())
    }

    /// Record the session's source and display dimensions.
    ///
    /// Nothing in the pipeline consumes them; they are kept for diagnostics.
    pub fn set_geometry(&mut self, width_source: f32, height_source: f32, width: f32, height: f32) {
        let geometry = Geometry::from_f32(width_source, height_source, width, height);
        self.log(
            Level::Debug,
            &format!("begin video stream {}", geometry),
        );
        self.geometry = Some(geometry);
    }

    pub fn geometry(&self) -> Option<Geometry> {
        self.geometry
    }

    /// READY to PLAYING. Also acquires the bus and arms the first-buffer log.
    pub fn start(&mut self) -> Result<(), RendererError> {
        let handle = self.handle.as_ref().ok_or(RendererError::NotInitialized)?;
        let session = &handle.session;

        session.transition(PipelineState::Playing)?;
        if session.bus.get().is_none() {
            let bus = session.pipeline.bus().ok_or(EngineError::Bus)?;
            let _ = session.bus.set(bus);
        }
        handle.first_buffer.store(true, Ordering::Release);

        Ok(())
    }

    /// Hand one access unit to the pipeline.
    ///
    /// Never blocks and never retries. A payload whose first byte is not zero
    /// was not decrypted upstream: it is logged once and dropped.
    pub fn submit_buffer(&self, payload: &[u8], pts: u64, nal_count: u32) -> SubmitOutcome {
        let Some(handle) = &self.handle else {
            return SubmitOutcome::NoSession;
        };

        if payload.is_empty() {
            self.log(Level::Error, "*** ERROR empty video packet");
            handle.stats.record_empty_payload();
            return SubmitOutcome::DroppedEmpty;
        }
        if !is_decrypted(payload) {
            self.log(Level::Error, "*** ERROR decryption of video packet failed");
            handle.stats.record_decrypt_failure();
            return SubmitOutcome::DroppedUndecrypted;
        }

        if handle.first_buffer.swap(false, Ordering::AcqRel) {
            self.log(Level::Info, "Begin streaming to video pipeline");
        }

        match handle.session.ingest.push(payload, pts) {
            Ok(()) => {
                handle.stats.record_forwarded(payload.len());
                SubmitOutcome::Forwarded
            }
            Err(e) => {
                handle.stats.record_push_failure();
                self.log(
                    Level::Error,
                    &format!(
                        "video buffer with pts {} ({} NAL units) not accepted: {}",
                        pts, nal_count, e
                    ),
                );
                SubmitOutcome::PushFailed
            }
        }
    }

    pub fn submit_access_unit(&self, unit: &AccessUnit) -> SubmitOutcome {
        self.submit_buffer(&unit.data, unit.pts, unit.nal_count)
    }

    /// Draining is left to the engine.
    pub fn flush(&self) {}

    /// Signal end-of-stream and force NULL. Does nothing without a session or
    /// when the pipeline is already NULL.
    pub fn stop(&mut self) {
        let Some(handle) = &self.handle else {
            return;
        };
        if handle.session.is_null() {
            return;
        }
        self.shutdown(&handle.session);
    }

    fn shutdown(&self, session: &Session) {
        if let Err(e) = session.ingest.end_of_stream() {
            self.log(
                Level::Debug,
                &format!("end-of-stream not accepted: {}", e),
            );
        }
        if let Err(e) = session.force_null() {
            self.log(Level::Error, &e.to_string());
        }
    }

    /// Tear the session down and release every engine object. Idempotent.
    pub fn destroy(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        // bus watcher and window subscription turn into no-ops from here on
        handle.stop.cancel();

        if !handle.session.is_null() {
            self.shutdown(&handle.session);
        }

        let stats = handle.stats.summary();
        let sink = handle.session.sink.factory_name();
        drop(handle);

        self.log(
            Level::Debug,
            &format!("video renderer ({}) destroyed: {}", sink, stats),
        );
    }

    /// Watch the pipeline bus on behalf of `host`. Requires a started session.
    ///
    /// The watch stays installed until the returned token is dropped, the
    /// session is destroyed, or the engine removes it.
    pub fn register_bus_watch(&self, host: Arc<dyn HostLoop>) -> Result<WatchToken, RendererError> {
        let handle = self.handle.as_ref().ok_or(RendererError::NotInitialized)?;
        let bus = handle
            .session
            .bus
            .get()
            .ok_or(RendererError::NotStarted)?;

        let watcher = BusWatcher::new(
            Arc::downgrade(&handle.session),
            host,
            Arc::clone(&self.logger),
            handle.stop.clone(),
        );
        Ok(bus.add_watch(watcher.into_handler())?)
    }

    /// Not implemented for this backend.
    pub fn update_background(&self, _mode: i32) {}

    pub fn is_live(&self) -> bool {
        self.handle.is_some()
    }

    /// Engine state of the live session.
    pub fn state(&self) -> Option<PipelineState> {
        self.handle
            .as_ref()
            .and_then(|handle| handle.session.pipeline.current_state())
    }

    pub fn description(&self) -> Option<&PipelineDescription> {
        self.handle.as_ref().map(|handle| &handle.description)
    }

    pub fn stats(&self) -> Option<StatsSummary> {
        self.handle.as_ref().map(|handle| handle.stats.summary())
    }

    /// Whether the display window has been titled. `None` when the sink is
    /// not an on-screen one or there is no session.
    pub fn window_titled(&self) -> Option<bool> {
        self.handle
            .as_ref()
            .and_then(|handle| handle.window.as_ref())
            .map(WindowAssociation::is_titled)
    }
}

/// Look up the ingest and display stages and configure the ingest media type.
fn resolve_stages(
    pipeline: &dyn EnginePipeline,
) -> Result<(Arc<dyn IngestStage>, Arc<dyn SinkStage>), RendererError> {
    let ingest = pipeline
        .ingest(INGEST_STAGE)
        .ok_or(RendererError::MissingStage(INGEST_STAGE))?;
    ingest.set_caps(&H264_INGEST_CAPS)?;

    let sink = pipeline
        .sink(SINK_STAGE)
        .ok_or(RendererError::MissingStage(SINK_STAGE))?;

    Ok((ingest, sink))
}

impl Drop for VideoRenderer {
    fn drop(&mut self) {
        self.destroy();
    }
}
