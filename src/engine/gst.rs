//! GStreamer backend
//!
//! The stage list is rendered to launch syntax and parsed by GStreamer in one
//! go, so unknown element names and bad properties are reported by
//! `gst::parse::launch` at construction time.

use super::{
    BusHandler, BusMessage, EngineBus, EnginePipeline, IngestStage, MediaEngine, SinkStage,
    WatchControl, WatchToken, WindowCallback,
};
use crate::error::EngineError;
use crate::pipeline::{MediaCaps, PipelineDescription, PipelineState};
use crate::renderer::HostLoop;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use std::sync::{Arc, Mutex};

/// Element message posted by video sinks right before they create a window.
const PREPARE_WINDOW_HANDLE: &str = "prepare-window-handle";

pub struct GstEngine;

impl GstEngine {
    /// Initialize GStreamer. Safe to call repeatedly.
    pub fn new() -> Result<Self, EngineError> {
        gst::init().map_err(|e| EngineError::Other(e.to_string()))?;
        Ok(GstEngine)
    }
}

impl MediaEngine for GstEngine {
    fn construct(
        &self,
        description: &PipelineDescription,
    ) -> Result<Arc<dyn EnginePipeline>, EngineError> {
        let pipeline = gst::parse::launch(&description.to_launch())
            .map_err(|e| EngineError::Construction(e.to_string()))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| EngineError::Construction("not a pipeline".to_string()))?;

        Ok(Arc::new(GstPipeline { pipeline }))
    }

    fn application_name(&self) -> Option<String> {
        glib::application_name().map(|name| name.to_string())
    }

    fn set_application_name(&self, name: &str) {
        glib::set_application_name(name);
    }
}

struct GstPipeline {
    pipeline: gst::Pipeline,
}

impl EnginePipeline for GstPipeline {
    fn ingest(&self, name: &str) -> Option<Arc<dyn IngestStage>> {
        let appsrc = self
            .pipeline
            .by_name(name)
            .and_then(|element| element.downcast::<gst_app::AppSrc>().ok())?;
        Some(Arc::new(GstIngest { appsrc }))
    }

    fn sink(&self, name: &str) -> Option<Arc<dyn SinkStage>> {
        let element = self.pipeline.by_name(name)?;
        let sink = GstSink {
            element,
            window: Arc::new(Mutex::new(None)),
        };

        // the window message is posted from the sink's streaming thread; a
        // sync handler catches it there instead of polling on the data path
        if let Some(bus) = self.pipeline.bus() {
            let watched = sink.clone();
            bus.set_sync_handler(move |_bus, message| {
                if is_window_message(message) {
                    let callback = watched.window.lock().ok().and_then(|mut slot| slot.take());
                    if let Some(callback) = callback {
                        callback(&watched);
                    }
                }
                gst::BusSyncReply::Pass
            });
        }

        Some(Arc::new(sink))
    }

    fn set_state(&self, state: PipelineState) -> Result<(), EngineError> {
        self.pipeline
            .set_state(to_gst_state(state))
            .map(|_| ())
            .map_err(|e| EngineError::StateChange(format!("{} ({})", state, e)))
    }

    fn current_state(&self) -> Option<PipelineState> {
        let (result, current, _pending) = self.pipeline.state(gst::ClockTime::ZERO);
        result.ok().map(|_| from_gst_state(current))
    }

    fn bus(&self) -> Option<Arc<dyn EngineBus>> {
        self.pipeline
            .bus()
            .map(|bus| Arc::new(GstBus { bus }) as Arc<dyn EngineBus>)
    }
}

impl Drop for GstPipeline {
    fn drop(&mut self) {
        if let Some(bus) = self.pipeline.bus() {
            bus.unset_sync_handler();
        }
    }
}

struct GstIngest {
    appsrc: gst_app::AppSrc,
}

impl IngestStage for GstIngest {
    fn set_caps(&self, caps: &MediaCaps) -> Result<(), EngineError> {
        let mut builder = gst::Caps::builder(caps.media_type);
        for (key, value) in caps.fields {
            builder = builder.field(*key, *value);
        }
        self.appsrc.set_caps(Some(&builder.build()));
        Ok(())
    }

    fn push(&self, data: &[u8], pts: u64) -> Result<(), EngineError> {
        let mut buffer =
            gst::Buffer::with_size(data.len()).map_err(|e| EngineError::Flow(e.to_string()))?;
        {
            let buffer = buffer
                .get_mut()
                .ok_or_else(|| EngineError::Flow("buffer is not writable".to_string()))?;
            buffer.set_pts(gst::ClockTime::from_nseconds(pts));
            buffer
                .copy_from_slice(0, data)
                .map_err(|copied| EngineError::Flow(format!("copied {} of {} bytes", copied, data.len())))?;
        }

        self.appsrc
            .push_buffer(buffer)
            .map(|_| ())
            .map_err(|e| EngineError::Flow(format!("{:?}", e)))
    }

    fn end_of_stream(&self) -> Result<(), EngineError> {
        self.appsrc
            .end_of_stream()
            .map(|_| ())
            .map_err(|e| EngineError::Flow(format!("{:?}", e)))
    }
}

#[derive(Clone)]
struct GstSink {
    element: gst::Element,
    window: Arc<Mutex<Option<WindowCallback>>>,
}

impl SinkStage for GstSink {
    fn factory_name(&self) -> String {
        self.element
            .factory()
            .map(|factory| factory.name().to_string())
            .unwrap_or_default()
    }

    fn on_window_created(&self, callback: WindowCallback) {
        if let Ok(mut slot) = self.window.lock() {
            *slot = Some(callback);
        }
    }

    /// On-screen sinks title their window after the stream's title tag.
    fn set_window_title(&self, title: &str) -> Result<(), EngineError> {
        let mut tags = gst::TagList::new();
        tags.get_mut()
            .ok_or_else(|| EngineError::Other("tag list is not writable".to_string()))?
            .add::<gst::tags::Title>(&title, gst::TagMergeMode::Replace);

        let pad = self
            .element
            .static_pad("sink")
            .ok_or_else(|| EngineError::Other("sink has no sink pad".to_string()))?;

        if pad.send_event(gst::event::Tag::new(tags)) {
            Ok(())
        } else {
            Err(EngineError::Other("sink refused the title tag".to_string()))
        }
    }
}

struct GstBus {
    bus: gst::Bus,
}

impl EngineBus for GstBus {
    fn set_flushing(&self, flushing: bool) {
        self.bus.set_flushing(flushing);
    }

    fn add_watch(&self, handler: BusHandler) -> Result<WatchToken, EngineError> {
        let mut handler = handler;
        let guard = self
            .bus
            .add_watch(move |_bus, message| match handler(&to_bus_message(message)) {
                WatchControl::Continue => glib::ControlFlow::Continue,
                WatchControl::Remove => glib::ControlFlow::Break,
            })
            .map_err(|e| EngineError::Other(e.to_string()))?;

        Ok(WatchToken::new(guard))
    }
}

impl HostLoop for glib::MainLoop {
    fn quit(&self) {
        glib::MainLoop::quit(self);
    }
}

fn is_window_message(message: &gst::Message) -> bool {
    match message.view() {
        gst::MessageView::Element(element) => element
            .structure()
            .is_some_and(|s| s.has_name(PREPARE_WINDOW_HANDLE)),
        _ => false,
    }
}

fn to_bus_message(message: &gst::Message) -> BusMessage {
    match message.view() {
        gst::MessageView::Error(err) => BusMessage::Error {
            source: message.src().map(|src| src.path_string().to_string()),
            message: err.error().to_string(),
            debug: err.debug().map(|debug| debug.to_string()),
        },
        gst::MessageView::Eos(..) => BusMessage::Eos,
        _ => BusMessage::Other(format!("{:?}", message.type_())),
    }
}

fn to_gst_state(state: PipelineState) -> gst::State {
    match state {
        PipelineState::Null => gst::State::Null,
        PipelineState::Ready => gst::State::Ready,
        PipelineState::Paused => gst::State::Paused,
        PipelineState::Playing => gst::State::Playing,
    }
}

fn from_gst_state(state: gst::State) -> PipelineState {
    match state {
        gst::State::Ready => PipelineState::Ready,
        gst::State::Paused => PipelineState::Paused,
        gst::State::Playing => PipelineState::Playing,
        _ => PipelineState::Null,
    }
}
