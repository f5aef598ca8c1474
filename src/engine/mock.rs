//! In-memory engine
//!
//! Builds nothing and decodes nothing: every call is appended to a shared
//! journal so a headless host or a test can see exactly what the renderer
//! asked for, in order. Bus messages and window creation are driven by hand
//! through [`MockEngine::post`] and [`MockEngine::materialize_window`].

use super::{
    BusHandler, BusMessage, EngineBus, EnginePipeline, IngestStage, MediaEngine, SinkStage,
    WatchControl, WatchToken, WindowCallback,
};
use crate::error::EngineError;
use crate::pipeline::{INGEST_STAGE, MediaCaps, PipelineDescription, PipelineState, SINK_STAGE};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    SetApplicationName(String),
    Construct(String),
    SetCaps(String),
    SetState(PipelineState),
    Push { data: Vec<u8>, pts: u64 },
    EndOfStream,
    SetFlushing(bool),
    WatchAdded,
    WatchRemoved,
    WindowTitle(String),
    /// An engine object was released: "pipeline", "ingest", "sink" or "bus"
    Released(&'static str),
}

#[derive(Default)]
struct Shared {
    journal: Mutex<Vec<EngineCall>>,
    application_name: Mutex<Option<String>>,
    fail_on: Mutex<Option<String>>,
    reject_push: AtomicBool,
    reject_caps: AtomicBool,
    reject_title: AtomicBool,
    missing_stage: Mutex<Option<String>>,
    refused_state: Mutex<Option<PipelineState>>,
    bus: Mutex<Weak<MockBus>>,
    sink: Mutex<Weak<MockSink>>,
}

impl Shared {
    fn record(&self, call: EngineCall) {
        if let Ok(mut journal) = self.journal.lock() {
            journal.push(call);
        }
    }

    fn is_missing(&self, name: &str) -> bool {
        self.missing_stage
            .lock()
            .map(|missing| missing.as_deref() == Some(name))
            .unwrap_or(false)
    }

    fn is_refused(&self, state: PipelineState) -> bool {
        self.refused_state
            .lock()
            .map(|refused| *refused == Some(state))
            .unwrap_or(false)
    }
}

/// Recording engine.
#[derive(Clone, Default)]
pub struct MockEngine {
    shared: Arc<Shared>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make construction fail whenever a stage uses `factory`, the way an
    /// engine fails on an element it does not know.
    pub fn failing_on(self, factory: impl Into<String>) -> Self {
        if let Ok(mut fail_on) = self.shared.fail_on.lock() {
            *fail_on = Some(factory.into());
        }
        self
    }

    /// Make every push fail as if the ingest stage were flushing.
    pub fn rejecting_pushes(self) -> Self {
        self.shared.reject_push.store(true, Ordering::SeqCst);
        self
    }

    /// Make every caps negotiation fail.
    pub fn rejecting_caps(self) -> Self {
        self.shared.reject_caps.store(true, Ordering::SeqCst);
        self
    }

    /// Make every window title write fail.
    pub fn rejecting_titles(self) -> Self {
        self.shared.reject_title.store(true, Ordering::SeqCst);
        self
    }

    /// Build pipelines whose stage `name` cannot be looked up.
    pub fn without_stage(self, name: impl Into<String>) -> Self {
        if let Ok(mut missing) = self.shared.missing_stage.lock() {
            *missing = Some(name.into());
        }
        self
    }

    /// Refuse every change to `state`; the pipeline stays where it was.
    pub fn refusing_state(self, state: PipelineState) -> Self {
        if let Ok(mut refused) = self.shared.refused_state.lock() {
            *refused = Some(state);
        }
        self
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.shared
            .journal
            .lock()
            .map(|journal| journal.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, predicate: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    /// Buffers that reached the ingest stage, as (data, pts).
    pub fn pushed(&self) -> Vec<(Vec<u8>, u64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Push { data, pts } => Some((data, pts)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut journal) = self.shared.journal.lock() {
            journal.clear();
        }
    }

    /// Deliver `message` on the bus of the last constructed pipeline.
    ///
    /// Returns `None` when the message was not delivered: no live bus, no
    /// watch installed, or the bus is flushing.
    pub fn post(&self, message: BusMessage) -> Option<WatchControl> {
        let bus = self.shared.bus.lock().ok()?.upgrade()?;
        bus.dispatch(&message)
    }

    /// Let the sink of the last constructed pipeline open its window.
    /// Returns whether a subscriber was notified.
    pub fn materialize_window(&self) -> bool {
        let Some(sink) = self.shared.sink.lock().ok().and_then(|s| s.upgrade()) else {
            return false;
        };
        let callback = sink.window.lock().ok().and_then(|mut slot| slot.take());
        match callback {
            Some(callback) => {
                callback(sink.as_ref());
                true
            }
            None => false,
        }
    }

    /// Whether the bus of the last constructed pipeline still exists.
    pub fn bus_alive(&self) -> bool {
        self.shared
            .bus
            .lock()
            .map(|bus| bus.strong_count() > 0)
            .unwrap_or(false)
    }
}

impl MediaEngine for MockEngine {
    fn construct(
        &self,
        description: &PipelineDescription,
    ) -> Result<Arc<dyn EnginePipeline>, EngineError> {
        self.shared
            .record(EngineCall::Construct(description.to_launch()));

        let fail_on = self.shared.fail_on.lock().ok().and_then(|f| f.clone());
        if let Some(factory) = fail_on
            && description.position(&factory).is_some()
        {
            return Err(EngineError::Construction(format!(
                "no element \"{}\"",
                factory
            )));
        }

        let ingest = description.stage(INGEST_STAGE).map(|_| {
            Arc::new(MockIngest {
                shared: self.shared.clone(),
            })
        });
        let sink = description.stage(SINK_STAGE).map(|stage| {
            Arc::new(MockSink {
                shared: self.shared.clone(),
                factory: stage.factory().to_string(),
                window: Mutex::new(None),
            })
        });
        let bus = Arc::new_cyclic(|me| MockBus {
            me: me.clone(),
            shared: self.shared.clone(),
            flushing: AtomicBool::new(false),
            handler: Mutex::new(None),
        });

        if let Ok(mut slot) = self.shared.bus.lock() {
            *slot = Arc::downgrade(&bus);
        }
        if let (Some(sink), Ok(mut slot)) = (&sink, self.shared.sink.lock()) {
            *slot = Arc::downgrade(sink);
        }

        Ok(Arc::new(MockPipeline {
            shared: self.shared.clone(),
            state: Mutex::new(PipelineState::Null),
            ingest,
            sink,
            bus,
        }))
    }

    fn application_name(&self) -> Option<String> {
        self.shared
            .application_name
            .lock()
            .ok()
            .and_then(|name| name.clone())
    }

    fn set_application_name(&self, name: &str) {
        self.shared
            .record(EngineCall::SetApplicationName(name.to_string()));
        if let Ok(mut slot) = self.shared.application_name.lock() {
            *slot = Some(name.to_string());
        }
    }
}

struct MockPipeline {
    shared: Arc<Shared>,
    state: Mutex<PipelineState>,
    ingest: Option<Arc<MockIngest>>,
    sink: Option<Arc<MockSink>>,
    bus: Arc<MockBus>,
}

impl EnginePipeline for MockPipeline {
    fn ingest(&self, name: &str) -> Option<Arc<dyn IngestStage>> {
        if name != INGEST_STAGE || self.shared.is_missing(name) {
            return None;
        }
        self.ingest
            .clone()
            .map(|ingest| ingest as Arc<dyn IngestStage>)
    }

    fn sink(&self, name: &str) -> Option<Arc<dyn SinkStage>> {
        if name != SINK_STAGE || self.shared.is_missing(name) {
            return None;
        }
        self.sink.clone().map(|sink| sink as Arc<dyn SinkStage>)
    }

    fn set_state(&self, state: PipelineState) -> Result<(), EngineError> {
        self.shared.record(EngineCall::SetState(state));
        if self.shared.is_refused(state) {
            return Err(EngineError::StateChange(state.to_string()));
        }
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
        Ok(())
    }

    fn current_state(&self) -> Option<PipelineState> {
        self.state.lock().ok().map(|state| *state)
    }

    fn bus(&self) -> Option<Arc<dyn EngineBus>> {
        Some(self.bus.clone() as Arc<dyn EngineBus>)
    }
}

impl Drop for MockPipeline {
    fn drop(&mut self) {
        self.shared.record(EngineCall::Released("pipeline"));
    }
}

struct MockIngest {
    shared: Arc<Shared>,
}

impl IngestStage for MockIngest {
    fn set_caps(&self, caps: &MediaCaps) -> Result<(), EngineError> {
        self.shared.record(EngineCall::SetCaps(caps.to_string()));
        if self.shared.reject_caps.load(Ordering::SeqCst) {
            return Err(EngineError::Other("caps not accepted".to_string()));
        }
        Ok(())
    }

    fn push(&self, data: &[u8], pts: u64) -> Result<(), EngineError> {
        if self.shared.reject_push.load(Ordering::SeqCst) {
            return Err(EngineError::Flow("flushing".to_string()));
        }
        self.shared.record(EngineCall::Push {
            data: data.to_vec(),
            pts,
        });
        Ok(())
    }

    fn end_of_stream(&self) -> Result<(), EngineError> {
        self.shared.record(EngineCall::EndOfStream);
        Ok(())
    }
}

impl Drop for MockIngest {
    fn drop(&mut self) {
        self.shared.record(EngineCall::Released("ingest"));
    }
}

struct MockSink {
    shared: Arc<Shared>,
    factory: String,
    window: Mutex<Option<WindowCallback>>,
}

impl SinkStage for MockSink {
    fn factory_name(&self) -> String {
        self.factory.clone()
    }

    fn on_window_created(&self, callback: WindowCallback) {
        if let Ok(mut slot) = self.window.lock() {
            *slot = Some(callback);
        }
    }

    fn set_window_title(&self, title: &str) -> Result<(), EngineError> {
        if self.shared.reject_title.load(Ordering::SeqCst) {
            return Err(EngineError::Other("window has no title property".to_string()));
        }
        self.shared
            .record(EngineCall::WindowTitle(title.to_string()));
        Ok(())
    }
}

impl Drop for MockSink {
    fn drop(&mut self) {
        self.shared.record(EngineCall::Released("sink"));
    }
}

struct MockBus {
    me: Weak<MockBus>,
    shared: Arc<Shared>,
    flushing: AtomicBool,
    handler: Mutex<Option<BusHandler>>,
}

impl MockBus {
    fn dispatch(&self, message: &BusMessage) -> Option<WatchControl> {
        if self.flushing.load(Ordering::SeqCst) {
            return None;
        }
        // run the handler unlocked, it may call back into the bus
        let mut handler = self.handler.lock().ok()?.take()?;
        let control = handler(message);
        if control == WatchControl::Continue
            && let Ok(mut slot) = self.handler.lock()
            && slot.is_none()
        {
            *slot = Some(handler);
        } else {
            self.shared.record(EngineCall::WatchRemoved);
        }
        Some(control)
    }

    fn remove_watch(&self) {
        let removed = self
            .handler
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .is_some();
        if removed {
            self.shared.record(EngineCall::WatchRemoved);
        }
    }
}

impl EngineBus for MockBus {
    fn set_flushing(&self, flushing: bool) {
        self.shared.record(EngineCall::SetFlushing(flushing));
        self.flushing.store(flushing, Ordering::SeqCst);
    }

    fn add_watch(&self, handler: BusHandler) -> Result<WatchToken, EngineError> {
        let mut slot = self
            .handler
            .lock()
            .map_err(|_| EngineError::Other("bus lock poisoned".to_string()))?;
        if slot.is_some() {
            return Err(EngineError::Other("bus already has a watch".to_string()));
        }
        *slot = Some(handler);
        drop(slot);

        self.shared.record(EngineCall::WatchAdded);
        Ok(WatchToken::new(MockWatchGuard {
            bus: self.me.clone(),
        }))
    }
}

impl Drop for MockBus {
    fn drop(&mut self) {
        self.shared.record(EngineCall::Released("bus"));
    }
}

struct MockWatchGuard {
    bus: Weak<MockBus>,
}

impl Drop for MockWatchGuard {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove_watch();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineBuilder;

    fn description() -> PipelineDescription {
        PipelineBuilder::new("h264parse", "decodebin", "videoconvert", "fakesink").build()
    }

    #[test]
    fn test_records_pushes() {
        let engine = MockEngine::new();
        let pipeline = engine.construct(&description()).unwrap();
        let ingest = pipeline.ingest(INGEST_STAGE).unwrap();

        ingest.push(&[0, 0, 0, 1, 0x65], 42).unwrap();

        assert_eq!(engine.pushed(), vec![(vec![0, 0, 0, 1, 0x65], 42)]);
        assert!(pipeline.ingest("other").is_none());
    }

    #[test]
    fn test_failing_factory() {
        let engine = MockEngine::new().failing_on("decodebin");
        assert!(matches!(
            engine.construct(&description()),
            Err(EngineError::Construction(_))
        ));
    }

    #[test]
    fn test_flushing_bus_discards_messages() {
        let engine = MockEngine::new();
        let pipeline = engine.construct(&description()).unwrap();
        let bus = pipeline.bus().unwrap();

        let _token = bus
            .add_watch(Box::new(|_| WatchControl::Continue))
            .unwrap();
        assert_eq!(engine.post(BusMessage::Eos), Some(WatchControl::Continue));

        bus.set_flushing(true);
        assert_eq!(engine.post(BusMessage::Eos), None);
    }

    #[test]
    fn test_watch_token_removes_watch() {
        let engine = MockEngine::new();
        let pipeline = engine.construct(&description()).unwrap();
        let bus = pipeline.bus().unwrap();

        let token = bus
            .add_watch(Box::new(|_| WatchControl::Continue))
            .unwrap();
        assert!(bus.add_watch(Box::new(|_| WatchControl::Continue)).is_err());

        token.remove();
        assert_eq!(engine.post(BusMessage::Eos), None);
        assert_eq!(engine.count(|c| *c == EngineCall::WatchRemoved), 1);
    }

    #[test]
    fn test_release_is_recorded() {
        let engine = MockEngine::new();
        let pipeline = engine.construct(&description()).unwrap();
        drop(pipeline);

        let released: Vec<_> = engine
            .calls()
            .into_iter()
            .filter(|c| matches!(c, EngineCall::Released(_)))
            .collect();
        assert_eq!(released.len(), 4);
        assert!(!engine.bus_alive());
    }

    #[test]
    fn test_missing_stage_and_refused_state() {
        let engine = MockEngine::new()
            .without_stage(INGEST_STAGE)
            .refusing_state(PipelineState::Ready);
        let pipeline = engine.construct(&description()).unwrap();

        assert!(pipeline.ingest(INGEST_STAGE).is_none());
        assert!(pipeline.sink(SINK_STAGE).is_some());
        assert!(pipeline.set_state(PipelineState::Ready).is_err());
        assert_eq!(pipeline.current_state(), Some(PipelineState::Null));
    }
}
