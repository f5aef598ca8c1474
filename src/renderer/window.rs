//! Display window title
//!
//! On-screen sinks open their own window, titled after the program. Once that
//! window exists the renderer renames it to the server name, exactly once.
//! Purely cosmetic: failures are logged and otherwise ignored.

use crate::engine::SinkStage;
use crate::logger::LogSink;
use crate::utils::SignalOfStop;
use log::Level;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) struct WindowAssociation {
    titled: Arc<AtomicBool>,
}

impl WindowAssociation {
    /// Subscribe to the sink's window creation. The subscription is dropped
    /// without effect once `stop` is raised.
    pub(crate) fn attach(
        sink: &dyn SinkStage,
        title: &str,
        stop: SignalOfStop,
        logger: Arc<dyn LogSink>,
    ) -> Self {
        let titled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&titled);
        let title = title.to_string();

        sink.on_window_created(Box::new(move |sink| {
            if stop.cancelled() || flag.swap(true, Ordering::AcqRel) {
                return;
            }
            match sink.set_window_title(&title) {
                Ok(()) => logger.log(
                    Level::Debug,
                    &format!("display window of {} titled \"{}\"", sink.factory_name(), title),
                ),
                Err(e) => logger.log(
                    Level::Debug,
                    &format!("could not title display window: {}", e),
                ),
            }
        }));

        WindowAssociation { titled }
    }

    pub(crate) fn is_titled(&self) -> bool {
        self.titled.load(Ordering::Acquire)
    }
}
