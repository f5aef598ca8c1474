//! Bus watcher
//!
//! Turns pipeline bus messages into renderer actions:
//! - ERROR: fatal to the session. The ingest stage gets end-of-stream, the
//!   bus starts flushing, the pipeline is forced to NULL and the host loop is
//!   told to quit.
//! - EOS: logged, nothing else. The host loop keeps running.
//! - everything else is ignored.
//!
//! The watcher only holds a weak reference to the session and checks the
//! session's stop signal first, so a message racing `destroy()` turns into a
//! no-op that also removes the watch.

use super::Session;
use crate::engine::{BusHandler, BusMessage, WatchControl};
use crate::logger::LogSink;
use crate::utils::SignalOfStop;
use log::Level;
use std::sync::{Arc, Weak};

/// Run loop of the host application.
pub trait HostLoop: Send + Sync {
    /// Ask the loop to terminate.
    fn quit(&self);
}

impl HostLoop for SignalOfStop {
    fn quit(&self) {
        self.cancel();
    }
}

pub(crate) struct BusWatcher {
    session: Weak<Session>,
    host: Arc<dyn HostLoop>,
    logger: Arc<dyn LogSink>,
    stop: SignalOfStop,
}

impl BusWatcher {
    pub(crate) fn new(
        session: Weak<Session>,
        host: Arc<dyn HostLoop>,
        logger: Arc<dyn LogSink>,
        stop: SignalOfStop,
    ) -> Self {
        Self {
            session,
            host,
            logger,
            stop,
        }
    }

    pub(crate) fn into_handler(self) -> BusHandler {
        Box::new(move |message| self.handle(message))
    }

    pub(crate) fn handle(&self, message: &BusMessage) -> WatchControl {
        if self.stop.cancelled() {
            return WatchControl::Remove;
        }
        let Some(session) = self.session.upgrade() else {
            return WatchControl::Remove;
        };

        match message {
            BusMessage::Error {
                source,
                message,
                debug,
            } => {
                let mut line = format!("video pipeline error: {}", message);
                if let Some(source) = source {
                    line.push_str(&format!(" (from {})", source));
                }
                self.logger.log(Level::Info, &line);
                if let Some(debug) = debug {
                    self.logger.log(Level::Debug, debug);
                }

                if let Err(e) = session.ingest.end_of_stream() {
                    self.logger
                        .log(Level::Debug, &format!("end-of-stream not accepted: {}", e));
                }
                if let Some(bus) = session.bus.get() {
                    bus.set_flushing(true);
                }
                if let Err(e) = session.force_null() {
                    self.logger.log(Level::Error, &e.to_string());
                }

                self.host.quit();
            }
            BusMessage::Eos => {
                self.logger.log(Level::Info, "video pipeline: End-Of-Stream");
            }
            BusMessage::Other(_) => {}
        }

        WatchControl::Continue
    }
}
