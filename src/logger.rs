//! Injected log sink
//!
//! The renderer never logs through a global directly: every record goes
//! through the [`LogSink`] handed to it at construction. Hosts that are happy
//! with the `log` facade use [`LogFacade`].

use log::Level;
use std::sync::Mutex;

pub const LOG_TARGET: &str = "video_renderer";

/// Destination for renderer log records.
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Forwards every record to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFacade;

impl LogSink for LogFacade {
    fn log(&self, level: Level, message: &str) {
        log::log!(target: LOG_TARGET, level, "{}", message);
    }
}

/// Keeps every record in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<(Level, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Level, String)> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, level: Level) -> usize {
        self.records()
            .iter()
            .filter(|(lvl, _)| *lvl == level)
            .count()
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: Level, message: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push((level, message.to_owned()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.log(Level::Debug, "first");
        sink.log(Level::Error, "second");

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], (Level::Debug, "first".to_string()));
        assert_eq!(records[1].0, Level::Error);
        assert_eq!(sink.count(Level::Error), 1);

        sink.clear();
        assert!(sink.is_empty());
    }
}
