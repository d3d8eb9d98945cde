//! Injectable sink for the orchestrator's skip records.
//!
//! Production code forwards to `tracing`; tests swap in `MemoryLog` and
//! assert on the exact records.

use std::sync::{Arc, Mutex, PoisonError};
use tracing::{Level, debug, error, info, trace, warn};

/// Receives leveled log records
pub trait ActivationLog {
    fn record(&mut self, level: Level, message: String);
}

/// Forwards records to the global `tracing` subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl ActivationLog for TracingLog {
    fn record(&mut self, level: Level, message: String) {
        if level == Level::ERROR {
            error!("{}", message);
        } else if level == Level::WARN {
            warn!("{}", message);
        } else if level == Level::INFO {
            info!("{}", message);
        } else if level == Level::DEBUG {
            debug!("{}", message);
        } else {
            trace!("{}", message);
        }
    }
}

/// Keeps records in memory. Clones share the same buffer, so a test can keep
/// one handle and give the other to the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    records: Arc<Mutex<Vec<(Level, String)>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record so far
    pub fn records(&self) -> Vec<(Level, String)> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<(Level, String)> {
        self.records().pop()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

impl ActivationLog for MemoryLog {
    fn record(&mut self, level: Level, message: String) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_log_shares_buffer_between_clones() {
        let log = MemoryLog::new();
        let mut handle = log.clone();

        handle.record(Level::INFO, "first".to_string());
        handle.record(Level::WARN, "second".to_string());

        assert_eq!(log.records().len(), 2);
        assert_eq!(log.last(), Some((Level::WARN, "second".to_string())));
    }

    #[test]
    fn test_tracing_log_accepts_every_level() {
        let mut log = TracingLog;
        for level in [Level::ERROR, Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE] {
            log.record(level, format!("{} record", level));
        }
    }
}
