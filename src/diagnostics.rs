use std::sync::{Mutex, MutexGuard, PoisonError};

/// Sink for non-fatal diagnostic messages from the codec factory.
///
/// The factory checks [`DiagnosticSink::has_capacity`] before recording, so
/// a saturated sink costs nothing beyond the check.
pub trait DiagnosticSink {
    /// Whether the sink can accept another message.
    fn has_capacity(&self) -> bool;

    /// Records one message.
    fn record(&self, message: &str);
}

/// Bounded in-memory diagnostic sink.
#[derive(Debug)]
pub struct DiagnosticLog {
    limit: usize,
    entries: Mutex<Vec<String>>,
}

impl DiagnosticLog {
    #[must_use]
    pub fn new(limit: usize) -> DiagnosticLog {
        DiagnosticLog {
            limit,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the recorded messages.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.entries().clone()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DiagnosticSink for DiagnosticLog {
    fn has_capacity(&self) -> bool {
        self.entries().len() < self.limit
    }

    fn record(&self, message: &str) {
        let mut entries = self.entries();
        if entries.len() < self.limit {
            entries.push(message.to_string());
        }
    }
}
