//! Collector for non-fatal failures.
//!
//! Capture and restore never abort on a secondary facility. Instead the
//! failure is appended to an [`ErrorLog`] that the caller owns and inspects
//! once the operation returns.

use std::sync::{Mutex, MutexGuard};

use crate::error::SoftError;

/// Ordered, append-only list of soft failures.
///
/// Shared by reference between workers restoring disjoint paths. Appends are
/// serialized, so each entry is recorded whole and in arrival order.
#[derive(Debug, Default)]
pub struct ErrorLog {
    errors: Mutex<Vec<SoftError>>,
}

impl ErrorLog {
    pub fn new() -> ErrorLog {
        ErrorLog::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SoftError>> {
        // A panicking writer cannot leave the Vec half-pushed.
        self.errors.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record(&self, err: SoftError) {
        tracing::warn!(facility = err.facility(), "{}", err);
        self.lock().push(err);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Rendered messages, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(ToString::to_string).collect()
    }

    /// Atomically drains the log, returning everything recorded so far.
    pub fn take(&self) -> Vec<SoftError> {
        std::mem::take(&mut *self.lock())
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Runs `f` against the recorded errors without copying them.
    pub fn with_errors<T>(&self, f: impl FnOnce(&[SoftError]) -> T) -> T {
        f(&self.lock())
    }
}
