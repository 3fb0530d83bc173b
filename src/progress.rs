//! Observer trait for the advisory "working" indication.
//!
//! A conversion is a single blocking call, so there is nothing like per-page
//! progress to report: only "started", "finished" and "failed". Register an
//! [`Arc<dyn ConversionObserver>`] with
//! [`crate::SessionController::add_observer`] to drive a spinner, a log line
//! or a status endpoint from those events.
//!
//! [`WorkingFlag`] is the shared boolean the controller raises for the
//! duration of a conversion. Hosts clone it before handing the session to a
//! worker thread and poll it without touching the session itself.
//!
//! # Example
//!
//! ```rust
//! use edgequake_md2pdf::{ConversionObserver, ConversionStats};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! #[derive(Default)]
//! struct CountingObserver {
//!     completed: AtomicUsize,
//! }
//!
//! impl ConversionObserver for CountingObserver {
//!     fn on_convert_complete(&self, name: &str, stats: &ConversionStats) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{name}: {} bytes", stats.pdf_bytes);
//!     }
//! }
//! ```

use crate::artifact::ConversionStats;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Called by the session controller around each conversion.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ConversionObserver: Send + Sync {
    /// Called just before the pipeline runs.
    fn on_convert_start(&self, name: &str, markdown_len: usize) {
        let _ = (name, markdown_len);
    }

    /// Called when an artifact has been stored in the session.
    fn on_convert_complete(&self, name: &str, stats: &ConversionStats) {
        let _ = (name, stats);
    }

    /// Called when the pipeline failed. `error` is the user-facing message.
    fn on_convert_error(&self, name: &str, error: &str) {
        let _ = (name, error);
    }
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl ConversionObserver for NoopObserver {}

/// Convenience alias for the type the controller stores.
pub type Observer = Arc<dyn ConversionObserver>;

/// Shared "a conversion is running" flag.
///
/// Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct WorkingFlag(Arc<AtomicBool>);

impl WorkingFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Raise the flag until the returned guard is dropped.
    pub(crate) fn raise(&self) -> WorkingGuard<'_> {
        self.0.store(true, Ordering::SeqCst);
        WorkingGuard(self)
    }
}

/// Lowers the [`WorkingFlag`] on drop, including during a panic unwind.
pub(crate) struct WorkingGuard<'a>(&'a WorkingFlag);

impl Drop for WorkingGuard<'_> {
    fn drop(&mut self) {
        self.0 .0.store(false, Ordering::SeqCst);
    }
}
