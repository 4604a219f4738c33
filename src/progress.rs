//! Observer trait for session transitions.
//!
//! Inject an [`ObserverHandle`] via
//! [`crate::config::ClientConfigBuilder::observer`] to be told when a parse
//! or conversion starts and ends. The CLI uses it to drive a spinner; a GUI
//! would use it to swap in its loading screen.
//!
//! # Example
//!
//! ```rust
//! use molsnap::{ClientConfig, SessionObserver};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingObserver {
//!     conversions: AtomicUsize,
//! }
//!
//! impl SessionObserver for CountingObserver {
//!     fn on_conversion_complete(&self, result_count: usize) {
//!         self.conversions.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{result_count} structures recognised");
//!     }
//! }
//!
//! let observer = Arc::new(CountingObserver { conversions: AtomicUsize::new(0) });
//!
//! let config = ClientConfig::builder()
//!     .decimer_url("http://localhost:8001")
//!     .molsnap_url("http://localhost:8000")
//!     .observer(observer)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by [`crate::session::Session`] around its asynchronous operations.
///
/// All methods default to no-ops so implementors override only what they
/// need. Implementations must be `Send + Sync`: segment downloads for a
/// batch run concurrently.
pub trait SessionObserver: Send + Sync {
    /// Page extraction request sent for `start..=end`.
    fn on_parse_start(&self, _start_page: usize, _end_page: usize) {}

    /// Extraction finished with `segment_count` images.
    fn on_parse_complete(&self, _segment_count: usize) {}

    /// Conversion request sent for `file_count` files.
    fn on_conversion_start(&self, _file_count: usize) {}

    /// One segment image downloaded ahead of a batch conversion.
    fn on_segment_fetched(&self, _path: &str, _index: usize, _total: usize) {}

    /// Conversion finished and `result_count` results replaced the table.
    fn on_conversion_complete(&self, _result_count: usize) {}

    /// A parse or conversion failed.
    fn on_error(&self, _message: &str) {}
}

/// Shared handle stored in the configuration.
pub type ObserverHandle = Arc<dyn SessionObserver>;

/// Observer that ignores every event.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Recorder {
        errors: AtomicUsize,
    }

    impl SessionObserver for Recorder {
        fn on_error(&self, _message: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn default_methods_are_noops() {
        let r = Recorder {
            errors: AtomicUsize::new(0),
        };
        r.on_parse_start(1, 2);
        r.on_conversion_complete(3);
        r.on_error("boom");
        assert_eq!(r.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn noop_observer_is_object_safe() {
        let handle: ObserverHandle = Arc::new(NoopObserver);
        handle.on_segment_fetched("images/a.png", 0, 1);
    }
}
