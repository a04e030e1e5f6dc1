//! Per-session event handling.
//!
//! A [`SyncSession`] owns one [`EventProcessor`] and one [`FileStateCache`]
//! and runs each editor event through both:
//!
//! 1. The processor normalizes the event, or rejects it.
//! 2. The cache resolves a driver and applies the event, on the blocking
//!    pool, under a deadline.
//! 3. The outcome is recorded with the processor as the state the client
//!    now holds.
//!
//! Cache failures, missed deadlines and panics all turn into a response
//! asking the client to resend its full text. A missed deadline does not
//! cancel the driver mutation; it finishes in the background.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use bufsync_core::{
    canonical_path, BufferDriverFactory, Clock, DriverFactory, DriverState, EventProcessor,
    FileStateCache, ProcessError, SystemClock,
};
use bufsync_types::{ContentHash, EditorEvent, EventResponse};

use crate::config::Config;
use crate::crash::{panic_message, CrashReporter, TracingCrashReporter};
use crate::error::DaemonError;

/// One editor session's synchronization state.
pub struct SyncSession {
    processor: Arc<EventProcessor>,
    cache: Arc<FileStateCache>,
    crash: Arc<dyn CrashReporter>,
    event_timeout: Duration,
    elide_text_on_diff: bool,
}

impl std::fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("processor", &self.processor)
            .field("cache", &self.cache)
            .field("event_timeout", &self.event_timeout)
            .field("elide_text_on_diff", &self.elide_text_on_diff)
            .finish_non_exhaustive()
    }
}

impl SyncSession {
    /// Create a session with buffer drivers, the system clock and
    /// tracing-based crash reports.
    pub fn new(config: &Config) -> Self {
        Self::with_parts(
            config,
            Arc::new(BufferDriverFactory),
            Arc::new(SystemClock),
            Arc::new(TracingCrashReporter),
        )
    }

    /// Create a session with explicit collaborators.
    pub fn with_parts(
        config: &Config,
        factory: Arc<dyn DriverFactory>,
        clock: Arc<dyn Clock>,
        crash: Arc<dyn CrashReporter>,
    ) -> Self {
        Self {
            processor: Arc::new(EventProcessor::with_clock(
                config.processor_config(),
                Arc::clone(&clock),
            )),
            cache: Arc::new(FileStateCache::with_parts(
                config.cache.capacity,
                factory,
                clock,
            )),
            crash,
            event_timeout: config.event_timeout(),
            elide_text_on_diff: config.session.elide_text_on_diff,
        }
    }

    /// The event processor.
    pub fn processor(&self) -> &EventProcessor {
        &self.processor
    }

    /// The file-state cache.
    pub fn cache(&self) -> &FileStateCache {
        &self.cache
    }

    /// Handle one editor event.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Process`] when the processor rejects the event
    /// (check [`DaemonError::is_expected`] before logging it as a failure),
    /// and [`DaemonError::Panicked`] when normalization panicked. Anything
    /// that goes wrong after normalization yields `Ok` with `resend` set.
    pub async fn handle_event(&self, ev: &EditorEvent) -> Result<EventResponse, DaemonError> {
        let event = match catch_unwind(AssertUnwindSafe(|| self.processor.process_event(ev))) {
            Ok(Ok(event)) => event,
            Ok(Err(err)) => {
                if err.is_expected() {
                    tracing::trace!("Dropped event for {}: {}", ev.filename, err);
                } else {
                    tracing::debug!("Rejected event for {}: {}", ev.filename, err);
                }
                return Err(err.into());
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                self.crash.report("process_event", &message);
                return Err(DaemonError::Panicked { message });
            }
        };

        let text = event.text.clone().unwrap_or_default();
        let selections = event.selections.clone();
        let source = event.source.clone();
        let filename = event.filename.clone();
        let state = event.text_hash;

        let mut cache_event = event;
        if self.elide_text_on_diff {
            cache_event.elide_text();
        }

        let cache = Arc::clone(&self.cache);
        let task = tokio::task::spawn_blocking(move || cache.handle_event(&mut cache_event));
        let response = match tokio::time::timeout(self.event_timeout, task).await {
            Ok(Ok(Ok(response))) => response,
            Ok(Ok(Err(err))) => {
                tracing::warn!(
                    "Requesting full text for {} ({}): {}",
                    filename,
                    source,
                    err
                );
                EventResponse::resend(state)
            }
            Ok(Err(join_err)) => {
                if join_err.is_panic() {
                    let message = panic_message(join_err.into_panic().as_ref());
                    self.crash.report("handle_event", &message);
                } else {
                    tracing::warn!("Cache task for {} did not complete: {}", filename, join_err);
                }
                EventResponse::resend(state)
            }
            Err(_) => {
                tracing::warn!(
                    "Cache deadline ({:?}) expired for {} ({})",
                    self.event_timeout,
                    filename,
                    source
                );
                EventResponse::resend(state)
            }
        };

        self.processor
            .update_latest_response(&source, &filename, &text, &selections, response.resend);

        tracing::debug!(
            "Handled event for {} ({}): state={:?} resend={}",
            filename,
            source,
            response.state,
            response.resend
        );
        Ok(response)
    }

    /// Snapshot of the driver for `filename` at exactly `state`.
    pub fn driver(&self, filename: &str, source: &str, state: ContentHash) -> Option<DriverState> {
        let filename = canonical_path(filename).ok()?;
        self.cache.driver(&filename, source, state)
    }

    /// Snapshot of the driver holding `content`, built from it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Process`] if `filename` is not absolute.
    pub fn driver_from_content(
        &self,
        filename: &str,
        source: &str,
        content: &str,
        cursor: usize,
    ) -> Result<DriverState, DaemonError> {
        let canonical = canonical_path(filename).map_err(ProcessError::from)?;
        Ok(self
            .cache
            .driver_from_content(&canonical, source, content, cursor))
    }

    /// Snapshot of the most recently used driver for `filename`.
    pub fn latest_driver(&self, filename: &str) -> Option<DriverState> {
        let filename = canonical_path(filename).ok()?;
        self.cache.latest_driver(&filename)
    }

    /// Clear both caches, e.g. after the editor has been idle.
    pub fn reset(&self) {
        self.processor.reset();
        self.cache.reset();
        tracing::info!("Session reset");
    }
}
