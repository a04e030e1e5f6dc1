//! Content-addressed cache of per-file drivers.
//!
//! Drivers are keyed by `(filename, source, content hash)`. Handling an
//! event resolves a driver for it, in this order:
//!
//! 1. An exact key match is reused as-is; the event's diffs are dropped
//!    because the driver is already in the target state.
//! 2. An event carrying full text gets a fresh driver.
//! 3. An event carrying a reference state gets a copy of the driver at
//!    that state, then its diffs are applied. If the reference is not
//!    cached, resolution fails.
//! 4. Otherwise the most recently accessed driver for the file and source
//!    is copied. This is a best-effort path for clients that send diffs
//!    without naming their reference.
//!
//! After handling, the driver is stored under the hash of its resulting
//! buffer, and the oldest entries are evicted until the cache is back
//! within capacity.
//!
//! One mutex guards the whole map. Two events resolving through step 4
//! may both pick a driver that a concurrent eviction then removes; the
//! lock keeps the map consistent but does not make that choice fresher.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use bufsync_types::{ContentHash, Event, EventResponse};
use parking_lot::Mutex;
use thiserror::Error;

use crate::clock::{from_unix_nanos, Clock, SystemClock};
use crate::driver::{BufferDriverFactory, DriverFactory, FileDriver};

/// Default number of live drivers.
pub const DEFAULT_CAPACITY: usize = 20;

/// Error type for cache operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// No exact match, no full text and no usable reference state.
    #[error("could not construct driver for {filename} ({client}): no text or reference state")]
    CouldNotConstructDriver {
        /// Canonical filename.
        filename: String,
        /// Editor/plugin that sent the event.
        client: String,
    },
}

/// Snapshot of a cached driver, for providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverState {
    /// Canonical filename.
    pub filename: String,
    /// Editor/plugin the driver tracks.
    pub source: String,
    /// Content hash of the buffer.
    pub state: ContentHash,
    /// Buffer contents.
    pub contents: Vec<u8>,
    /// Cursor in bytes.
    pub cursor: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StateKey {
    filename: String,
    source: String,
    state: ContentHash,
}

impl StateKey {
    fn new(filename: &str, source: &str, state: ContentHash) -> Self {
        Self {
            filename: filename.to_string(),
            source: source.to_string(),
            state,
        }
    }
}

struct Entry {
    driver: Box<dyn FileDriver>,
    last_access: SystemTime,
    /// Tiebreak for equal access times.
    seq: u64,
}

impl Entry {
    fn recency(&self) -> (SystemTime, u64) {
        (self.last_access, self.seq)
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<StateKey, Entry>,
    next_seq: u64,
}

impl Inner {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn touch(&mut self, key: &StateKey, at: SystemTime) {
        let seq = self.next_seq();
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_access = at;
            entry.seq = seq;
        }
    }

    /// Most recently accessed key for `filename`, optionally restricted to
    /// one source.
    fn latest(&self, filename: &str, source: Option<&str>) -> Option<StateKey> {
        self.entries
            .iter()
            .filter(|(key, _)| {
                key.filename == filename && source.map_or(true, |s| key.source == s)
            })
            .max_by_key(|(_, entry)| entry.recency())
            .map(|(key, _)| key.clone())
    }

    fn snapshot(&self, key: &StateKey) -> Option<DriverState> {
        self.entries.get(key).map(|entry| DriverState {
            filename: key.filename.clone(),
            source: key.source.clone(),
            state: key.state,
            contents: entry.driver.bytes(),
            cursor: entry.driver.cursor(),
        })
    }

    fn evict(&mut self, capacity: usize) {
        while self.entries.len() > capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.recency())
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    tracing::debug!("Evicting driver for {} at {:?}", key.filename, key.state);
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

/// Bounded, content-addressed cache of per-file drivers.
pub struct FileStateCache {
    inner: Mutex<Inner>,
    capacity: usize,
    factory: Arc<dyn DriverFactory>,
    clock: Arc<dyn Clock>,
}

impl FileStateCache {
    /// Create a cache of [`BufferDriver`](crate::BufferDriver)s with the
    /// default capacity and the system clock.
    pub fn new() -> Self {
        Self::with_parts(
            DEFAULT_CAPACITY,
            Arc::new(BufferDriverFactory),
            Arc::new(SystemClock),
        )
    }

    /// Create a cache with explicit capacity, driver factory and clock.
    pub fn with_parts(
        capacity: usize,
        factory: Arc<dyn DriverFactory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity,
            factory,
            clock,
        }
    }

    /// Maximum number of live drivers.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live drivers.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// True if no drivers are cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every driver.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        tracing::info!("file state cache reset");
    }

    /// Resolve a driver for `event`, apply the event, and re-key the driver
    /// under its resulting state.
    ///
    /// Clears `event.diffs` when an exact match makes them redundant.
    pub fn handle_event(&self, event: &mut Event) -> Result<EventResponse, CacheError> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let key = StateKey::new(&event.filename, &event.source, event.text_hash);
        let mut driver = if let Some(entry) = inner.entries.remove(&key) {
            tracing::debug!(
                "Using existing driver for {} ({}) at {:?}",
                key.filename,
                key.source,
                key.state
            );
            event.diffs.clear();
            entry.driver
        } else if event.has_text() {
            tracing::debug!(
                "New driver from text for {} ({}) at {:?}",
                key.filename,
                key.source,
                key.state
            );
            self.factory.new_driver(&event.filename)
        } else if let Some(reference) = event.reference_state {
            let ref_key = StateKey::new(&event.filename, &event.source, reference);
            let Some(entry) = inner.entries.get(&ref_key) else {
                tracing::debug!(
                    "Reference {:?} not cached for {} ({})",
                    reference,
                    key.filename,
                    key.source
                );
                return Err(self.unresolved(event));
            };
            tracing::debug!(
                "New driver from reference {:?} for {} ({})",
                reference,
                key.filename,
                key.source
            );
            self.copy_driver(&event.filename, entry.driver.as_ref())
        } else {
            let Some(latest) = inner.latest(&event.filename, Some(event.source.as_str())) else {
                tracing::debug!(
                    "No driver to fall back on for {} ({})",
                    key.filename,
                    key.source
                );
                return Err(self.unresolved(event));
            };
            tracing::debug!(
                "Assuming latest driver {:?} as reference for {} ({})",
                latest.state,
                key.filename,
                key.source
            );
            inner.touch(&latest, now);
            match inner.entries.get(&latest) {
                Some(entry) => self.copy_driver(&event.filename, entry.driver.as_ref()),
                None => return Err(self.unresolved(event)),
            }
        };

        let state = driver.handle_event(event);
        let results = driver.collect_output();
        let resend = driver.resend_text();

        let last_access = from_unix_nanos(event.timestamp).unwrap_or(now);
        let seq = inner.next_seq();
        inner.entries.insert(
            StateKey::new(&event.filename, &event.source, state),
            Entry {
                driver,
                last_access,
                seq,
            },
        );
        inner.evict(self.capacity);

        Ok(EventResponse {
            state,
            resend,
            results,
        })
    }

    /// Snapshot of the driver at exactly `state`, refreshing its recency.
    pub fn driver(&self, filename: &str, source: &str, state: ContentHash) -> Option<DriverState> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let key = StateKey::new(filename, source, state);
        inner.touch(&key, now);
        inner.snapshot(&key)
    }

    /// Snapshot of the driver holding `content`, building one from the
    /// full text with the given cursor if none is cached.
    pub fn driver_from_content(
        &self,
        filename: &str,
        source: &str,
        content: &str,
        cursor: usize,
    ) -> DriverState {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let state = ContentHash::of(content.as_bytes());
        let key = StateKey::new(filename, source, state);

        if inner.entries.contains_key(&key) {
            inner.touch(&key, now);
        } else {
            tracing::debug!(filename, source, state = ?state, "new driver from content");
            let mut driver = self.factory.new_driver(filename);
            driver.set_contents(content.as_bytes());
            driver.set_cursor(cursor);
            let seq = inner.next_seq();
            inner.entries.insert(
                key.clone(),
                Entry {
                    driver,
                    last_access: now,
                    seq,
                },
            );
        }

        let snapshot = DriverState {
            filename: filename.to_string(),
            source: source.to_string(),
            state,
            contents: content.as_bytes().to_vec(),
            cursor: inner.entries.get(&key).map_or(cursor, |e| e.driver.cursor()),
        };
        inner.evict(self.capacity);
        snapshot
    }

    /// Snapshot of the most recently accessed driver for `filename`, from
    /// any source.
    pub fn latest_driver(&self, filename: &str) -> Option<DriverState> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let key = inner.latest(filename, None)?;
        inner.touch(&key, now);
        inner.snapshot(&key)
    }

    fn copy_driver(&self, filename: &str, from: &dyn FileDriver) -> Box<dyn FileDriver> {
        let mut driver = self.factory.new_driver(filename);
        driver.set_contents(&from.bytes());
        driver.set_cursor(from.cursor());
        driver
    }

    fn unresolved(&self, event: &Event) -> CacheError {
        CacheError::CouldNotConstructDriver {
            filename: event.filename.clone(),
            client: event.source.clone(),
        }
    }
}

impl Default for FileStateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FileStateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStateCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
