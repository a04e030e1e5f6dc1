//! # bufsync-core
//!
//! Pure buffer-synchronization logic for bufsync (no I/O, instant tests).
//!
//! This crate keeps a background process's view of open editor buffers in
//! step with the editor, using diffs against acknowledged states instead of
//! full texts on every keystroke.
//!
//! ## Layers
//!
//! - [`GapBuffer`], [`Patcher`], [`Differ`]: byte-level edit primitives.
//! - [`BufferDriver`]: one file's buffer, cursor and resend flag.
//! - [`FileStateCache`]: content-addressed, bounded cache of drivers with
//!   reconciliation on cache misses.
//! - [`EventProcessor`]: turns raw editor events into diff-based events
//!   and drops duplicates.
//!
//! Nothing here blocks on I/O. Time comes from an injectable [`Clock`] so
//! TTL and recency behavior can be tested without sleeping. The async
//! session wiring lives in `bufsync-daemon`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod clock;
pub mod diff;
pub mod driver;
pub mod gap_buffer;
pub mod patch;
pub mod path;
pub mod processor;

pub use cache::{CacheError, DriverState, FileStateCache, DEFAULT_CAPACITY};
pub use clock::{Clock, ManualClock, SystemClock};
pub use diff::{diff, Differ, DEFAULT_MAX_EDIT_DISTANCE};
pub use driver::{BufferDriver, BufferDriverFactory, DriverFactory, FileDriver};
pub use gap_buffer::{GapBuffer, GapBufferError};
pub use patch::{PatchError, Patcher};
pub use path::{canonical_path, NotAbsolute};
pub use processor::{
    EventProcessor, ProcessError, ProcessorConfig, DEFAULT_MAX_FILE_SIZE_BYTES,
    DEFAULT_RESPONSE_TTL, DEFAULT_SUPPORTED_EXTENSIONS,
};
