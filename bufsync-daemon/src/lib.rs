//! # bufsync-daemon
//!
//! Session orchestration for the bufsync buffer-synchronization core.
//!
//! A [`SyncSession`] is the object a local code-intelligence daemon keeps per
//! editor session. It owns:
//! - An [`EventProcessor`](bufsync_core::EventProcessor) that normalizes and
//!   deduplicates editor events
//! - A [`FileStateCache`](bufsync_core::FileStateCache) of per-file drivers
//!
//! ## Event flow
//!
//! ```text
//! editor ──EditorEvent──► EventProcessor ──Event──► FileStateCache
//!    ▲                          ▲                        │
//!    │                          └── acknowledged state ──┤
//!    └────────────── EventResponse { state, resend } ◄───┘
//! ```
//!
//! Transport, provider engines and process lifecycle live outside this
//! crate; they call [`SyncSession::handle_event`] and
//! [`SyncSession::reset`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod crash;
pub mod error;
pub mod session;

pub use config::{Config, ConfigError};
pub use crash::{CrashReporter, TracingCrashReporter};
pub use error::DaemonError;
pub use session::SyncSession;
