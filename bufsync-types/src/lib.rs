//! # bufsync-types
//!
//! Data types for the bufsync buffer-synchronization protocol.
//!
//! This crate provides the vocabulary shared by every bufsync crate:
//! - [`EditorEvent`] - Raw notification as sent by an editor plugin
//! - [`Event`] - Normalized, diff-based event consumed by the file-state cache
//! - [`Diff`] - A single insert/delete operation on a byte buffer
//! - [`ContentHash`], [`Checksum`] - Identity digest and drift checksum
//! - [`OffsetEncoding`] - Selection offset units (UTF-8/16/32)
//! - [`EventResponse`] - What the daemon tells the editor after an event

#![warn(missing_docs)]
#![warn(clippy::all)]

mod encoding;
mod error;
mod event;
mod ids;
mod response;

pub use encoding::OffsetEncoding;
pub use error::{HashParseError, OffsetError};
pub use event::{Action, ByteSelection, Diff, DiffType, EditorEvent, Event, Selection};
pub use ids::{Checksum, ContentHash};
pub use response::EventResponse;
