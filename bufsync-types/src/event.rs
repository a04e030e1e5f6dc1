//! Editor events, normalized events and diffs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Checksum, ContentHash, OffsetEncoding};

/// What the editor says happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Buffer contents changed.
    #[default]
    Edit,
    /// Buffer gained focus; forces a full-text resync.
    Focus,
    /// Only the selection/cursor moved.
    Selection,
    /// The plugin asks the daemon to ignore this event.
    Skip,
    /// Buffer lost focus; nothing to synchronize.
    LostFocus,
    /// An editor command was run on the buffer.
    Command,
}

impl Action {
    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Focus => "focus",
            Self::Selection => "selection",
            Self::Skip => "skip",
            Self::LostFocus => "lost_focus",
            Self::Command => "command",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A selection as reported by an editor, in the editor's own offset units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    /// Start offset.
    pub start: i64,
    /// End offset.
    pub end: i64,
    /// Units `start` and `end` are expressed in.
    #[serde(default)]
    pub encoding: OffsetEncoding,
}

impl Selection {
    /// A collapsed selection (cursor) in UTF-8 bytes.
    pub fn cursor(offset: i64) -> Self {
        Self {
            start: offset,
            end: offset,
            encoding: OffsetEncoding::Utf8,
        }
    }
}

/// A raw notification from an editor plugin. Untrusted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorEvent {
    /// Which editor/plugin sent the event (e.g. "atom", "vscode").
    #[serde(default)]
    pub source: String,
    /// What happened.
    #[serde(default)]
    pub action: Action,
    /// Native path of the file; empty for unsaved buffers.
    #[serde(default)]
    pub filename: String,
    /// Full buffer contents.
    #[serde(default)]
    pub text: String,
    /// Current selections.
    #[serde(default)]
    pub selections: Vec<Selection>,
    /// When the event was produced, in nanoseconds since the Unix epoch (0 = unknown).
    #[serde(default)]
    pub timestamp: i64,
    /// Editor version string.
    #[serde(default)]
    pub editor_version: String,
    /// Plugin version string.
    #[serde(default)]
    pub plugin_version: String,
}

/// Kind of a [`Diff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffType {
    /// Insert `text` at `offset`.
    Insert,
    /// Delete `text` (which must be present) at `offset`.
    Delete,
}

/// One operation of an edit script.
///
/// `offset` is a byte position in the buffer as it stands when this diff is
/// applied, i.e. after every earlier diff of the same script. Scripts are in
/// document order. `text` is raw bytes: a diff boundary may split a
/// multi-byte UTF-8 sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diff {
    /// Insert or delete.
    #[serde(rename = "type")]
    pub kind: DiffType,
    /// Byte offset.
    pub offset: usize,
    /// Bytes inserted or deleted.
    pub text: Vec<u8>,
}

impl Diff {
    /// An insertion.
    pub fn insert(offset: usize, text: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: DiffType::Insert,
            offset,
            text: text.into(),
        }
    }

    /// A deletion.
    pub fn delete(offset: usize, text: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: DiffType::Delete,
            offset,
            text: text.into(),
        }
    }

    /// Number of bytes this diff touches.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// True if the diff carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// A selection in UTF-8 byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ByteSelection {
    /// Start byte offset.
    pub start: usize,
    /// End byte offset.
    pub end: usize,
}

impl ByteSelection {
    /// Create a selection.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// True when the selection is collapsed to a cursor.
    pub fn is_cursor(&self) -> bool {
        self.start == self.end
    }
}

/// A normalized, diff-based event.
///
/// Produced by the event processor, consumed by the file-state cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Normalized action (edit, focus or selection).
    pub action: Action,
    /// Editor/plugin that produced the event.
    pub source: String,
    /// Canonical filename.
    pub filename: String,
    /// Full text, if carried. `Some("")` is an empty buffer.
    pub text: Option<String>,
    /// Identity hash of the full text after this event.
    pub text_hash: ContentHash,
    /// Drift checksum of the full text after this event.
    pub text_checksum: Checksum,
    /// Edit script from the reference state to this event's text.
    #[serde(default)]
    pub diffs: Vec<Diff>,
    /// Selections in byte offsets.
    #[serde(default)]
    pub selections: Vec<ByteSelection>,
    /// Hash of the buffer the diffs' offsets are relative to.
    #[serde(default)]
    pub reference_state: Option<ContentHash>,
    /// Nanoseconds since the Unix epoch (0 = unknown).
    #[serde(default)]
    pub timestamp: i64,
    /// Editor version string.
    #[serde(default)]
    pub editor_version: String,
    /// Plugin version string.
    #[serde(default)]
    pub plugin_version: String,
}

impl Event {
    /// Cursor position: the last collapsed selection, if any.
    pub fn cursor(&self) -> Option<usize> {
        self.selections
            .iter()
            .rev()
            .find(|s| s.is_cursor())
            .map(|s| s.start)
    }

    /// Whether the event carries full text.
    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }

    /// Drop the full text of an incremental event, leaving only the
    /// reference state and diffs.
    ///
    /// No-op for events without a reference state: those must carry text.
    pub fn elide_text(&mut self) {
        if self.reference_state.is_some() {
            self.text = None;
        }
    }
}
