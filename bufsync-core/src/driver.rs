//! Per-file drivers.
//!
//! A driver owns one file's buffer as the daemon believes it to be. The
//! file-state cache hands each normalized [`Event`] to a driver, which
//! applies the full text or the diffs, tracks the cursor, and compares the
//! result against the sender's checksum. A mismatch means the two sides
//! drifted apart, so the driver asks for the full text on the next round.
//!
//! Language engines plug in here by implementing [`FileDriver`] and
//! choosing it from a [`DriverFactory`]; [`BufferDriver`] is the built-in
//! text-only driver.

use bufsync_types::{Checksum, ContentHash, Event};

use crate::gap_buffer::GapBuffer;
use crate::patch::Patcher;

/// A live, stateful per-file object.
pub trait FileDriver: Send {
    /// Apply `event` and return the content hash of the resulting buffer.
    fn handle_event(&mut self, event: &Event) -> ContentHash;

    /// Provider output produced by the last handled event.
    ///
    /// Opaque to the cache; passed through to the editor as-is.
    fn collect_output(&mut self) -> Vec<serde_json::Value>;

    /// Whether the client should send full text on its next event.
    fn resend_text(&self) -> bool;

    /// Copy of the current buffer.
    fn bytes(&self) -> Vec<u8>;

    /// Replace the buffer wholesale.
    fn set_contents(&mut self, bytes: &[u8]);

    /// Cursor position in bytes.
    fn cursor(&self) -> usize;

    /// Move the cursor.
    fn set_cursor(&mut self, cursor: usize);
}

/// Chooses a driver implementation for a file.
pub trait DriverFactory: Send + Sync {
    /// Create an empty driver for `filename`.
    fn new_driver(&self, filename: &str) -> Box<dyn FileDriver>;
}

/// Text-only driver backed by a [`GapBuffer`].
#[derive(Debug, Default)]
pub struct BufferDriver {
    buffer: GapBuffer,
    cursor: usize,
    resend: bool,
    patcher: Patcher,
}

impl BufferDriver {
    /// Create an empty driver.
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileDriver for BufferDriver {
    fn handle_event(&mut self, event: &Event) -> ContentHash {
        let mut patch_failed = false;
        match &event.text {
            Some(text) => self.buffer.set_contents(text.as_bytes()),
            None => {
                if let Err(err) = self.patcher.apply(&mut self.buffer, &event.diffs) {
                    tracing::warn!(
                        "Failed to apply diffs for {} ({}): {}",
                        event.filename,
                        event.source,
                        err
                    );
                    patch_failed = true;
                }
            }
        }

        if let Some(cursor) = event.cursor() {
            self.cursor = cursor;
        }

        let bytes = self.buffer.to_vec();
        let checksum = Checksum::of(&bytes);
        self.resend = patch_failed || checksum != event.text_checksum;
        if self.resend {
            tracing::debug!(
                "Checksum mismatch for {} (expected {}, got {}), requesting full text",
                event.filename,
                event.text_checksum,
                checksum
            );
        }

        ContentHash::of(&bytes)
    }

    fn collect_output(&mut self) -> Vec<serde_json::Value> {
        Vec::new()
    }

    fn resend_text(&self) -> bool {
        self.resend
    }

    fn bytes(&self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    fn set_contents(&mut self, bytes: &[u8]) {
        self.buffer.set_contents(bytes);
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor;
    }
}

/// Builds a [`BufferDriver`] for every file.
#[derive(Debug, Default, Clone, Copy)]
pub struct BufferDriverFactory;

impl DriverFactory for BufferDriverFactory {
    fn new_driver(&self, _filename: &str) -> Box<dyn FileDriver> {
        Box::new(BufferDriver::new())
    }
}
