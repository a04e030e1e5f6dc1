//! Editor event normalization and deduplication.
//!
//! The processor turns raw [`EditorEvent`]s into diff-based [`Event`]s. It
//! remembers, per `(filename, source)`, the last event it saw and the last
//! state the daemon acknowledged, and uses the acknowledged state as the
//! reference for diffs. Events that change nothing are dropped as
//! duplicates.
//!
//! Classification, first match wins:
//!
//! | # | Condition                                   | Result                          |
//! |---|---------------------------------------------|---------------------------------|
//! | 1 | no previous event for the key               | edit, full text                 |
//! | 2 | no acknowledged response                    | edit, full text                 |
//! | 3 | last response asked for a resend            | edit, full text                 |
//! | 4 | action is focus                             | focus, full text                |
//! | 5 | text differs from acknowledged text         | edit, diffs + reference         |
//! | 6 | selections differ (as a set)                | selection + reference           |
//! | 7 | otherwise                                   | [`ProcessError::Duplicate`]     |
//!
//! Every normalized event still carries its full text; dropping it for
//! incremental events is up to the caller.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bufsync_types::{
    Action, ByteSelection, Checksum, ContentHash, EditorEvent, Event, OffsetError, Selection,
};
use parking_lot::Mutex;
use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::diff::{Differ, DEFAULT_MAX_EDIT_DISTANCE};
use crate::path::{canonical_path, NotAbsolute};

/// Default size limit: texts this large or larger are rejected.
pub const DEFAULT_MAX_FILE_SIZE_BYTES: usize = 1 << 20;

/// Default dedup horizon.
pub const DEFAULT_RESPONSE_TTL: Duration = Duration::from_secs(60);

/// Extensions accepted by default.
pub const DEFAULT_SUPPORTED_EXTENSIONS: &[&str] = &[
    "py", "pyw", "go", "js", "jsx", "mjs", "vue", "ts", "tsx", "java", "kt", "scala", "c", "cc",
    "cpp", "h", "hpp", "cs", "rb", "php", "sh", "css", "less", "html", "rs",
];

/// Why an editor event produced no normalized event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    /// The buffer has no filename.
    #[error("file is unsaved")]
    UnsavedFile,

    /// The file's extension is not supported.
    #[error("unsupported file")]
    UnsupportedFile,

    /// The editor asked for the event to be skipped.
    #[error("event skipped")]
    Skipped,

    /// The text is at or over the size limit.
    #[error("file too large")]
    FileTooLarge,

    /// The event carries nothing to synchronize.
    #[error("event unused")]
    Unused,

    /// Nothing changed since the last acknowledged state.
    #[error("duplicate event")]
    Duplicate,

    /// The filename is not an absolute path.
    #[error("invalid path: {0}")]
    InvalidPath(#[from] NotAbsolute),

    /// A selection offset could not be converted to bytes.
    #[error("error decoding selection: {0}")]
    Decode(#[from] OffsetError),
}

impl ProcessError {
    /// Steady-state outcomes that are not failures.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::Duplicate | Self::Unused)
    }
}

/// Processor settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Texts of this many bytes or more are rejected.
    pub max_file_size_bytes: usize,
    /// Accepted extensions, lowercase, without the dot.
    pub supported_extensions: Vec<String>,
    /// How long per-key records are kept.
    pub response_ttl: Duration,
    /// Search bound handed to the [`Differ`].
    pub max_edit_distance: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            supported_extensions: DEFAULT_SUPPORTED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            response_ttl: DEFAULT_RESPONSE_TTL,
            max_edit_distance: DEFAULT_MAX_EDIT_DISTANCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FileKey {
    filename: String,
    source: String,
}

/// Text and selections as of some point in time.
#[derive(Debug, Clone)]
struct Snapshot {
    hash: ContentHash,
    text: String,
    selections: Vec<ByteSelection>,
    at: SystemTime,
}

#[derive(Debug, Clone)]
struct Acknowledged {
    snapshot: Snapshot,
    resend: bool,
}

#[derive(Debug, Default)]
struct State {
    incoming: HashMap<FileKey, Snapshot>,
    responses: HashMap<FileKey, Acknowledged>,
}

impl State {
    fn purge(&mut self, now: SystemTime, ttl: Duration) {
        let fresh = |at: SystemTime| now.duration_since(at).map_or(true, |age| age <= ttl);
        self.incoming.retain(|_, snap| fresh(snap.at));
        self.responses.retain(|_, ack| fresh(ack.snapshot.at));
    }
}

/// Normalizes and deduplicates editor events.
pub struct EventProcessor {
    config: ProcessorConfig,
    extensions: HashSet<String>,
    differ: Differ,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

impl EventProcessor {
    /// Create a processor using the system clock.
    pub fn new(config: ProcessorConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a processor using `clock` for TTL expiry.
    pub fn with_clock(config: ProcessorConfig, clock: Arc<dyn Clock>) -> Self {
        let extensions = config
            .supported_extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
        Self {
            differ: Differ::with_max_edit_distance(config.max_edit_distance),
            config,
            extensions,
            clock,
            state: Mutex::new(State::default()),
        }
    }

    /// Settings in use.
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Whether `filename` has a supported extension.
    pub fn is_supported(&self, filename: &str) -> bool {
        Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| self.extensions.contains(&ext.to_lowercase()))
    }

    /// Normalize `ev`.
    ///
    /// Records `ev` as the latest incoming event for its key whenever it
    /// passes validation, even if it turns out to be a duplicate.
    pub fn process_event(&self, ev: &EditorEvent) -> Result<Event, ProcessError> {
        if ev.filename.is_empty() {
            return Err(ProcessError::UnsavedFile);
        }
        let filename = canonical_path(&ev.filename)?;
        if !self.is_supported(&filename) {
            return Err(ProcessError::UnsupportedFile);
        }
        if ev.action == Action::Skip {
            return Err(ProcessError::Skipped);
        }
        if ev.text.len() >= self.config.max_file_size_bytes {
            return Err(ProcessError::FileTooLarge);
        }
        if ev.action == Action::LostFocus {
            return Err(ProcessError::Unused);
        }

        let selections = decode_selections(&ev.text, &ev.selections)?;
        let text_hash = ContentHash::of(ev.text.as_bytes());
        let mut event = Event {
            action: Action::Edit,
            source: ev.source.clone(),
            filename: filename.clone(),
            text: Some(ev.text.clone()),
            text_hash,
            text_checksum: Checksum::of(ev.text.as_bytes()),
            diffs: Vec::new(),
            selections: selections.clone(),
            reference_state: None,
            timestamp: ev.timestamp,
            editor_version: ev.editor_version.clone(),
            plugin_version: ev.plugin_version.clone(),
        };

        let now = self.clock.now();
        let key = FileKey {
            filename,
            source: ev.source.clone(),
        };

        let mut state = self.state.lock();
        state.purge(now, self.config.response_ttl);

        let seen = state.incoming.contains_key(&key);
        let outcome = match state.responses.get(&key) {
            _ if !seen => Ok(()),
            None => Ok(()),
            Some(ack) if ack.resend => Ok(()),
            Some(_) if ev.action == Action::Focus => {
                event.action = Action::Focus;
                Ok(())
            }
            Some(ack) if ack.snapshot.text != ev.text => {
                event.diffs = self
                    .differ
                    .diff(ack.snapshot.text.as_bytes(), ev.text.as_bytes());
                event.reference_state = Some(ack.snapshot.hash);
                Ok(())
            }
            Some(ack) if !same_set(&ack.snapshot.selections, &selections) => {
                event.action = Action::Selection;
                event.reference_state = Some(ack.snapshot.hash);
                Ok(())
            }
            Some(_) => Err(ProcessError::Duplicate),
        };

        state.incoming.insert(
            key,
            Snapshot {
                hash: text_hash,
                text: ev.text.clone(),
                selections,
                at: now,
            },
        );
        drop(state);

        match outcome {
            Ok(()) => {
                tracing::trace!(
                    "Normalized {} event for {} ({}) with {} diffs",
                    event.action,
                    event.filename,
                    event.source,
                    event.diffs.len()
                );
                Ok(event)
            }
            Err(err) => {
                tracing::trace!("Duplicate event for {} ({})", event.filename, event.source);
                Err(err)
            }
        }
    }

    /// Record what the daemon believes the client now holds.
    ///
    /// `filename` may be native or canonical.
    pub fn update_latest_response(
        &self,
        source: &str,
        filename: &str,
        text: &str,
        selections: &[ByteSelection],
        resend: bool,
    ) {
        let now = self.clock.now();
        let filename = canonical_path(filename).unwrap_or_else(|_| filename.to_string());
        let mut state = self.state.lock();
        state.purge(now, self.config.response_ttl);
        state.responses.insert(
            FileKey {
                filename,
                source: source.to_string(),
            },
            Acknowledged {
                snapshot: Snapshot {
                    hash: ContentHash::of(text.as_bytes()),
                    text: text.to_string(),
                    selections: selections.to_vec(),
                    at: now,
                },
                resend,
            },
        );
    }

    /// Forget every incoming and acknowledged record.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.incoming.clear();
        state.responses.clear();
        tracing::info!("event processor reset");
    }
}

impl std::fmt::Debug for EventProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventProcessor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn decode_selections(
    text: &str,
    selections: &[Selection],
) -> Result<Vec<ByteSelection>, OffsetError> {
    selections
        .iter()
        .map(|sel| {
            Ok(ByteSelection::new(
                sel.encoding.to_byte_offset(text, sel.start)?,
                sel.encoding.to_byte_offset(text, sel.end)?,
            ))
        })
        .collect()
}

fn same_set(a: &[ByteSelection], b: &[ByteSelection]) -> bool {
    a.iter().collect::<HashSet<_>>() == b.iter().collect::<HashSet<_>>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use bufsync_types::{Diff, OffsetEncoding};

    const PATH: &str = "/src.py";

    fn processor() -> EventProcessor {
        EventProcessor::new(ProcessorConfig {
            max_file_size_bytes: 1024,
            ..ProcessorConfig::default()
        })
    }

    fn edit(filename: &str, text: &str) -> EditorEvent {
        EditorEvent {
            source: "atom".into(),
            action: Action::Edit,
            filename: filename.into(),
            text: text.into(),
            ..EditorEvent::default()
        }
    }

    fn with_cursor(mut ev: EditorEvent, offset: i64, encoding: OffsetEncoding) -> EditorEvent {
        ev.selections = vec![Selection {
            start: offset,
            end: offset,
            encoding,
        }];
        ev
    }

    fn ack(processor: &EventProcessor, event: &Event, resend: bool) {
        processor.update_latest_response(
            &event.source,
            &event.filename,
            event.text.as_deref().unwrap_or_default(),
            &event.selections,
            resend,
        );
    }

    #[test]
    fn unsaved_file() {
        let p = processor();
        for _ in 0..10 {
            assert_eq!(
                p.process_event(&EditorEvent::default()),
                Err(ProcessError::UnsavedFile)
            );
        }
    }

    #[test]
    fn unsupported_file() {
        let p = processor();
        for _ in 0..10 {
            assert_eq!(
                p.process_event(&edit("/src.bad", "")),
                Err(ProcessError::UnsupportedFile)
            );
        }
        assert_eq!(
            p.process_event(&edit("/Makefile", "")),
            Err(ProcessError::UnsupportedFile)
        );
    }

    #[test]
    fn relative_path_is_invalid() {
        let p = processor();
        assert_eq!(
            p.process_event(&edit("src.py", "")),
            Err(ProcessError::InvalidPath(NotAbsolute("src.py".into())))
        );
    }

    #[test]
    fn edit_distance_bound_comes_from_config() {
        let p = EventProcessor::new(ProcessorConfig {
            max_edit_distance: 1,
            ..ProcessorConfig::default()
        });
        let first = p.process_event(&edit(PATH, "aXbYc")).unwrap();
        ack(&p, &first, false);

        let event = p.process_event(&edit(PATH, "a1b2c")).unwrap();
        assert_eq!(
            event.diffs,
            vec![Diff::delete(1, "XbY"), Diff::insert(1, "1b2")]
        );

        // The default bound finds the two single-byte substitutions.
        let p = processor();
        let first = p.process_event(&edit(PATH, "aXbYc")).unwrap();
        ack(&p, &first, false);
        let event = p.process_event(&edit(PATH, "a1b2c")).unwrap();
        assert_eq!(event.diffs.len(), 4);
    }

    #[test]
    fn skip_event() {
        let p = processor();
        let mut ev = edit(PATH, "");
        ev.action = Action::Skip;
        for _ in 0..10 {
            assert_eq!(p.process_event(&ev), Err(ProcessError::Skipped));
        }
    }

    #[test]
    fn file_too_large() {
        let p = processor();
        let ev = edit(PATH, &"d".repeat(1024));
        for _ in 0..10 {
            assert_eq!(p.process_event(&ev), Err(ProcessError::FileTooLarge));
        }
        // One byte under the limit is fine.
        assert!(p.process_event(&edit(PATH, &"d".repeat(1023))).is_ok());
    }

    #[test]
    fn lost_focus_is_unused() {
        let p = processor();
        let mut ev = edit(PATH, "");
        ev.action = Action::LostFocus;
        for _ in 0..10 {
            let err = p.process_event(&ev).unwrap_err();
            assert_eq!(err, ProcessError::Unused);
            assert!(err.is_expected());
        }
    }

    #[test]
    fn duplicates_after_acknowledgment() {
        let p = processor();
        let text = "d".repeat(10);
        for i in 0..10 {
            match p.process_event(&edit(PATH, &text)) {
                Ok(event) => {
                    assert_eq!(i, 0);
                    assert_eq!(event.action, Action::Edit);
                    assert_eq!(event.text.as_deref(), Some(text.as_str()));
                }
                Err(err) => {
                    assert!(i > 0);
                    assert_eq!(err, ProcessError::Duplicate);
                    assert!(err.is_expected());
                }
            }
            p.update_latest_response("atom", PATH, &text, &[], false);
        }
    }

    #[test]
    fn focus_forces_full_text() {
        let p = processor();
        for i in 0..10 {
            let text = "d".repeat(i + 1);
            let mut ev = edit(PATH, &text);
            ev.action = Action::Focus;
            let event = p.process_event(&ev).unwrap();

            // The first focus is an edit: nothing is known about the file yet.
            let expected = if i == 0 { Action::Edit } else { Action::Focus };
            assert_eq!(event.action, expected);
            assert_eq!(event.text.as_deref(), Some(text.as_str()));
            assert!(event.diffs.is_empty());
            assert_eq!(event.reference_state, None);
            ack(&p, &event, false);
        }
    }

    #[test]
    fn selection_changed() {
        let p = processor();
        let text = "d".repeat(10);
        let hash = ContentHash::of(text.as_bytes());
        let checksum = Checksum::of(text.as_bytes());

        for i in 0..10 {
            let ev = with_cursor(edit(PATH, &text), i + 1, OffsetEncoding::Utf8);
            let event = p.process_event(&ev).unwrap();
            if i == 0 {
                assert_eq!(event.action, Action::Edit);
                assert_eq!(event.reference_state, None);
            } else {
                assert_eq!(event.action, Action::Selection);
                assert_eq!(event.reference_state, Some(hash));
            }
            assert_eq!(event.text.as_deref(), Some(text.as_str()));
            assert_eq!(event.text_hash, hash);
            assert_eq!(event.text_checksum, checksum);
            assert!(event.diffs.is_empty());
            ack(&p, &event, false);
        }
    }

    #[test]
    fn selection_order_does_not_matter() {
        let p = processor();
        let mut ev = edit(PATH, "abcdef");
        ev.selections = vec![
            Selection { start: 1, end: 2, encoding: OffsetEncoding::Utf8 },
            Selection { start: 4, end: 4, encoding: OffsetEncoding::Utf8 },
        ];
        let event = p.process_event(&ev).unwrap();
        ack(&p, &event, false);

        ev.selections.reverse();
        assert_eq!(p.process_event(&ev), Err(ProcessError::Duplicate));
    }

    #[test]
    fn unicode_selection() {
        let p = processor();
        // 1, 2, 3 and 4 UTF-8 bytes; 1, 1, 1 and 2 UTF-16 units.
        let text = "$£ई𠜎";

        for (idx, bytes) in [(1, 1), (2, 3), (3, 6), (4, 10)] {
            let event = p
                .process_event(&with_cursor(edit(PATH, text), idx, OffsetEncoding::Utf32))
                .unwrap();
            assert_eq!(event.selections, vec![ByteSelection::new(bytes, bytes)]);
        }

        let event = p
            .process_event(&with_cursor(edit(PATH, text), 6, OffsetEncoding::Utf8))
            .unwrap();
        assert_eq!(event.selections, vec![ByteSelection::new(6, 6)]);

        let event = p
            .process_event(&with_cursor(edit(PATH, text), 5, OffsetEncoding::Utf16))
            .unwrap();
        assert_eq!(event.selections, vec![ByteSelection::new(10, 10)]);

        let mut ev = edit(PATH, text);
        ev.selections = vec![Selection { start: -1, end: 5, encoding: OffsetEncoding::Utf16 }];
        assert!(matches!(p.process_event(&ev), Err(ProcessError::Decode(_))));

        ev.selections = vec![Selection { start: 5, end: 10, encoding: OffsetEncoding::Utf16 }];
        assert!(matches!(p.process_event(&ev), Err(ProcessError::Decode(_))));

        // Inside the surrogate pair.
        ev.selections = vec![Selection { start: 4, end: 4, encoding: OffsetEncoding::Utf16 }];
        assert!(matches!(p.process_event(&ev), Err(ProcessError::Decode(_))));
    }

    #[test]
    fn offset_conversion() {
        let p = processor();
        let mut ev = edit(PATH, "print(\"史史史史史史史史史史\")\n");
        ev.source = "intellij".into();
        let event = p
            .process_event(&with_cursor(ev, 20, OffsetEncoding::Utf16))
            .unwrap();
        assert_eq!(event.selections, vec![ByteSelection::new(40, 40)]);
    }

    #[test]
    fn resend_forces_full_text() {
        let p = processor();
        let mut previous: Option<ContentHash> = None;
        let mut resend = false;

        for i in 0..100 {
            let text = "d".repeat(i + 1);
            let event = p.process_event(&edit(PATH, &text)).unwrap();
            assert_eq!(event.action, Action::Edit);
            assert_eq!(event.text_hash, ContentHash::of(text.as_bytes()));
            assert_eq!(event.text.as_deref(), Some(text.as_str()));

            if i == 0 || resend {
                assert_eq!(event.reference_state, None);
                assert!(event.diffs.is_empty());
            } else {
                assert_eq!(event.reference_state, previous);
                assert_eq!(event.diffs, vec![Diff::insert(i, "d")]);
            }

            previous = Some(event.text_hash);
            resend = i % 3 == 1;
            ack(&p, &event, resend);
        }
    }

    #[test]
    fn reference_follows_acknowledgment() {
        let p = processor();
        let mut reference: Option<ContentHash> = None;

        for i in 0..100 {
            let text = "d".repeat(i + 1);
            let event = p.process_event(&edit(PATH, &text)).unwrap();
            assert_eq!(event.action, Action::Edit);

            match reference {
                // No acknowledgment yet: keep sending full text.
                None => {
                    assert_eq!(event.reference_state, None);
                    assert!(event.diffs.is_empty());
                }
                Some(hash) => {
                    assert_eq!(event.reference_state, Some(hash));
                    assert!(!event.diffs.is_empty());
                }
            }

            if i % 4 == 2 {
                ack(&p, &event, false);
                reference = Some(event.text_hash);
            }
        }
    }

    #[test]
    fn reference_concurrent() {
        let p = processor();
        std::thread::scope(|scope| {
            for n in 0..10 {
                let p = &p;
                scope.spawn(move || {
                    let filename = format!("/src{}.py", n);
                    let mut reference: Option<ContentHash> = None;
                    for i in 0..100 {
                        let text = "d".repeat(i + 1);
                        let event = p.process_event(&edit(&filename, &text)).unwrap();
                        assert_eq!(event.text_hash, ContentHash::of(text.as_bytes()));
                        assert_eq!(event.reference_state, reference);
                        assert_eq!(event.diffs.is_empty(), reference.is_none());

                        if (i + n) % 3 == 0 {
                            ack(p, &event, false);
                            reference = Some(event.text_hash);
                        }
                    }
                });
            }
        });
    }

    #[test]
    fn diff_reference_scenario() {
        let p = processor();
        let first = p.process_event(&edit(PATH, "d")).unwrap();
        assert_eq!(first.action, Action::Edit);
        assert_eq!(first.reference_state, None);
        ack(&p, &first, false);

        let second = p.process_event(&edit(PATH, "dd")).unwrap();
        assert_eq!(second.action, Action::Edit);
        assert_eq!(second.reference_state, Some(ContentHash::of(b"d")));
        assert_eq!(second.diffs, vec![Diff::insert(1, "d")]);
    }

    #[test]
    fn command_is_classified_like_edit() {
        let p = processor();
        let first = p.process_event(&edit(PATH, "a")).unwrap();
        ack(&p, &first, false);

        let mut ev = edit(PATH, "ab");
        ev.action = Action::Command;
        let event = p.process_event(&ev).unwrap();
        assert_eq!(event.action, Action::Edit);
        assert_eq!(event.diffs, vec![Diff::insert(1, "b")]);
    }

    #[test]
    fn windows_paths_share_a_key() {
        let p = processor();
        let first = p.process_event(&edit(r"C:\Src.py", "x")).unwrap();
        assert_eq!(first.filename, "/windows/c/src.py");
        p.update_latest_response("atom", r"c:\SRC.PY", "x", &[], false);
        assert_eq!(
            p.process_event(&edit(r"c:\src.py", "x")),
            Err(ProcessError::Duplicate)
        );
    }

    #[test]
    fn records_expire() {
        let clock = ManualClock::at_secs(1_000);
        let p = EventProcessor::with_clock(ProcessorConfig::default(), Arc::new(clock.clone()));

        let event = p.process_event(&edit(PATH, "x")).unwrap();
        ack(&p, &event, false);
        assert_eq!(
            p.process_event(&edit(PATH, "x")),
            Err(ProcessError::Duplicate)
        );

        clock.advance(DEFAULT_RESPONSE_TTL + Duration::from_secs(1));
        let event = p.process_event(&edit(PATH, "x")).unwrap();
        assert_eq!(event.action, Action::Edit);
        assert_eq!(event.reference_state, None);
    }

    #[test]
    fn reset_forgets_everything() {
        let p = processor();
        let event = p.process_event(&edit(PATH, "x")).unwrap();
        ack(&p, &event, false);
        p.reset();
        let event = p.process_event(&edit(PATH, "xy")).unwrap();
        assert_eq!(event.reference_state, None);
        assert!(event.diffs.is_empty());
    }
}
