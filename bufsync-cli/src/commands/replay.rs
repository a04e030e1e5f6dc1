//! Replay a recording of editor events.
//!
//! Input is one `EditorEvent` JSON object per line. Output is one JSON
//! object per input line: `{"ok": <EventResponse>}` when the event was
//! handled, `{"error": "...", "expected": <bool>}` otherwise. Blank lines
//! are skipped.

use anyhow::{Context, Result};
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use bufsync_daemon::{Config, SyncSession};
use bufsync_types::EditorEvent;

/// Counts of what happened during a replay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// Events handled, resend or not.
    pub handled: usize,
    /// Handled events whose response asked for full text.
    pub resends: usize,
    /// Duplicate or unused events.
    pub expected_errors: usize,
    /// Rejected events and unparseable lines.
    pub errors: usize,
}

/// Run the replay command.
pub async fn run(config: &Config, input: &Path, reset_every: Option<usize>) -> Result<()> {
    let session = SyncSession::new(config);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let summary = if input == Path::new("-") {
        let stdin = std::io::stdin();
        replay(&session, stdin.lock(), &mut out, reset_every).await?
    } else {
        let file = std::fs::File::open(input)
            .with_context(|| format!("Failed to open {}", input.display()))?;
        replay(&session, BufReader::new(file), &mut out, reset_every).await?
    };

    tracing::info!(
        "Replay finished: handled={} resends={} expected={} errors={}",
        summary.handled,
        summary.resends,
        summary.expected_errors,
        summary.errors
    );
    Ok(())
}

/// Feed every line of `reader` through `session`, writing one result line
/// per event to `out`.
pub async fn replay<R: BufRead, W: Write>(
    session: &SyncSession,
    reader: R,
    out: &mut W,
    reset_every: Option<usize>,
) -> Result<Summary> {
    let mut summary = Summary::default();
    let mut seen = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }

        let result = match serde_json::from_str::<EditorEvent>(&line) {
            Ok(event) => match session.handle_event(&event).await {
                Ok(response) => {
                    summary.handled += 1;
                    if response.resend {
                        summary.resends += 1;
                    }
                    json!({ "ok": response })
                }
                Err(err) => {
                    let expected = err.is_expected();
                    if expected {
                        summary.expected_errors += 1;
                    } else {
                        summary.errors += 1;
                    }
                    json!({ "error": err.to_string(), "expected": expected })
                }
            },
            Err(err) => {
                summary.errors += 1;
                tracing::warn!("Skipping line {}: {}", index + 1, err);
                json!({
                    "error": format!("line {}: invalid event: {}", index + 1, err),
                    "expected": false,
                })
            }
        };

        serde_json::to_writer(&mut *out, &result).context("Failed to write output")?;
        writeln!(out).context("Failed to write output")?;

        seen += 1;
        if reset_every.is_some_and(|n| n > 0 && seen % n == 0) {
            session.reset();
        }
    }

    Ok(summary)
}
