//! Byte-level differ.
//!
//! Produces an ordered insert/delete script turning one byte sequence into
//! another. Inputs are treated as raw bytes; no encoding is assumed, so a
//! diff boundary may fall inside a multi-byte UTF-8 sequence.
//!
//! The common prefix and suffix are stripped first (the common case for
//! live typing is a single small change), then Myers' O(ND) algorithm runs
//! on what remains. Past the search bound (see
//! [`Differ::with_max_edit_distance`]) the remaining middle is replaced
//! wholesale: still a correct script, just not a minimal one. A bound of
//! `usize::MAX` always yields a minimal script.

use bufsync_types::{Diff, DiffType};

/// Default bound on the Myers search depth.
pub const DEFAULT_MAX_EDIT_DISTANCE: usize = 1024;

/// Computes edit scripts between byte sequences.
#[derive(Debug, Clone, Copy)]
pub struct Differ {
    max_edit_distance: usize,
}

/// One step of an edit path. Indices point into the trimmed inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Equal,
    Insert(usize),
    Delete(usize),
}

impl Differ {
    /// Create a differ with the default search bound.
    pub fn new() -> Self {
        Self {
            max_edit_distance: DEFAULT_MAX_EDIT_DISTANCE,
        }
    }

    /// Create a differ with a custom search bound.
    ///
    /// `usize::MAX` disables the fallback, so every script is minimal.
    pub fn with_max_edit_distance(max_edit_distance: usize) -> Self {
        Self { max_edit_distance }
    }

    /// Diff `old` against `new`.
    ///
    /// Applying the result to `old` front-to-back yields `new`.
    pub fn diff(&self, old: &[u8], new: &[u8]) -> Vec<Diff> {
        let prefix = common_prefix(old, new);
        let suffix = common_suffix(&old[prefix..], &new[prefix..]);
        let a = &old[prefix..old.len() - suffix];
        let b = &new[prefix..new.len() - suffix];

        let mut script = Script::new(prefix);
        if a.is_empty() && b.is_empty() {
            return script.finish();
        }

        match shortest_edit(a, b, self.max_edit_distance) {
            Some(trace) => {
                for step in backtrack(a, b, &trace) {
                    match step {
                        Step::Equal => script.advance(),
                        Step::Insert(j) => script.push(DiffType::Insert, b[j]),
                        Step::Delete(i) => script.push(DiffType::Delete, a[i]),
                    }
                }
            }
            None => {
                tracing::trace!(
                    "Edit distance bound {} exceeded, replacing {} bytes with {}",
                    self.max_edit_distance,
                    a.len(),
                    b.len()
                );
                script.extend(DiffType::Delete, a);
                script.extend(DiffType::Insert, b);
            }
        }

        script.finish()
    }
}

impl Default for Differ {
    fn default() -> Self {
        Self::new()
    }
}

/// Diff with the default differ.
pub fn diff(old: &[u8], new: &[u8]) -> Vec<Diff> {
    Differ::new().diff(old, new)
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix(a: &[u8], b: &[u8]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Builds diffs from single-byte steps, coalescing runs.
struct Script {
    /// Running offset into the buffer as edited so far.
    pos: usize,
    diffs: Vec<Diff>,
}

impl Script {
    fn new(pos: usize) -> Self {
        Self {
            pos,
            diffs: Vec::new(),
        }
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn push(&mut self, kind: DiffType, byte: u8) {
        self.extend(kind, &[byte]);
    }

    fn extend(&mut self, kind: DiffType, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let pos = self.pos;
        match self.diffs.last_mut() {
            Some(last)
                if last.kind == kind
                    && match kind {
                        DiffType::Insert => last.offset + last.text.len() == pos,
                        DiffType::Delete => last.offset == pos,
                    } =>
            {
                last.text.extend_from_slice(bytes);
            }
            _ => self.diffs.push(Diff {
                kind,
                offset: pos,
                text: bytes.to_vec(),
            }),
        }
        if kind == DiffType::Insert {
            self.pos += bytes.len();
        }
    }

    fn finish(self) -> Vec<Diff> {
        self.diffs
    }
}

/// Forward greedy Myers search.
///
/// Returns, for every depth `d`, a snapshot of the furthest-reaching x per
/// diagonal as it stood before round `d`. Snapshot `d` covers diagonals
/// `-(d + 1)..=(d + 1)`. `None` if the edit distance exceeds `max_d`.
fn shortest_edit(a: &[u8], b: &[u8], max_d: usize) -> Option<Vec<Vec<usize>>> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let bound = ((n + m) as usize).min(max_d);
    let off = bound as isize + 1;
    let mut v = vec![0usize; 2 * bound + 3];
    let mut trace = Vec::new();

    for d in 0..=bound as isize {
        let lo = (off - d - 1) as usize;
        let hi = (off + d + 1) as usize;
        trace.push(v[lo..=hi].to_vec());

        let mut k = -d;
        while k <= d {
            let idx = (off + k) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1] as isize
            } else {
                v[idx - 1] as isize + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx] = x as usize;
            if x >= n && y >= m {
                return Some(trace);
            }
            k += 2;
        }
    }
    None
}

/// Walk the trace back from `(n, m)` and return the edit path in order.
fn backtrack(a: &[u8], b: &[u8], trace: &[Vec<usize>]) -> Vec<Step> {
    let mut x = a.len() as isize;
    let mut y = b.len() as isize;
    let mut steps = Vec::with_capacity(a.len() + b.len());

    for (d, snapshot) in trace.iter().enumerate().rev() {
        let d = d as isize;
        let at = |k: isize| snapshot[(k + d + 1) as usize] as isize;
        let k = x - y;

        if d == 0 {
            while x > 0 && y > 0 {
                steps.push(Step::Equal);
                x -= 1;
                y -= 1;
            }
            break;
        }

        let prev_k = if k == -d || (k != d && at(k - 1) < at(k + 1)) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = at(prev_k);
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            steps.push(Step::Equal);
            x -= 1;
            y -= 1;
        }
        if x == prev_x {
            steps.push(Step::Insert(prev_y as usize));
        } else {
            steps.push(Step::Delete(prev_x as usize));
        }
        x = prev_x;
        y = prev_y;
    }

    steps.reverse();
    steps
}
