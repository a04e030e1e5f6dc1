//! Filename canonicalization.
//!
//! Editors on Windows report `C:\Users\me\src.py`, possibly with varying
//! case. Every cache in the daemon keys on the canonical unix-style form so
//! the same file always lands on the same key.

use thiserror::Error;

/// A path that is neither a unix nor a Windows absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not an absolute path: {0:?}")]
pub struct NotAbsolute(pub String);

/// Canonicalize a native path.
///
/// - Unix absolute paths are returned unchanged.
/// - `C:\a\B` and `C:/a/B` become `/windows/c/a/b`.
/// - UNC paths `\\host\share\x` become `/windows/unc/host/share/x`.
/// - Windows-style paths are lower-cased (case-insensitive filesystems).
/// - Anything else is relative and rejected.
///
/// Idempotent.
pub fn canonical_path(native: &str) -> Result<String, NotAbsolute> {
    let bytes = native.as_bytes();

    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        let drive = native[..1].to_ascii_lowercase();
        let rest = native[2..].replace('\\', "/");
        if !rest.is_empty() && !rest.starts_with('/') {
            return Err(NotAbsolute(native.to_string()));
        }
        return Ok(format!("/windows/{}{}", drive, rest.to_lowercase()));
    }

    if let Some(unc) = native.strip_prefix("\\\\") {
        if unc.is_empty() {
            return Err(NotAbsolute(native.to_string()));
        }
        let rest = unc.replace('\\', "/").to_lowercase();
        return Ok(format!("/windows/unc/{}", rest));
    }

    if native.starts_with('/') {
        return Ok(native.to_string());
    }

    Err(NotAbsolute(native.to_string()))
}
