//! Selection offset encodings.
//!
//! Editors report cursor positions in whatever unit their string type
//! uses: bytes (UTF-8), UTF-16 code units (JetBrains, VS Code), or code
//! points. Everything downstream of the event processor works in UTF-8
//! byte offsets, so offsets are converted once, at the boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::OffsetError;

/// The unit a selection offset is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetEncoding {
    /// UTF-8 bytes.
    #[default]
    #[serde(alias = "utf-8")]
    Utf8,
    /// UTF-16 code units.
    #[serde(alias = "utf-16")]
    Utf16,
    /// Unicode code points.
    #[serde(alias = "utf-32")]
    Utf32,
}

impl OffsetEncoding {
    /// Convert `offset`, expressed in this encoding, to a UTF-8 byte offset
    /// into `text`.
    ///
    /// The end of the text is a valid offset. Negative offsets, offsets
    /// past the end, and offsets that land inside a code point (or inside
    /// a surrogate pair for UTF-16) are rejected.
    pub fn to_byte_offset(self, text: &str, offset: i64) -> Result<usize, OffsetError> {
        if offset < 0 {
            return Err(OffsetError::Negative { offset });
        }
        let target = usize::try_from(offset).map_err(|_| OffsetError::OutOfBounds {
            offset,
            len: self.len_of(text),
        })?;

        if self == Self::Utf8 {
            if target > text.len() {
                return Err(OffsetError::OutOfBounds {
                    offset,
                    len: text.len(),
                });
            }
            if !text.is_char_boundary(target) {
                return Err(OffsetError::Misaligned {
                    offset,
                    encoding: self,
                });
            }
            return Ok(target);
        }

        let mut units = 0usize;
        for (byte, ch) in text.char_indices() {
            if units == target {
                return Ok(byte);
            }
            let width = self.width(ch);
            if units + width > target {
                return Err(OffsetError::Misaligned {
                    offset,
                    encoding: self,
                });
            }
            units += width;
        }

        if units == target {
            Ok(text.len())
        } else {
            Err(OffsetError::OutOfBounds { offset, len: units })
        }
    }

    /// Length of `text` in this encoding's units.
    pub fn len_of(self, text: &str) -> usize {
        match self {
            Self::Utf8 => text.len(),
            Self::Utf16 => text.encode_utf16().count(),
            Self::Utf32 => text.chars().count(),
        }
    }

    fn width(self, ch: char) -> usize {
        match self {
            Self::Utf8 => ch.len_utf8(),
            Self::Utf16 => ch.len_utf16(),
            Self::Utf32 => 1,
        }
    }
}

impl fmt::Display for OffsetEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Utf8 => "utf8",
            Self::Utf16 => "utf16",
            Self::Utf32 => "utf32",
        };
        f.write_str(name)
    }
}
