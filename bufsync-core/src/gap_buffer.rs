//! Byte gap buffer.
//!
//! The buffer keeps its contents in one allocation laid out as
//! `[pre-gap bytes | gap | post-gap bytes]`. Edits happen at the gap, so a
//! stream of edits clustered around one moving cursor (live typing) costs
//! time proportional to how far the cursor moves, not to document size.

use thiserror::Error;

/// Gap space reserved on top of any growth request.
const MIN_GAP: usize = 64;

/// Error type for gap buffer operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GapBufferError {
    /// Offset (or offset + length) lies past the end of the buffer.
    #[error("offset {offset} + {len} out of bounds (buffer length: {buffer_len})")]
    OutOfBounds {
        /// Requested offset.
        offset: usize,
        /// Number of bytes the operation touches.
        len: usize,
        /// Logical buffer length.
        buffer_len: usize,
    },

    /// Bytes at the deletion point are not the bytes the caller expected.
    #[error("delete mismatch at offset {offset}")]
    DeleteMismatch {
        /// Offset of the deletion.
        offset: usize,
    },
}

/// A byte buffer with a movable gap.
#[derive(Debug, Clone)]
pub struct GapBuffer {
    /// `[pre-gap | gap | post-gap]`.
    data: Vec<u8>,
    /// First byte of the gap.
    gap_start: usize,
    /// First byte after the gap.
    gap_end: usize,
}

impl GapBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::from_bytes(&[])
    }

    /// Create a buffer holding `bytes`, with the gap at the end.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut data = Vec::with_capacity(bytes.len() + MIN_GAP);
        data.extend_from_slice(bytes);
        data.resize(bytes.len() + MIN_GAP, 0);
        Self {
            data,
            gap_start: bytes.len(),
            gap_end: bytes.len() + MIN_GAP,
        }
    }

    /// Logical length (gap excluded).
    pub fn len(&self) -> usize {
        self.data.len() - self.gap_len()
    }

    /// True if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current gap position in logical coordinates.
    pub fn gap_position(&self) -> usize {
        self.gap_start
    }

    fn gap_len(&self) -> usize {
        self.gap_end - self.gap_start
    }

    /// Contents as two slices: before and after the gap.
    pub fn as_slices(&self) -> (&[u8], &[u8]) {
        (&self.data[..self.gap_start], &self.data[self.gap_end..])
    }

    /// Copy the contents out.
    pub fn to_vec(&self) -> Vec<u8> {
        let (front, back) = self.as_slices();
        let mut out = Vec::with_capacity(front.len() + back.len());
        out.extend_from_slice(front);
        out.extend_from_slice(back);
        out
    }

    /// Replace the contents wholesale.
    pub fn set_contents(&mut self, bytes: &[u8]) {
        *self = Self::from_bytes(bytes);
    }

    /// Insert `bytes` at logical `offset`.
    pub fn insert(&mut self, offset: usize, bytes: &[u8]) -> Result<(), GapBufferError> {
        self.check_bounds(offset, 0)?;
        if bytes.len() > self.gap_len() {
            self.grow(offset, bytes.len());
        } else {
            self.move_gap(offset);
        }
        self.data[self.gap_start..self.gap_start + bytes.len()].copy_from_slice(bytes);
        self.gap_start += bytes.len();
        Ok(())
    }

    /// Delete `expected.len()` bytes at logical `offset`.
    ///
    /// With `verify`, the bytes present must equal `expected`; on mismatch
    /// nothing is deleted.
    pub fn delete(
        &mut self,
        offset: usize,
        expected: &[u8],
        verify: bool,
    ) -> Result<(), GapBufferError> {
        let len = expected.len();
        self.check_bounds(offset, len)?;
        self.move_gap(offset);
        if verify && self.data[self.gap_end..self.gap_end + len] != *expected {
            return Err(GapBufferError::DeleteMismatch { offset });
        }
        self.gap_end += len;
        Ok(())
    }

    fn check_bounds(&self, offset: usize, len: usize) -> Result<(), GapBufferError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len() => Ok(()),
            _ => Err(GapBufferError::OutOfBounds {
                offset,
                len,
                buffer_len: self.len(),
            }),
        }
    }

    /// Slide the gap so it starts at logical `pos`. Cost is the distance moved.
    fn move_gap(&mut self, pos: usize) {
        if pos < self.gap_start {
            let shift = self.gap_start - pos;
            let src = pos..self.gap_start;
            self.data.copy_within(src, self.gap_end - shift);
            self.gap_start = pos;
            self.gap_end -= shift;
        } else if pos > self.gap_start {
            let shift = pos - self.gap_start;
            let src = self.gap_end..self.gap_end + shift;
            self.data.copy_within(src, self.gap_start);
            self.gap_start += shift;
            self.gap_end += shift;
        }
    }

    /// Reallocate with a gap of at least `needed` bytes placed at `pos`.
    fn grow(&mut self, pos: usize, needed: usize) {
        let len = self.len();
        let gap = needed + MIN_GAP.max(len / 2);

        let mut data = Vec::with_capacity(len + gap);
        let (front, back) = self.as_slices();
        if pos <= front.len() {
            data.extend_from_slice(&front[..pos]);
            data.resize(pos + gap, 0);
            data.extend_from_slice(&front[pos..]);
            data.extend_from_slice(back);
        } else {
            let split = pos - front.len();
            data.extend_from_slice(front);
            data.extend_from_slice(&back[..split]);
            data.resize(pos + gap, 0);
            data.extend_from_slice(&back[split..]);
        }

        self.data = data;
        self.gap_start = pos;
        self.gap_end = pos + gap;
    }
}

impl Default for GapBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for GapBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.to_vec() == other.to_vec()
    }
}

impl Eq for GapBuffer {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_buffer_is_empty() {
        let buf = GapBuffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.to_vec(), b"");
    }

    #[test]
    fn from_bytes_keeps_contents() {
        let buf = GapBuffer::from_bytes(b"hello");
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.to_vec(), b"hello");
        assert_eq!(buf.gap_position(), 5);
    }

    #[test]
    fn insert_at_front_middle_and_end() {
        let mut buf = GapBuffer::from_bytes(b"ace");
        buf.insert(1, b"b").unwrap();
        buf.insert(3, b"d").unwrap();
        buf.insert(0, b">").unwrap();
        buf.insert(6, b"<").unwrap();
        assert_eq!(buf.to_vec(), b">abcde<");
    }

    #[test]
    fn insert_larger_than_gap_grows() {
        let mut buf = GapBuffer::from_bytes(b"ab");
        let big = vec![b'x'; MIN_GAP * 3];
        buf.insert(1, &big).unwrap();

        let mut expected = b"a".to_vec();
        expected.extend_from_slice(&big);
        expected.push(b'b');
        assert_eq!(buf.to_vec(), expected);
        assert_eq!(buf.gap_position(), 1 + big.len());
    }

    #[test]
    fn grow_when_gap_is_behind_insert_point() {
        let mut buf = GapBuffer::from_bytes(b"abcdef");
        buf.insert(1, b"-").unwrap(); // gap now after "a-"
        let big = vec![b'y'; MIN_GAP * 2];
        buf.insert(5, &big).unwrap();

        let mut expected = b"a-bcd".to_vec();
        expected.extend_from_slice(&big);
        expected.extend_from_slice(b"ef");
        assert_eq!(buf.to_vec(), expected);
    }

    #[test]
    fn delete_verified() {
        let mut buf = GapBuffer::from_bytes(b"hello world");
        buf.delete(5, b" world", true).unwrap();
        assert_eq!(buf.to_vec(), b"hello");
    }

    #[test]
    fn delete_mismatch_leaves_contents() {
        let mut buf = GapBuffer::from_bytes(b"hello");
        let err = buf.delete(0, b"jell", true).unwrap_err();
        assert_eq!(err, GapBufferError::DeleteMismatch { offset: 0 });
        assert_eq!(buf.to_vec(), b"hello");
    }

    #[test]
    fn delete_unverified_ignores_contents() {
        let mut buf = GapBuffer::from_bytes(b"hello");
        buf.delete(0, b"????", false).unwrap();
        assert_eq!(buf.to_vec(), b"o");
    }

    #[test]
    fn out_of_bounds_is_rejected() {
        let mut buf = GapBuffer::from_bytes(b"abc");
        assert!(matches!(
            buf.insert(4, b"x"),
            Err(GapBufferError::OutOfBounds { .. })
        ));
        assert!(matches!(
            buf.delete(2, b"cd", false),
            Err(GapBufferError::OutOfBounds { .. })
        ));
        assert!(matches!(
            buf.delete(usize::MAX, b"c", false),
            Err(GapBufferError::OutOfBounds { .. })
        ));
        assert_eq!(buf.to_vec(), b"abc");
    }

    #[test]
    fn typing_moves_gap_with_cursor() {
        let mut buf = GapBuffer::new();
        for (i, b) in b"fn main() {}".iter().enumerate() {
            buf.insert(i, &[*b]).unwrap();
        }
        assert_eq!(buf.to_vec(), b"fn main() {}");
        assert_eq!(buf.gap_position(), 12);

        buf.delete(11, b"}", true).unwrap();
        buf.insert(11, b"\n}").unwrap();
        assert_eq!(buf.to_vec(), b"fn main() {\n}");
    }

    #[test]
    fn set_contents_resets() {
        let mut buf = GapBuffer::from_bytes(b"old");
        buf.insert(1, b"xx").unwrap();
        buf.set_contents(b"new");
        assert_eq!(buf.to_vec(), b"new");
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(usize, Vec<u8>),
        Delete(usize, usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (any::<usize>(), proptest::collection::vec(any::<u8>(), 0..200))
                .prop_map(|(at, bytes)| Op::Insert(at, bytes)),
            (any::<usize>(), 0usize..40).prop_map(|(at, len)| Op::Delete(at, len)),
        ]
    }

    proptest! {
        #[test]
        fn matches_vec_model(
            initial in proptest::collection::vec(any::<u8>(), 0..300),
            ops in proptest::collection::vec(op(), 0..60),
        ) {
            let mut buf = GapBuffer::from_bytes(&initial);
            let mut model = initial.clone();

            for op in ops {
                match op {
                    Op::Insert(at, bytes) => {
                        let at = at % (model.len() + 1);
                        buf.insert(at, &bytes).unwrap();
                        model.splice(at..at, bytes);
                    }
                    Op::Delete(at, len) => {
                        let at = at % (model.len() + 1);
                        let len = len.min(model.len() - at);
                        let expected: Vec<u8> = model[at..at + len].to_vec();
                        buf.delete(at, &expected, true).unwrap();
                        model.drain(at..at + len);
                    }
                }
                prop_assert_eq!(buf.len(), model.len());
            }

            prop_assert_eq!(buf.to_vec(), model);
        }
    }
}
