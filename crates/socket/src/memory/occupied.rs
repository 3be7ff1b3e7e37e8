use crate::memory::rolling_buffer::Segment;
use bytes::Buf;
use std::collections::VecDeque;
use std::io::IoSlice;

/// A read-only view over the occupied bytes of a [`RollingBuffer`].
///
/// The view may span several segments. It implements [`Buf`], so a parser can
/// walk it chunk by chunk or gather it into [`IoSlice`]s for vectored I/O.
/// Advancing the view only moves the view; the buffer itself is released
/// through [`RollingBuffer::consume`].
///
/// [`RollingBuffer`]: crate::memory::RollingBuffer
/// [`RollingBuffer::consume`]: crate::memory::RollingBuffer::consume
#[derive(Debug, Clone)]
pub struct Occupied<'a> {
    segments: &'a VecDeque<Segment>,
    segment: usize,
    offset: usize,
    remaining: usize,
    start: u64,
}

impl<'a> Occupied<'a> {
    pub(crate) fn new(segments: &'a VecDeque<Segment>, offset: usize, len: usize, start: u64) -> Self {
        Self { segments, segment: 0, offset, remaining: len, start }
    }

    pub fn len(&self) -> usize {
        self.remaining
    }

    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    /// Absolute position of the first byte in the view.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Absolute position one past the last byte in the view.
    pub fn end(&self) -> u64 {
        self.start + self.remaining as u64
    }

    /// Absolute position of the byte `index` bytes into the view.
    ///
    /// # Panics
    ///
    /// Panics if `index` is past the end of the view.
    pub fn position(&self, index: usize) -> u64 {
        assert!(index <= self.remaining, "index {index} out of range for view of {} bytes", self.remaining);
        self.start + index as u64
    }

    /// Iterates over the contiguous pieces of the view.
    pub fn chunks(&self) -> impl Iterator<Item = &'a [u8]> + use<'a> {
        let segments = self.segments;
        let mut offset = self.offset;
        let mut remaining = self.remaining;
        segments.iter().skip(self.segment).map_while(move |segment| {
            if remaining == 0 {
                return None;
            }
            let len = (segment.len() - offset).min(remaining);
            let chunk = &segment.block[offset..offset + len];
            offset = 0;
            remaining -= len;
            Some(chunk)
        })
    }
}

impl Buf for Occupied<'_> {
    fn remaining(&self) -> usize {
        self.remaining
    }

    fn chunk(&self) -> &[u8] {
        if self.remaining == 0 {
            return &[];
        }

        let segment = &self.segments[self.segment];
        let len = (segment.len() - self.offset).min(self.remaining);
        &segment.block[self.offset..self.offset + len]
    }

    fn chunks_vectored<'b>(&'b self, dst: &mut [IoSlice<'b>]) -> usize {
        let mut filled = 0;
        for (slot, chunk) in dst.iter_mut().zip(self.chunks()) {
            *slot = IoSlice::new(chunk);
            filled += 1;
        }
        filled
    }

    fn advance(&mut self, mut cnt: usize) {
        assert!(cnt <= self.remaining, "cannot advance past the end of the view");
        self.start += cnt as u64;

        while cnt > 0 {
            let available = (self.segments[self.segment].len() - self.offset).min(self.remaining);
            if cnt < available {
                self.offset += cnt;
                self.remaining -= cnt;
                return;
            }

            cnt -= available;
            self.remaining -= available;
            self.segment += 1;
            self.offset = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::memory::{MemoryPool, RollingBuffer, SlabPool};
    use bytes::{Buf, BufMut};
    use std::io::IoSlice;
    use std::sync::Arc;

    fn filled(page_size: usize, data: &[u8]) -> RollingBuffer {
        let pool: Arc<dyn MemoryPool> = Arc::new(SlabPool::with_page_size(page_size, 4));
        let mut buffer = RollingBuffer::new(pool);
        buffer.put_slice(data);
        buffer
    }

    #[test]
    fn chunks_follow_segment_boundaries() {
        let buffer = filled(4, b"abcdefghij");
        let chunks: Vec<&[u8]> = buffer.occupied().chunks().collect();

        assert_eq!(chunks, vec![&b"abcd"[..], &b"efgh"[..], &b"ij"[..]]);
    }

    #[test]
    fn advance_moves_positions_and_chunks() {
        let buffer = filled(4, b"abcdefghij");
        let mut view = buffer.occupied();

        view.advance(5);
        assert_eq!(view.start(), 5);
        assert_eq!(view.end(), 10);
        assert_eq!(view.chunk(), b"fgh");

        view.advance(3);
        assert_eq!(view.chunk(), b"ij");
        assert_eq!(view.copy_to_bytes(2).as_ref(), b"ij");
        assert!(view.chunk().is_empty());
    }

    #[test]
    fn vectored_chunks_gather_every_segment() {
        let buffer = filled(3, b"scatter-gather");
        let view = buffer.occupied();

        let mut slices = [IoSlice::new(&[]); 8];
        let count = view.chunks_vectored(&mut slices);

        let gathered: Vec<u8> = slices[..count].iter().flat_map(|slice| slice.iter().copied()).collect();
        assert_eq!(count, 5);
        assert_eq!(gathered, b"scatter-gather");
    }

    #[test]
    fn vectored_chunks_respect_destination_length() {
        let buffer = filled(2, b"abcdef");
        let view = buffer.occupied();

        let mut slices = [IoSlice::new(&[]); 2];
        assert_eq!(view.chunks_vectored(&mut slices), 2);
        assert_eq!(&*slices[1], b"cd");
    }
}
