use crate::memory::occupied::Occupied;
use crate::memory::pool::{self, MemoryPool, PooledBlock};
use bytes::BufMut;
use bytes::buf::UninitSlice;
use std::collections::VecDeque;
use std::sync::Arc;

/// One pooled block in the buffer's chain, tagged with the absolute position
/// of its first byte.
#[derive(Debug)]
pub(crate) struct Segment {
    pub(crate) block: PooledBlock,
    pub(crate) running_index: u64,
}

impl Segment {
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.block.len()
    }
}

/// A growable byte queue built from pooled segments.
///
/// Bytes are written at the tail into "trailing" memory obtained from
/// [`get_writable`](Self::get_writable) and made visible with
/// [`commit_write`](Self::commit_write). Written bytes form the "occupied"
/// region, read through [`occupied`](Self::occupied) without copying and
/// released from the head with [`consume`](Self::consume). A segment goes back
/// to the pool as soon as its last byte is consumed.
///
/// Every byte has an absolute position that never goes backwards for the life
/// of the buffer, so positions taken from an [`Occupied`] view stay comparable
/// with [`end`](Self::end) after later writes and consumes.
#[derive(Debug)]
pub struct RollingBuffer {
    pool: Arc<dyn MemoryPool>,
    segments: VecDeque<Segment>,
    // offset of the occupied region inside the first segment
    first_index: usize,
    // offset of the trailing region inside the last segment
    last_index: usize,
    // absolute position used when the chain is empty
    origin: u64,
}

impl RollingBuffer {
    pub fn new(pool: Arc<dyn MemoryPool>) -> Self {
        Self { pool, segments: VecDeque::new(), first_index: 0, last_index: 0, origin: 0 }
    }

    /// Absolute position of the first occupied byte.
    pub fn start(&self) -> u64 {
        self.segments.front().map_or(self.origin, |first| first.running_index + self.first_index as u64)
    }

    /// Absolute position one past the last written byte.
    pub fn end(&self) -> u64 {
        self.segments.back().map_or(self.origin, |last| last.running_index + self.last_index as u64)
    }

    /// Number of occupied bytes.
    #[allow(clippy::cast_possible_truncation, reason = "occupied bytes are resident in memory")]
    pub fn len(&self) -> usize {
        (self.end() - self.start()) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.start() == self.end()
    }

    /// Number of segments currently rented from the pool.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Returns the trailing memory of the buffer.
    ///
    /// `size_hint` only sizes a newly rented segment; `0` asks the pool for its
    /// page size. The returned slice is never empty, and the same region is
    /// returned until [`commit_write`](Self::commit_write) is called.
    pub fn get_writable(&mut self, size_hint: usize) -> &mut [u8] {
        if self.is_empty() {
            self.recycle_last_segment();
        }

        let full = self.segments.back().is_none_or(|last| self.last_index == last.len());
        if full {
            let last = self.append_segment(size_hint);
            return &mut last.block[..];
        }

        let last_index = self.last_index;
        match self.segments.back_mut() {
            Some(last) => &mut last.block[last_index..],
            None => &mut [],
        }
    }

    /// Marks `count` bytes of the trailing memory as written.
    ///
    /// # Panics
    ///
    /// Panics if `count` exceeds the trailing memory of the last segment.
    pub fn commit_write(&mut self, count: usize) {
        let capacity = self.segments.back().map_or(0, |last| last.len() - self.last_index);
        assert!(count <= capacity, "commit of {count} bytes exceeds the {capacity} writable bytes");
        self.last_index += count;
    }

    /// A zero-copy view of every occupied byte.
    pub fn occupied(&self) -> Occupied<'_> {
        Occupied::new(&self.segments, self.first_index, self.len(), self.start())
    }

    /// Releases `count` bytes from the head of the occupied region.
    ///
    /// # Panics
    ///
    /// Panics if `count` exceeds the occupied length.
    pub fn consume(&mut self, count: usize) {
        let occupied = self.len();
        assert!(count <= occupied, "cannot consume {count} bytes, only {occupied} are occupied");

        let mut remaining = count;
        while remaining > 0 {
            let Some(first) = self.segments.front() else {
                break;
            };

            let available = first.len() - self.first_index;
            if remaining < available {
                self.first_index += remaining;
                break;
            }

            remaining -= available;
            self.release_first_segment();
        }

        if self.segments.front().is_some_and(|first| self.first_index == first.len()) {
            self.release_first_segment();
        }
    }

    /// Releases every occupied byte before the absolute `position`.
    ///
    /// # Panics
    ///
    /// Panics if `position` lies outside the occupied region.
    #[allow(clippy::cast_possible_truncation, reason = "bounded by the occupied length")]
    pub fn consume_to(&mut self, position: u64) {
        let start = self.start();
        assert!(
            (start..=self.end()).contains(&position),
            "position {position} is outside the occupied region {start}..{}",
            self.end()
        );
        self.consume((position - start) as usize);
    }

    /// Whether bytes were written after the `examined` position.
    pub fn has_unexamined(&self, examined: u64) -> bool {
        !self.is_empty() && examined != self.end()
    }

    /// Returns every segment to the pool. Safe to call more than once.
    pub fn dispose(&mut self) {
        self.origin = self.end();
        self.first_index = 0;
        self.last_index = 0;
        self.segments.clear();
    }

    fn append_segment(&mut self, size_hint: usize) -> &mut Segment {
        let running_index = self.end();
        let block = pool::rent(&self.pool, size_hint);
        self.segments.push_back(Segment { block, running_index });
        if self.segments.len() == 1 {
            self.first_index = 0;
        }
        self.last_index = 0;

        let index = self.segments.len() - 1;
        &mut self.segments[index]
    }

    // everything was consumed, so the single remaining segment can be written
    // from its start again; its running index moves forward to keep positions
    // monotonic
    fn recycle_last_segment(&mut self) {
        let end = self.end();
        if let Some(last) = self.segments.back_mut() {
            last.running_index = end;
            self.first_index = 0;
            self.last_index = 0;
        }
    }

    fn release_first_segment(&mut self) {
        let end = self.end();
        if self.segments.pop_front().is_some() {
            if self.segments.is_empty() {
                self.origin = end;
                self.last_index = 0;
            }
            self.first_index = 0;
        }
    }
}

impl Drop for RollingBuffer {
    fn drop(&mut self) {
        self.dispose();
    }
}

// SAFETY: `chunk_mut` always hands out initialized pool memory from the last
// segment, and `advance_mut` only moves the write cursor inside that segment
// (`commit_write` panics otherwise).
unsafe impl BufMut for RollingBuffer {
    fn remaining_mut(&self) -> usize {
        usize::MAX - self.len()
    }

    unsafe fn advance_mut(&mut self, cnt: usize) {
        self.commit_write(cnt);
    }

    fn chunk_mut(&mut self) -> &mut UninitSlice {
        UninitSlice::new(self.get_writable(0))
    }
}
