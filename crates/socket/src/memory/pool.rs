use crossbeam_queue::ArrayQueue;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Page size used when a caller does not ask for anything specific.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

const DEFAULT_MAX_RETAINED: usize = 1024;

/// A source of fixed-size memory blocks.
///
/// Blocks are handed out by [`MemoryPool::allocate`] and come back through
/// [`MemoryPool::release`] exactly once, when the [`PooledBlock`] owning them
/// is dropped. Implementations must accept a `min_size` of `0` and substitute
/// their own page size.
pub trait MemoryPool: Send + Sync + fmt::Debug {
    /// The block size handed out for a zero size hint.
    fn page_size(&self) -> usize;

    /// Returns a zeroed-or-reused block of at least `min_size` bytes.
    fn allocate(&self, min_size: usize) -> Box<[u8]>;

    /// Takes a block back. The block may be reused or freed.
    fn release(&self, block: Box<[u8]>);
}

/// Rents a block from `pool`, never asking it for zero bytes.
pub(crate) fn rent(pool: &Arc<dyn MemoryPool>, size_hint: usize) -> PooledBlock {
    let min_size = if size_hint > 0 { size_hint } else { pool.page_size() };
    PooledBlock { data: pool.allocate(min_size), pool: Arc::clone(pool) }
}

/// A rented block that returns itself to its pool on drop.
pub struct PooledBlock {
    data: Box<[u8]>,
    pool: Arc<dyn MemoryPool>,
}

impl fmt::Debug for PooledBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBlock").field("len", &self.data.len()).finish_non_exhaustive()
    }
}

impl Deref for PooledBlock {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl DerefMut for PooledBlock {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

impl Drop for PooledBlock {
    fn drop(&mut self) {
        let data = std::mem::take(&mut self.data);
        self.pool.release(data);
    }
}

/// The default pool: page-sized blocks kept on a bounded lock-free free list.
///
/// Requests larger than a page are served with a dedicated allocation which is
/// freed, not retained, when it comes back.
pub struct SlabPool {
    page_size: usize,
    free: ArrayQueue<Box<[u8]>>,
    outstanding: AtomicUsize,
}

impl SlabPool {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE, DEFAULT_MAX_RETAINED)
    }

    /// # Panics
    ///
    /// Panics if `page_size` or `max_retained` is zero.
    pub fn with_page_size(page_size: usize, max_retained: usize) -> Self {
        assert!(page_size > 0, "page size must be greater than zero");
        Self { page_size, free: ArrayQueue::new(max_retained), outstanding: AtomicUsize::new(0) }
    }

    /// Number of blocks currently rented and not yet released.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Number of page blocks waiting on the free list.
    pub fn retained(&self) -> usize {
        self.free.len()
    }
}

impl Default for SlabPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SlabPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlabPool")
            .field("page_size", &self.page_size)
            .field("outstanding", &self.outstanding())
            .field("retained", &self.retained())
            .finish()
    }
}

impl MemoryPool for SlabPool {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn allocate(&self, min_size: usize) -> Box<[u8]> {
        self.outstanding.fetch_add(1, Ordering::AcqRel);

        if min_size > self.page_size {
            return vec![0; min_size].into_boxed_slice();
        }

        self.free.pop().unwrap_or_else(|| vec![0; self.page_size].into_boxed_slice())
    }

    fn release(&self, block: Box<[u8]>) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);

        if block.len() == self.page_size {
            // a full free list simply drops the block
            let _ = self.free.push(block);
        }
    }
}
