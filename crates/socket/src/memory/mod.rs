//! Pooled memory for the socket streams
//!
//! - [`MemoryPool`]: the pluggable source of fixed-size blocks, with
//!   [`SlabPool`] as the default implementation
//! - [`RollingBuffer`]: a segmented byte queue that rents blocks as it grows
//!   at the tail and returns them as it is consumed at the head
//! - [`Occupied`]: a zero-copy, possibly multi-segment view of the written
//!   bytes of a [`RollingBuffer`]

mod occupied;
mod pool;
mod rolling_buffer;

pub use occupied::Occupied;
pub use pool::{DEFAULT_PAGE_SIZE, MemoryPool, PooledBlock, SlabPool};
pub use rolling_buffer::RollingBuffer;
