//! Transport configuration
//!
//! [`TransportOptions`] carries everything a [`Listener`](crate::Listener) and
//! the [`Connection`](crate::Connection)s it produces need: the memory pool
//! backing every stream buffer, the listening socket options and the logging
//! volume.
//!
//! # Example
//!
//! ```
//! use micro_socket::TransportOptions;
//!
//! let options = TransportOptions::builder()
//!     .listen_backlog(1024)
//!     .no_delay(true)
//!     .build();
//!
//! assert_eq!(options.listen_backlog(), Some(1024));
//! ```

use crate::memory::{MemoryPool, SlabPool};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TransportOptions {
    memory_pool: Arc<dyn MemoryPool>,
    listen_backlog: Option<u32>,
    allow_nat_traversal: Option<bool>,
    exclusive_address_use: Option<bool>,
    no_delay: Option<bool>,
    high_volume_logging: bool,
}

impl TransportOptions {
    pub fn builder() -> TransportOptionsBuilder {
        TransportOptionsBuilder::new()
    }

    pub fn memory_pool(&self) -> &Arc<dyn MemoryPool> {
        &self.memory_pool
    }

    pub fn listen_backlog(&self) -> Option<u32> {
        self.listen_backlog
    }

    pub fn allow_nat_traversal(&self) -> Option<bool> {
        self.allow_nat_traversal
    }

    pub fn exclusive_address_use(&self) -> Option<bool> {
        self.exclusive_address_use
    }

    pub fn no_delay(&self) -> Option<bool> {
        self.no_delay
    }

    /// Whether every read and write is logged, not only failures and
    /// lifecycle changes.
    pub fn high_volume_logging(&self) -> bool {
        self.high_volume_logging
    }
}

impl Default for TransportOptions {
    fn default() -> Self {
        TransportOptionsBuilder::new().build()
    }
}

#[derive(Debug)]
pub struct TransportOptionsBuilder {
    memory_pool: Option<Arc<dyn MemoryPool>>,
    listen_backlog: Option<u32>,
    allow_nat_traversal: Option<bool>,
    exclusive_address_use: Option<bool>,
    no_delay: Option<bool>,
    high_volume_logging: bool,
}

impl TransportOptionsBuilder {
    fn new() -> Self {
        Self {
            memory_pool: None,
            listen_backlog: None,
            allow_nat_traversal: None,
            exclusive_address_use: None,
            no_delay: None,
            high_volume_logging: false,
        }
    }

    pub fn memory_pool(mut self, memory_pool: Arc<dyn MemoryPool>) -> Self {
        self.memory_pool = Some(memory_pool);
        self
    }

    pub fn listen_backlog(mut self, backlog: u32) -> Self {
        self.listen_backlog = Some(backlog);
        self
    }

    /// Only honored on platforms with an IP protection level socket option.
    pub fn allow_nat_traversal(mut self, allow: bool) -> Self {
        self.allow_nat_traversal = Some(allow);
        self
    }

    pub fn exclusive_address_use(mut self, exclusive: bool) -> Self {
        self.exclusive_address_use = Some(exclusive);
        self
    }

    pub fn no_delay(mut self, no_delay: bool) -> Self {
        self.no_delay = Some(no_delay);
        self
    }

    pub fn high_volume_logging(mut self, enabled: bool) -> Self {
        self.high_volume_logging = enabled;
        self
    }

    pub fn build(self) -> TransportOptions {
        TransportOptions {
            memory_pool: self.memory_pool.unwrap_or_else(|| Arc::new(SlabPool::new())),
            listen_backlog: self.listen_backlog,
            allow_nat_traversal: self.allow_nat_traversal,
            exclusive_address_use: self.exclusive_address_use,
            no_delay: self.no_delay,
            high_volume_logging: self.high_volume_logging,
        }
    }
}
