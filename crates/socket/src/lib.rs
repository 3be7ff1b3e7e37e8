//! An inline socket transport with pooled rolling buffers
//!
//! This crate adapts accepted stream sockets into a pair of flow-controlled
//! byte channels for a request/response protocol layer. Socket completions
//! are handled on the task that awaits them: every receive and send is first
//! tried directly and the task only parks when the kernel would block.
//!
//! # Example
//!
//! ```no_run
//! use bytes::BufMut;
//! use micro_socket::{Listener, TransportOptions};
//! use std::sync::Arc;
//! use tracing::{error, info};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut listener = Listener::new(Arc::new(TransportOptions::default()));
//!     if let Err(e) = listener.bind("127.0.0.1:8080".parse().unwrap()) {
//!         error!(cause = %e, "bind server error");
//!         return;
//!     }
//!
//!     while let Ok(Some(mut connection)) = listener.accept().await {
//!         tokio::spawn(async move {
//!             let (input, output) = connection.split();
//!             loop {
//!                 let result = input.read().await;
//!                 let end = result.buffer().end();
//!                 if result.is_completed() {
//!                     break;
//!                 }
//!                 input.advance(end);
//!                 output.put_slice(b"ok\n");
//!                 output.flush().await;
//!             }
//!             info!(connection_id = connection.id(), "finished process, connection shutdown");
//!         });
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`memory`]: the [`MemoryPool`](memory::MemoryPool) and the segmented
//!   [`RollingBuffer`](memory::RollingBuffer) both streams are built on
//! - [`network`]: the socket and listener seams with their tokio TCP
//!   implementations
//! - [`pipeline`]: [`InboundStream`] and [`OutboundStream`]
//! - [`connection`]: [`Connection`], its shared lifecycle and identifiers
//!
//! [`Listener`] ties them together: it binds a listening socket and produces
//! one [`Connection`] per accepted socket, configured by
//! [`TransportOptions`].
//!
//! # Reading
//!
//! [`InboundStream::read`] returns every byte not consumed yet. The caller
//! reports back two positions: how far the bytes were *consumed*, which frees
//! them, and how far they were *examined*. The next read only waits for the
//! socket once everything has been examined, so a parser can leave an
//! incomplete message in the buffer and get it back, extended, later.
//!
//! # Writing
//!
//! [`OutboundStream`] buffers writes until [`flush`](OutboundStream::flush).
//! Between [`suspend`](OutboundStream::suspend) and the matching
//! [`resume`](OutboundStream::resume) flushes are deferred, so separately
//! written parts of a response leave in one vectored send.
//!
//! # Errors
//!
//! Stream failures become terminal stream state rather than errors: a failed
//! read or send completes its stream and closes the connection. The error
//! types are:
//!
//! - [`SocketError`]: raised by [`NetworkSocket`] implementations
//! - [`OutputError`]: unbalanced [`resume`](OutboundStream::resume)
//! - [`ListenError`]: binding and accepting
//! - [`TransportError`]: any of the above

pub mod connection;
pub mod memory;
pub mod network;
pub mod pipeline;

mod error;
mod listener;
mod options;
mod utils;

pub(crate) use utils::ensure;

pub use connection::{Connection, ConnectionHandle, correlation_id};
pub use error::{ListenError, OutputError, SocketError, TransportError};
pub use listener::Listener;
pub use network::{NetworkSocket, TcpProvider, TcpSocket};
pub use options::{TransportOptions, TransportOptionsBuilder};
pub use pipeline::{FlushResult, InboundStream, OutboundStream, ReadResult};
