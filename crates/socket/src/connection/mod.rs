//! Connection lifecycle
//!
//! A [`Connection`] owns one accepted socket and the stream pair reading from
//! and writing to it. Its identity and lifecycle are shared with any number of
//! [`ConnectionHandle`]s:
//!
//! - the closed signal fires exactly once, when both streams have completed or
//!   when the connection is aborted
//! - a close request lets another task ask for a graceful shutdown
//!
//! Identifiers come from [`correlation_id`].

pub mod correlation_id;
mod socket_connection;
mod state;

pub use socket_connection::{Connection, ConnectionHandle};
pub(crate) use state::ConnectionState;
