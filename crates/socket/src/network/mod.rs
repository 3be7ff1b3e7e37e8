//! The socket layer underneath the streams
//!
//! [`NetworkSocket`] is the connected-socket seam used by the streams and
//! [`NetworkProvider`] / [`NetworkListener`] the seam used by the
//! [`Listener`](crate::Listener). [`TcpSocket`] and [`TcpProvider`] are the
//! tokio-backed implementations.

mod listener;
mod socket;
mod tcp;

#[cfg(test)]
pub(crate) mod mock;

pub use listener::{ListenerSettings, NetworkListener, NetworkProvider, TcpNetworkListener, TcpProvider};
pub use socket::NetworkSocket;
pub use tcp::TcpSocket;
