use crate::connection::ConnectionState;
use crate::memory::RollingBuffer;
use crate::network::{NetworkSocket, TcpSocket};
use crate::options::TransportOptions;
use crate::pipeline::{InboundStream, OutboundStream};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// An accepted socket adapted into an [`InboundStream`] and an
/// [`OutboundStream`].
///
/// The connection is closed once both streams have completed, or as soon as it
/// is aborted; [`closed`](Self::closed) resolves at that point. Dropping the
/// connection disposes it.
pub struct Connection<S: NetworkSocket = TcpSocket> {
    state: Arc<ConnectionState<S>>,
    input: InboundStream<S>,
    output: OutboundStream<S>,
}

impl<S: NetworkSocket> Connection<S> {
    pub fn new(socket: S, options: &TransportOptions) -> Self {
        let state = Arc::new(ConnectionState::new(socket));
        let pool = options.memory_pool();
        let high_volume_logging = options.high_volume_logging();

        let input = InboundStream::new(Arc::clone(&state), RollingBuffer::new(Arc::clone(pool)), high_volume_logging);
        let output = OutboundStream::new(Arc::clone(&state), RollingBuffer::new(Arc::clone(pool)), high_volume_logging);

        Self { state, input, output }
    }

    /// A unique identifier, generated on first use.
    pub fn id(&self) -> &str {
        self.state.id()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.state.local_addr()
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.state.remote_addr()
    }

    pub fn handle(&self) -> ConnectionHandle<S> {
        ConnectionHandle { state: Arc::clone(&self.state) }
    }

    pub fn input(&mut self) -> &mut InboundStream<S> {
        &mut self.input
    }

    pub fn output(&mut self) -> &mut OutboundStream<S> {
        &mut self.output
    }

    /// Borrows both streams at once, so reading and writing can be driven
    /// concurrently.
    pub fn split(&mut self) -> (&mut InboundStream<S>, &mut OutboundStream<S>) {
        (&mut self.input, &mut self.output)
    }

    /// See [`ConnectionHandle::abort`].
    pub fn abort(&self, reason: Option<&str>) {
        self.state.abort(reason);
    }

    pub fn cancel_pending_read(&self) {
        self.state.cancel_pending_read();
    }

    /// Resolves once the connection is closed.
    pub async fn closed(&self) {
        self.state.closed_token().cancelled().await;
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// See [`ConnectionHandle::request_close`].
    pub fn request_close(&self) {
        self.state.request_close();
    }

    /// Resolves once a graceful close was requested.
    pub async fn close_requested(&self) {
        self.state.close_requested_token().cancelled().await;
    }

    /// Releases both stream buffers and shuts the socket down. Safe to call
    /// more than once.
    pub fn dispose(&mut self) {
        if !self.state.begin_dispose() {
            return;
        }

        info!(connection_id = self.state.id(), "connection disposed");
        self.input.dispose();
        self.output.dispose();
        self.state.socket.close();
    }
}

impl<S: NetworkSocket> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.state.id())
            .field("local_addr", &self.state.local_addr())
            .field("remote_addr", &self.state.remote_addr())
            .field("closed", &self.state.is_closed())
            .finish_non_exhaustive()
    }
}

impl<S: NetworkSocket> Drop for Connection<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A cloneable handle to a [`Connection`]'s identity and lifecycle, for use
/// from other tasks.
pub struct ConnectionHandle<S: NetworkSocket = TcpSocket> {
    state: Arc<ConnectionState<S>>,
}

impl<S: NetworkSocket> Clone for ConnectionHandle<S> {
    fn clone(&self) -> Self {
        Self { state: Arc::clone(&self.state) }
    }
}

impl<S: NetworkSocket> fmt::Debug for ConnectionHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle").field("id", &self.state.id()).finish_non_exhaustive()
    }
}

impl<S: NetworkSocket> ConnectionHandle<S> {
    pub fn id(&self) -> &str {
        self.state.id()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.state.local_addr()
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.state.remote_addr()
    }

    /// Tears the connection down without waiting for in-flight sends: the
    /// sending side is shut down, the pending read canceled and the closed
    /// signal fired. Only the first call has any effect.
    pub fn abort(&self, reason: Option<&str>) {
        self.state.abort(reason);
    }

    pub fn cancel_pending_read(&self) {
        self.state.cancel_pending_read();
    }

    pub async fn closed(&self) {
        self.state.closed_token().cancelled().await;
    }

    /// A token cancelled when the connection closes.
    pub fn closed_token(&self) -> CancellationToken {
        self.state.closed_token().child_token()
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    pub fn is_aborted(&self) -> bool {
        self.state.is_aborted()
    }

    /// Asks whoever drives the connection to finish the current exchange and
    /// close. Nothing is torn down by this call.
    pub fn request_close(&self) {
        self.state.request_close();
    }

    pub async fn close_requested(&self) {
        self.state.close_requested_token().cancelled().await;
    }
}
