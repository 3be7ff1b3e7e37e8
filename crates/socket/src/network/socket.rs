use crate::error::SocketError;
use std::fmt;
use std::io::IoSlice;
use std::net::SocketAddr;

/// A connected stream socket as seen by the transport.
///
/// At most one [`receive`](Self::receive) may be outstanding at a time; a
/// second concurrent call fails with [`SocketError::ConcurrentReceive`].
/// Every other method may be called from any task while a receive is pending.
pub trait NetworkSocket: Send + Sync + fmt::Debug + 'static {
    fn local_addr(&self) -> SocketAddr;

    fn peer_addr(&self) -> SocketAddr;

    /// Receives into `buf`, returning `0` once the peer has shut down its
    /// sending side.
    ///
    /// Resolves with [`SocketError::Canceled`] when
    /// [`cancel_pending_read`](Self::cancel_pending_read) is called while the
    /// receive is pending, and immediately for every receive after that.
    fn receive(&self, buf: &mut [u8]) -> impl Future<Output = Result<usize, SocketError>> + Send;

    /// Sends as much of `bufs` as the socket accepts, gathering the slices
    /// without copying them into one buffer.
    fn send(&self, bufs: &[IoSlice<'_>]) -> impl Future<Output = Result<usize, SocketError>> + Send;

    /// Best-effort abort of the outstanding receive. Sticky.
    fn cancel_pending_read(&self);

    /// Half-closes the sending direction; the peer reads end of stream.
    fn shutdown_send(&self) -> Result<(), SocketError>;

    /// Shuts down both directions. Safe to call more than once.
    fn close(&self);
}
