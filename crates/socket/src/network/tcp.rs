use crate::error::SocketError;
use crate::network::NetworkSocket;
use socket2::SockRef;
use std::io::{self, IoSlice};
use std::net::{Shutdown, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// A [`NetworkSocket`] over a tokio [`TcpStream`].
///
/// Both directions first try the operation directly on the calling task and
/// only park on socket readiness when the kernel reports it would block, so a
/// completion is handled inline by whoever polls the stream.
#[derive(Debug)]
pub struct TcpSocket {
    stream: TcpStream,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
    receiving: AtomicBool,
    read_canceled: CancellationToken,
    closed: AtomicBool,
}

impl TcpSocket {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        let peer_addr = stream.peer_addr()?;
        Self::with_peer_addr(stream, peer_addr)
    }

    /// Wraps a stream whose peer address is already known, as returned by
    /// `accept`, so a peer that reset in the meantime is not queried again.
    pub fn with_peer_addr(stream: TcpStream, peer_addr: SocketAddr) -> io::Result<Self> {
        let local_addr = stream.local_addr()?;
        Ok(Self {
            stream,
            local_addr,
            peer_addr,
            receiving: AtomicBool::new(false),
            read_canceled: CancellationToken::new(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn set_no_delay(&self, no_delay: bool) -> io::Result<()> {
        self.stream.set_nodelay(no_delay)
    }
}

impl NetworkSocket for TcpSocket {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    async fn receive(&self, buf: &mut [u8]) -> Result<usize, SocketError> {
        if self.read_canceled.is_cancelled() {
            return Err(SocketError::Canceled);
        }

        let _receiving = ReceiveGuard::acquire(&self.receiving).ok_or(SocketError::ConcurrentReceive)?;

        loop {
            match self.stream.try_read(buf) {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e.into()),
            }

            tokio::select! {
                biased;
                () = self.read_canceled.cancelled() => return Err(SocketError::Canceled),
                ready = self.stream.readable() => ready?,
            }
        }
    }

    async fn send(&self, bufs: &[IoSlice<'_>]) -> Result<usize, SocketError> {
        loop {
            match self.stream.try_write_vectored(bufs) {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => self.stream.writable().await?,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn cancel_pending_read(&self) {
        self.read_canceled.cancel();
    }

    fn shutdown_send(&self) -> Result<(), SocketError> {
        match SockRef::from(&self.stream).shutdown(Shutdown::Write) {
            Ok(()) => Ok(()),
            // the peer is already gone
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.read_canceled.cancel();
        if let Err(e) = SockRef::from(&self.stream).shutdown(Shutdown::Both) {
            trace!(peer = %self.peer_addr, cause = %e, "shutdown on close failed");
        }
    }
}

struct ReceiveGuard<'a>(&'a AtomicBool);

impl<'a> ReceiveGuard<'a> {
    fn acquire(receiving: &'a AtomicBool) -> Option<Self> {
        (!receiving.swap(true, Ordering::AcqRel)).then_some(Self(receiving))
    }
}

impl Drop for ReceiveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn connected_pair() -> (TcpSocket, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (TcpSocket::new(server).unwrap(), client)
    }

    #[tokio::test]
    async fn receive_and_vectored_send() {
        let (socket, mut client) = connected_pair().await;

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 16];
        let bytes = socket.receive(&mut buf).await.unwrap();
        assert_eq!(&buf[..bytes], b"ping");

        let sent = socket.send(&[IoSlice::new(b"po"), IoSlice::new(b"ng")]).await.unwrap();
        assert_eq!(sent, 4);

        let mut reply = [0u8; 4];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply, b"pong");
    }

    #[tokio::test]
    async fn cancel_resolves_pending_receive() {
        let (socket, _client) = connected_pair().await;
        let mut buf = [0u8; 16];

        let mut receive = Box::pin(socket.receive(&mut buf));
        assert!((&mut receive).now_or_never().is_none());

        socket.cancel_pending_read();
        assert!(matches!(receive.await, Err(SocketError::Canceled)));

        let mut buf = [0u8; 16];
        assert!(matches!(socket.receive(&mut buf).await, Err(SocketError::Canceled)));
    }

    #[tokio::test]
    async fn second_receive_is_rejected() {
        let (socket, _client) = connected_pair().await;
        let mut first = [0u8; 16];
        let mut second = [0u8; 16];

        let mut pending = Box::pin(socket.receive(&mut first));
        assert!((&mut pending).now_or_never().is_none());

        assert!(matches!(socket.receive(&mut second).await, Err(SocketError::ConcurrentReceive)));
    }

    #[tokio::test]
    async fn shutdown_send_ends_the_peer_stream() {
        let (socket, mut client) = connected_pair().await;

        socket.shutdown_send().unwrap();

        let mut buf = Vec::new();
        assert_eq!(client.read_to_end(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn peer_shutdown_reads_zero() {
        let (socket, mut client) = connected_pair().await;
        client.shutdown().await.unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(socket.receive(&mut buf).await.unwrap(), 0);
    }
}
