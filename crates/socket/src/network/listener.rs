use crate::network::{NetworkSocket, TcpSocket};
use arc_swap::ArcSwapOption;
use socket2::{Domain, Protocol, Socket, Type};
use std::fmt;
use std::io;
use std::net::{Ipv6Addr, SocketAddr};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const DEFAULT_LISTEN_BACKLOG: i32 = 512;

/// Options applied to a listening socket when it is created.
#[derive(Debug, Clone)]
pub struct ListenerSettings {
    pub endpoint: SocketAddr,
    pub allow_nat_traversal: Option<bool>,
    pub exclusive_address_use: Option<bool>,
    pub listen_backlog: Option<u32>,
    pub no_delay: Option<bool>,
}

impl ListenerSettings {
    pub fn new(endpoint: SocketAddr) -> Self {
        Self { endpoint, allow_nat_traversal: None, exclusive_address_use: None, listen_backlog: None, no_delay: None }
    }
}

/// A bound, listening socket.
pub trait NetworkListener: Send + Sync + fmt::Debug + 'static {
    type Socket: NetworkSocket;

    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Accepts the next connected socket.
    ///
    /// Once [`stop`](Self::stop) has been called, pending and future calls
    /// fail with [`io::ErrorKind::NotConnected`]. A connection that fails
    /// after it was accepted is reported as
    /// [`io::ErrorKind::ConnectionAborted`].
    fn accept_socket(&self) -> impl Future<Output = io::Result<Self::Socket>> + Send;

    /// Closes the listening socket. Safe to call more than once.
    fn stop(&self);
}

/// Creates listening sockets; the seam used to substitute the network in
/// tests.
pub trait NetworkProvider: Send + Sync + fmt::Debug + 'static {
    type Listener: NetworkListener;

    /// Creates, binds and starts listening on `settings.endpoint`.
    fn create_listener(&self, settings: &ListenerSettings) -> io::Result<Self::Listener>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TcpProvider;

impl NetworkProvider for TcpProvider {
    type Listener = TcpNetworkListener;

    fn create_listener(&self, settings: &ListenerSettings) -> io::Result<Self::Listener> {
        TcpNetworkListener::bind(settings)
    }
}

#[derive(Debug)]
pub struct TcpNetworkListener {
    listener: ArcSwapOption<TcpListener>,
    stopped: CancellationToken,
    no_delay: Option<bool>,
}

impl TcpNetworkListener {
    pub fn bind(settings: &ListenerSettings) -> io::Result<Self> {
        let endpoint = settings.endpoint;
        let socket = Socket::new(Domain::for_address(endpoint), Type::STREAM, Some(Protocol::TCP))?;

        if endpoint.ip() == Ipv6Addr::UNSPECIFIED {
            socket.set_only_v6(false)?;
        }

        // exclusive use maps to refusing address reuse on platforms without
        // an exclusive-address option
        if let Some(exclusive) = settings.exclusive_address_use {
            socket.set_reuse_address(!exclusive)?;
        }

        if let Some(allow) = settings.allow_nat_traversal {
            debug!(allow, "nat traversal protection level is not supported on this platform, ignoring");
        }

        let backlog = settings.listen_backlog.map_or(DEFAULT_LISTEN_BACKLOG, |backlog| i32::try_from(backlog).unwrap_or(i32::MAX));

        // a failed bind or listen drops the socket, which unwinds both
        socket.bind(&endpoint.into())?;
        socket.listen(backlog)?;
        socket.set_nonblocking(true)?;

        let listener = TcpListener::from_std(socket.into())?;
        Ok(Self {
            listener: ArcSwapOption::from_pointee(listener),
            stopped: CancellationToken::new(),
            no_delay: settings.no_delay,
        })
    }
}

impl NetworkListener for TcpNetworkListener {
    type Socket = TcpSocket;

    fn local_addr(&self) -> io::Result<SocketAddr> {
        match self.listener.load_full() {
            Some(listener) => listener.local_addr(),
            None => Err(stopped_error()),
        }
    }

    async fn accept_socket(&self) -> io::Result<Self::Socket> {
        let Some(listener) = self.listener.load_full() else {
            return Err(stopped_error());
        };

        let (stream, remote) = tokio::select! {
            biased;
            () = self.stopped.cancelled() => return Err(stopped_error()),
            accepted = listener.accept() => accepted?,
        };

        // a setup failure only concerns this one connection
        let socket = TcpSocket::with_peer_addr(stream, remote).map_err(aborted)?;
        if let Some(no_delay) = self.no_delay {
            socket.set_no_delay(no_delay).map_err(aborted)?;
        }
        Ok(socket)
    }

    fn stop(&self) {
        self.stopped.cancel();
        // the last reference closes the socket once a pending accept unwinds
        self.listener.store(None);
    }
}

fn stopped_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "listener is stopped")
}

fn aborted(e: io::Error) -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn accepts_with_socket_options() {
        let mut settings = ListenerSettings::new("127.0.0.1:0".parse().unwrap());
        settings.no_delay = Some(true);
        settings.listen_backlog = Some(16);

        let listener = TcpProvider.create_listener(&settings).unwrap();
        let addr = listener.local_addr().unwrap();

        let client = TcpStream::connect(addr).await.unwrap();
        let socket = listener.accept_socket().await.unwrap();

        assert_eq!(socket.peer_addr(), client.local_addr().unwrap());
        assert_eq!(socket.local_addr(), addr);
    }

    #[tokio::test]
    async fn stop_resolves_pending_accept() {
        let settings = ListenerSettings::new("127.0.0.1:0".parse().unwrap());
        let listener = Arc::new(TcpProvider.create_listener(&settings).unwrap());

        let accepting = tokio::spawn({
            let listener = Arc::clone(&listener);
            async move { listener.accept_socket().await }
        });

        tokio::task::yield_now().await;
        listener.stop();

        let error = accepting.await.unwrap().unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::NotConnected);
        assert_eq!(listener.local_addr().unwrap_err().kind(), io::ErrorKind::NotConnected);
    }
}
