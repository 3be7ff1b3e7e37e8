use crate::connection::Connection;
use crate::ensure;
use crate::error::ListenError;
use crate::network::{ListenerSettings, NetworkListener, NetworkProvider, NetworkSocket, TcpProvider};
use crate::options::TransportOptions;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

type SocketOf<P> = <<P as NetworkProvider>::Listener as NetworkListener>::Socket;

/// Binds a listening socket and turns accepted sockets into [`Connection`]s.
///
/// # Example
///
/// ```no_run
/// use micro_socket::{Listener, TransportOptions};
/// use std::sync::Arc;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let mut listener = Listener::new(Arc::new(TransportOptions::default()));
/// listener.bind("127.0.0.1:8080".parse()?)?;
///
/// while let Some(mut connection) = listener.accept().await? {
///     tokio::spawn(async move {
///         let _ = connection.input().read().await;
///     });
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Listener<P: NetworkProvider = TcpProvider> {
    options: Arc<TransportOptions>,
    provider: P,
    listener: Option<P::Listener>,
    stopped: CancellationToken,
}

impl Listener<TcpProvider> {
    pub fn new(options: Arc<TransportOptions>) -> Self {
        Self::with_provider(options, TcpProvider)
    }
}

impl<P: NetworkProvider> Listener<P> {
    pub fn with_provider(options: Arc<TransportOptions>, provider: P) -> Self {
        Self { options, provider, listener: None, stopped: CancellationToken::new() }
    }

    /// Creates the listening socket on `endpoint` and starts listening.
    ///
    /// A listener that was unbound may be bound again.
    ///
    /// # Errors
    ///
    /// [`ListenError::AlreadyBound`] while bound, [`ListenError::Bind`] when
    /// the socket cannot be created, bound or put into listening mode.
    pub fn bind(&mut self, endpoint: SocketAddr) -> Result<(), ListenError> {
        let bound = self.listener.as_ref().filter(|_| !self.stopped.is_cancelled());
        ensure!(
            bound.is_none(),
            ListenError::AlreadyBound { endpoint: bound.and_then(|l| l.local_addr().ok()).unwrap_or(endpoint) }
        );

        let settings = ListenerSettings {
            endpoint,
            allow_nat_traversal: self.options.allow_nat_traversal(),
            exclusive_address_use: self.options.exclusive_address_use(),
            listen_backlog: self.options.listen_backlog(),
            no_delay: self.options.no_delay(),
        };

        let listener = self.provider.create_listener(&settings).map_err(|e| {
            error!(%endpoint, cause = %e, "listener bind failed");
            ListenError::bind(endpoint, e)
        })?;

        info!(endpoint = %listener.local_addr().unwrap_or(endpoint), "listener bound");
        self.listener = Some(listener);
        self.stopped = CancellationToken::new();
        Ok(())
    }

    /// The bound local address, with any ephemeral port resolved.
    pub fn endpoint(&self) -> Option<SocketAddr> {
        self.listener.as_ref().filter(|_| !self.stopped.is_cancelled())?.local_addr().ok()
    }

    /// Waits for the next connection.
    ///
    /// Returns `Ok(None)` once the listener has been unbound or disposed,
    /// including when that happens while waiting. Connections reset by the
    /// peer while still queued are skipped.
    ///
    /// # Errors
    ///
    /// [`ListenError::NotBound`] if [`bind`](Self::bind) was never called,
    /// [`ListenError::Accept`] for any other accept failure.
    pub async fn accept(&self) -> Result<Option<Connection<SocketOf<P>>>, ListenError> {
        let Some(listener) = &self.listener else {
            return Err(ListenError::NotBound);
        };

        loop {
            let accepted = tokio::select! {
                biased;
                () = self.stopped.cancelled() => return Ok(None),
                accepted = listener.accept_socket() => accepted,
            };

            match accepted {
                Ok(socket) => {
                    info!(remote = %socket.peer_addr(), local = %socket.local_addr(), "socket accepted");
                    return Ok(Some(Connection::new(socket, &self.options)));
                }
                Err(_) if self.stopped.is_cancelled() => return Ok(None),
                Err(e) if is_peer_gone(&e) => {
                    debug!(cause = %e, "connection reset while queued, accepting the next one");
                }
                Err(e) => {
                    error!(cause = %e, "accept failed");
                    return Err(ListenError::accept(e));
                }
            }
        }
    }

    /// Stops listening; a pending [`accept`](Self::accept) resolves `None`.
    pub fn unbind(&self) {
        if self.stopped.is_cancelled() {
            return;
        }
        if let Some(listener) = &self.listener {
            info!(endpoint = ?listener.local_addr().ok(), "listener unbinding");
            self.stopped.cancel();
            listener.stop();
        }
    }

    pub fn dispose(&self) {
        self.unbind();
        self.stopped.cancel();
    }
}

// the peer reset or went away between the handshake and the accept
fn is_peer_gone(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::NotConnected)
}

impl<P: NetworkProvider> Drop for Listener<P> {
    fn drop(&mut self) {
        self.dispose();
    }
}
