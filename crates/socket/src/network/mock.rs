//! Scripted sockets and listeners for unit tests.

use crate::error::SocketError;
use crate::network::{ListenerSettings, NetworkListener, NetworkProvider, NetworkSocket};
use std::io::{self, IoSlice};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub(crate) enum MockEvent {
    Data(Vec<u8>),
    Eof,
    Error(io::ErrorKind),
}

#[derive(Debug, Default)]
pub(crate) struct MockState {
    sent: Mutex<Vec<u8>>,
    send_error: Mutex<Option<io::ErrorKind>>,
    send_limit: Mutex<Option<usize>>,
    send_calls: AtomicUsize,
    send_blocked: AtomicBool,
    shutdown: AtomicBool,
    closed: AtomicBool,
}

#[derive(Debug)]
struct Inbox {
    receiver: UnboundedReceiver<MockEvent>,
    leftover: Vec<u8>,
    finished: bool,
}

/// A socket whose inbound bytes are scripted through a [`MockPeer`] and whose
/// outbound bytes are recorded.
#[derive(Debug)]
pub(crate) struct MockSocket {
    inbox: tokio::sync::Mutex<Inbox>,
    read_canceled: CancellationToken,
    state: Arc<MockState>,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
}

/// The test's end of a [`MockSocket`].
#[derive(Debug, Clone)]
pub(crate) struct MockPeer {
    sender: UnboundedSender<MockEvent>,
    state: Arc<MockState>,
}

pub(crate) fn pair() -> (MockSocket, MockPeer) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let state = Arc::new(MockState::default());
    let socket = MockSocket {
        inbox: tokio::sync::Mutex::new(Inbox { receiver, leftover: Vec::new(), finished: false }),
        read_canceled: CancellationToken::new(),
        state: Arc::clone(&state),
        local_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        peer_addr: SocketAddr::from(([127, 0, 0, 1], 50000)),
    };
    (socket, MockPeer { sender, state })
}

impl MockPeer {
    pub(crate) fn write(&self, data: &[u8]) {
        let _ = self.sender.send(MockEvent::Data(data.to_vec()));
    }

    pub(crate) fn shutdown(&self) {
        let _ = self.sender.send(MockEvent::Eof);
    }

    pub(crate) fn fail_receive(&self, kind: io::ErrorKind) {
        let _ = self.sender.send(MockEvent::Error(kind));
    }

    pub(crate) fn fail_sends(&self, kind: io::ErrorKind) {
        *self.state.send_error.lock().unwrap() = Some(kind);
    }

    /// Caps the bytes accepted by each send, forcing partial writes.
    pub(crate) fn limit_sends(&self, limit: usize) {
        *self.state.send_limit.lock().unwrap() = Some(limit);
    }

    /// Parks every later send as if the socket's send buffer stayed full.
    pub(crate) fn block_sends(&self) {
        self.state.send_blocked.store(true, Ordering::SeqCst);
    }

    pub(crate) fn received(&self) -> Vec<u8> {
        self.state.sent.lock().unwrap().clone()
    }

    pub(crate) fn send_calls(&self) -> usize {
        self.state.send_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.state.shutdown.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}

impl NetworkSocket for MockSocket {
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

        let Ok(mut inbox) = self.inbox.try_lock() else {
            return Err(SocketError::ConcurrentReceive);
        };

        if !inbox.leftover.is_empty() {
            let bytes = inbox.leftover.len().min(buf.len());
            buf[..bytes].copy_from_slice(&inbox.leftover[..bytes]);
            inbox.leftover.drain(..bytes);
            return Ok(bytes);
        }

        if inbox.finished {
            return Ok(0);
        }

        let event = tokio::select! {
            biased;
            () = self.read_canceled.cancelled() => return Err(SocketError::Canceled),
            event = inbox.receiver.recv() => event,
        };

        match event {
            Some(MockEvent::Data(data)) => {
                let bytes = data.len().min(buf.len());
                buf[..bytes].copy_from_slice(&data[..bytes]);
                inbox.leftover.extend_from_slice(&data[bytes..]);
                Ok(bytes)
            }
            Some(MockEvent::Eof) | None => {
                inbox.finished = true;
                Ok(0)
            }
            Some(MockEvent::Error(kind)) => Err(io::Error::from(kind).into()),
        }
    }

    async fn send(&self, bufs: &[IoSlice<'_>]) -> Result<usize, SocketError> {
        self.state.send_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.send_blocked.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if let Some(kind) = *self.state.send_error.lock().unwrap() {
            return Err(io::Error::from(kind).into());
        }

        let mut budget = self.state.send_limit.lock().unwrap().unwrap_or(usize::MAX);
        let mut sent = self.state.sent.lock().unwrap();
        let mut total = 0;
        for buf in bufs {
            let bytes = buf.len().min(budget);
            sent.extend_from_slice(&buf[..bytes]);
            total += bytes;
            budget -= bytes;
            if budget == 0 {
                break;
            }
        }
        Ok(total)
    }

    fn cancel_pending_read(&self) {
        self.read_canceled.cancel();
    }

    fn shutdown_send(&self) -> Result<(), SocketError> {
        self.state.shutdown.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
        self.read_canceled.cancel();
    }
}

type AcceptResult = io::Result<MockSocket>;

/// Hands out the sockets queued through its [`MockAcceptQueue`].
#[derive(Debug)]
pub(crate) struct MockProvider {
    receiver: Mutex<Option<UnboundedReceiver<AcceptResult>>>,
    settings: Arc<Mutex<Option<ListenerSettings>>>,
}

#[derive(Debug, Clone)]
pub(crate) struct MockAcceptQueue {
    sender: UnboundedSender<AcceptResult>,
    settings: Arc<Mutex<Option<ListenerSettings>>>,
}

impl MockAcceptQueue {
    pub(crate) fn push(&self, result: AcceptResult) {
        let _ = self.sender.send(result);
    }

    /// The settings the listener was created with, once bound.
    pub(crate) fn settings(&self) -> Option<ListenerSettings> {
        self.settings.lock().unwrap().clone()
    }
}

pub(crate) fn provider() -> (MockProvider, MockAcceptQueue) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let settings = Arc::new(Mutex::new(None));
    let provider = MockProvider { receiver: Mutex::new(Some(receiver)), settings: Arc::clone(&settings) };
    (provider, MockAcceptQueue { sender, settings })
}

impl NetworkProvider for MockProvider {
    type Listener = MockListener;

    fn create_listener(&self, settings: &ListenerSettings) -> io::Result<Self::Listener> {
        if settings.endpoint.port() == 1 {
            return Err(io::Error::from(io::ErrorKind::AddrInUse));
        }

        let receiver = self.receiver.lock().unwrap().take().ok_or_else(|| io::Error::from(io::ErrorKind::AddrInUse))?;
        *self.settings.lock().unwrap() = Some(settings.clone());
        Ok(MockListener {
            endpoint: settings.endpoint,
            receiver: tokio::sync::Mutex::new(receiver),
            stopped: CancellationToken::new(),
        })
    }
}

#[derive(Debug)]
pub(crate) struct MockListener {
    endpoint: SocketAddr,
    receiver: tokio::sync::Mutex<UnboundedReceiver<AcceptResult>>,
    stopped: CancellationToken,
}

impl NetworkListener for MockListener {
    type Socket = MockSocket;

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.endpoint)
    }

    async fn accept_socket(&self) -> io::Result<Self::Socket> {
        let stopped = || io::Error::from(io::ErrorKind::NotConnected);
        let mut receiver = tokio::select! {
            biased;
            () = self.stopped.cancelled() => return Err(stopped()),
            receiver = self.receiver.lock() => receiver,
        };

        tokio::select! {
            biased;
            () = self.stopped.cancelled() => Err(stopped()),
            accepted = receiver.recv() => accepted.unwrap_or_else(|| Err(stopped())),
        }
    }

    fn stop(&self) {
        self.stopped.cancel();
    }
}
