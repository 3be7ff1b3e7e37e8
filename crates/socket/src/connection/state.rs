use crate::connection::correlation_id;
use crate::network::NetworkSocket;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// State shared by a connection, its two streams and every handle to it.
///
/// Tracks completion of each direction and fires the closed signal exactly
/// once, when both directions are complete or on abort.
#[derive(Debug)]
pub(crate) struct ConnectionState<S> {
    pub(crate) socket: S,
    id: OnceCell<String>,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
    reader_complete: AtomicBool,
    writer_complete: AtomicBool,
    closed_fired: AtomicBool,
    aborted: AtomicBool,
    disposed: AtomicBool,
    write_canceled: CancellationToken,
    closed: CancellationToken,
    close_requested: CancellationToken,
}

impl<S: NetworkSocket> ConnectionState<S> {
    pub(crate) fn new(socket: S) -> Self {
        let local_addr = socket.local_addr();
        let remote_addr = socket.peer_addr();
        Self {
            socket,
            id: OnceCell::new(),
            local_addr,
            remote_addr,
            reader_complete: AtomicBool::new(false),
            writer_complete: AtomicBool::new(false),
            closed_fired: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            write_canceled: CancellationToken::new(),
            closed: CancellationToken::new(),
            close_requested: CancellationToken::new(),
        }
    }

    pub(crate) fn id(&self) -> &str {
        self.id.get_or_init(correlation_id::next_id)
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub(crate) fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub(crate) fn closed_token(&self) -> &CancellationToken {
        &self.closed
    }

    pub(crate) fn close_requested_token(&self) -> &CancellationToken {
        &self.close_requested
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed_fired.load(Ordering::SeqCst)
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Cancelled once pending output is dropped; a send parked on a full
    /// socket buffer races against it.
    pub(crate) fn write_canceled_token(&self) -> &CancellationToken {
        &self.write_canceled
    }

    pub(crate) fn is_write_canceled(&self) -> bool {
        self.write_canceled.is_cancelled()
    }

    pub(crate) fn on_reader_complete(&self) {
        if self.reader_complete.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(connection_id = self.id(), "reader complete");

        if !self.writer_complete.load(Ordering::SeqCst) {
            // nothing else will be read, so pending output is dropped
            self.cancel_pending_write();
            self.writer_complete.store(true, Ordering::SeqCst);
        }
        self.fire_closed();
    }

    pub(crate) fn on_writer_complete(&self) {
        if self.writer_complete.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(connection_id = self.id(), "writer complete");

        if self.reader_complete.load(Ordering::SeqCst) {
            self.fire_closed();
        } else {
            // the reader resolves canceled and completes the join
            self.cancel_pending_read();
        }
    }

    pub(crate) fn on_read_failed(&self) {
        self.reader_complete.store(true, Ordering::SeqCst);
        self.fire_closed();
    }

    pub(crate) fn on_write_failed(&self) {
        self.writer_complete.store(true, Ordering::SeqCst);
        self.fire_closed();
    }

    pub(crate) fn cancel_pending_read(&self) {
        debug!(connection_id = self.id(), "pending read canceling");
        self.socket.cancel_pending_read();
    }

    pub(crate) fn cancel_pending_write(&self) {
        if !self.write_canceled.is_cancelled() {
            debug!(connection_id = self.id(), "pending write canceling");
            self.write_canceled.cancel();
        }
    }

    pub(crate) fn abort(&self, reason: Option<&str>) {
        if self.aborted.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(connection_id = self.id(), reason = reason.unwrap_or("unspecified"), "connection aborting");

        if let Err(e) = self.socket.shutdown_send() {
            debug!(connection_id = self.id(), cause = %e, "shutdown on abort failed");
        }
        self.socket.cancel_pending_read();
        self.fire_closed();
    }

    pub(crate) fn request_close(&self) {
        if !self.close_requested.is_cancelled() {
            debug!(connection_id = self.id(), "connection closing");
            self.close_requested.cancel();
        }
    }

    /// Returns `true` for the first caller only.
    pub(crate) fn begin_dispose(&self) -> bool {
        !self.disposed.swap(true, Ordering::SeqCst)
    }

    fn fire_closed(&self) {
        if self.closed_fired.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(connection_id = self.id(), remote = %self.remote_addr, "connection closed");
        self.closed.cancel();
    }
}
