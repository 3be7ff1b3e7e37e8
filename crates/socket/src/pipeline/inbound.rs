use crate::connection::ConnectionState;
use crate::error::SocketError;
use crate::memory::{Occupied, RollingBuffer};
use crate::network::NetworkSocket;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, info};

/// The reading half of a connection.
///
/// Bytes received from the socket accumulate in a [`RollingBuffer`] until the
/// consumer releases them with [`advance`](Self::advance). The consumer also
/// reports how far it has looked at the data: a new receive is only issued
/// once everything written has been examined, so a parser that needs more
/// bytes than it has does not spin on the same input.
#[derive(Debug)]
pub struct InboundStream<S: NetworkSocket> {
    state: Arc<ConnectionState<S>>,
    buffer: RollingBuffer,
    has_unexamined: bool,
    completed: bool,
    canceled: bool,
    high_volume_logging: bool,
}

/// The outcome of [`InboundStream::read`].
#[derive(Debug)]
pub struct ReadResult<'a> {
    buffer: Occupied<'a>,
    is_canceled: bool,
    is_completed: bool,
}

impl<'a> ReadResult<'a> {
    /// Every byte not yet consumed, including bytes returned by earlier reads.
    pub fn buffer(&self) -> &Occupied<'a> {
        &self.buffer
    }

    pub fn into_buffer(self) -> Occupied<'a> {
        self.buffer
    }

    pub fn is_canceled(&self) -> bool {
        self.is_canceled
    }

    /// No more bytes will arrive; the buffer may still hold unconsumed ones.
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }
}

impl<S: NetworkSocket> InboundStream<S> {
    pub(crate) fn new(state: Arc<ConnectionState<S>>, buffer: RollingBuffer, high_volume_logging: bool) -> Self {
        Self { state, buffer, has_unexamined: false, completed: false, canceled: false, high_volume_logging }
    }

    /// Returns the buffered bytes, receiving more first when everything
    /// buffered has already been examined.
    pub async fn read(&mut self) -> ReadResult<'_> {
        if !self.has_unexamined && !self.is_completed() {
            self.receive().await;
        }

        ReadResult { buffer: self.buffer.occupied(), is_canceled: self.canceled, is_completed: self.is_completed() }
    }

    async fn receive(&mut self) {
        if self.high_volume_logging {
            debug!(connection_id = self.state.id(), "read starting");
        }

        let result = self.state.socket.receive(self.buffer.get_writable(0)).await;
        match result {
            Ok(0) => {
                debug!(connection_id = self.state.id(), "read returned end of stream");
                self.completed = true;
                self.state.on_reader_complete();
            }
            Ok(bytes) => {
                self.buffer.commit_write(bytes);
                self.has_unexamined = true;
                if self.high_volume_logging {
                    debug!(connection_id = self.state.id(), bytes, "read succeeded");
                }
            }
            Err(SocketError::Canceled) => {
                debug!(connection_id = self.state.id(), "read canceled");
                self.canceled = true;
                self.state.on_reader_complete();
            }
            Err(e) => {
                info!(connection_id = self.state.id(), cause = %e, "read failed");
                self.completed = true;
                self.state.on_read_failed();
            }
        }
    }

    /// Releases everything before `consumed` and marks it examined.
    pub fn advance(&mut self, consumed: u64) {
        self.advance_to(consumed, consumed);
    }

    /// Releases everything before `consumed`; bytes up to `examined` were
    /// looked at and need more input before they can be consumed.
    ///
    /// Positions come from the [`Occupied`] view returned by
    /// [`read`](Self::read).
    ///
    /// # Panics
    ///
    /// Panics if `consumed` lies outside the buffered bytes, `examined` is
    /// before `consumed`, or `examined` is past the buffered end.
    pub fn advance_to(&mut self, consumed: u64, examined: u64) {
        assert!(examined >= consumed, "examined position {examined} is before consumed position {consumed}");
        let end = self.buffer.end();
        assert!(examined <= end, "examined position {examined} is past the buffered end {end}");
        self.buffer.consume_to(consumed);
        self.has_unexamined = self.buffer.has_unexamined(examined);
    }

    /// Asks the socket to abort an outstanding receive; the pending
    /// [`read`](Self::read) resolves canceled.
    pub fn cancel_pending_read(&self) {
        self.state.cancel_pending_read();
    }

    /// Stops reading. Bytes already buffered can still be drained.
    pub fn complete(&mut self, error: Option<&dyn Error>) {
        if let Some(e) = error {
            debug!(connection_id = self.state.id(), cause = %e, "reader completed with error");
        }
        self.completed = true;
        self.state.on_reader_complete();
    }

    pub fn is_completed(&self) -> bool {
        self.completed || self.canceled
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    pub(crate) fn dispose(&mut self) {
        self.buffer.dispose();
    }
}
