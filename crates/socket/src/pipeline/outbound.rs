use crate::connection::ConnectionState;
use crate::error::{OutputError, SocketError};
use crate::memory::RollingBuffer;
use crate::network::NetworkSocket;
use bytes::buf::UninitSlice;
use bytes::{Buf, BufMut};
use std::error::Error;
use std::io::{self, IoSlice};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, trace, warn};

// upper bound of segments handed to a single vectored send
const MAX_IO_SLICES: usize = 64;

/// The writing half of a connection.
///
/// Writes land in a [`RollingBuffer`] and reach the socket on
/// [`flush`](Self::flush). While the stream is suspended flushes are deferred,
/// and the final [`resume`](Self::resume) sends everything buffered in the
/// meantime, letting a response be assembled from several writes and still
/// go out as one vectored send.
#[derive(Debug)]
pub struct OutboundStream<S: NetworkSocket> {
    state: Arc<ConnectionState<S>>,
    buffer: RollingBuffer,
    suspend_count: AtomicUsize,
    completed: bool,
    high_volume_logging: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushResult {
    is_canceled: bool,
    is_completed: bool,
}

impl FlushResult {
    pub fn is_canceled(&self) -> bool {
        self.is_canceled
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }
}

impl<S: NetworkSocket> OutboundStream<S> {
    pub(crate) fn new(state: Arc<ConnectionState<S>>, buffer: RollingBuffer, high_volume_logging: bool) -> Self {
        Self { state, buffer, suspend_count: AtomicUsize::new(0), completed: false, high_volume_logging }
    }

    /// See [`RollingBuffer::get_writable`].
    pub fn get_writable(&mut self, size_hint: usize) -> &mut [u8] {
        self.buffer.get_writable(size_hint)
    }

    /// See [`RollingBuffer::commit_write`].
    pub fn commit_write(&mut self, count: usize) {
        self.buffer.commit_write(count);
    }

    /// Number of bytes written but not yet sent.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Defers flushes until a matching [`resume`](Self::resume). Returns the
    /// new suspend count.
    pub fn suspend(&self) -> usize {
        let count = self.suspend_count.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(connection_id = self.state.id(), suspend_count = count, "writer suspended");
        count
    }

    /// Undoes one [`suspend`](Self::suspend), flushing once the count drops to
    /// zero. Returns the new suspend count.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::UnbalancedResume`] when the stream is not
    /// suspended; the stream stays usable.
    pub async fn resume(&mut self) -> Result<usize, OutputError> {
        let previous = self
            .suspend_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| count.checked_sub(1))
            .map_err(|count| {
                warn!(connection_id = self.state.id(), suspend_count = count, "resume called without a matching suspend");
                OutputError::UnbalancedResume
            })?;

        let count = previous - 1;
        trace!(connection_id = self.state.id(), suspend_count = count, "writer resumed");
        if count == 0 {
            self.flush_buffer_to_socket().await;
        }
        Ok(count)
    }

    pub fn is_suspended(&self) -> bool {
        self.suspend_count.load(Ordering::SeqCst) > 0
    }

    /// Sends every buffered byte unless the stream is suspended.
    ///
    /// Only waits while the socket's send buffer is full, and stops waiting
    /// as soon as pending output is canceled.
    pub async fn flush(&mut self) -> FlushResult {
        if !self.is_suspended() {
            self.flush_buffer_to_socket().await;
        }
        FlushResult { is_canceled: self.is_canceled(), is_completed: self.is_completed() }
    }

    async fn flush_buffer_to_socket(&mut self) {
        while !self.is_completed() && !self.buffer.is_empty() {
            let result = {
                let occupied = self.buffer.occupied();
                let mut slices = [IoSlice::new(&[]); MAX_IO_SLICES];
                let count = occupied.chunks_vectored(&mut slices);
                if self.high_volume_logging {
                    debug!(connection_id = self.state.id(), bytes = self.buffer.len(), "write starting");
                }
                tokio::select! {
                    biased;
                    () = self.state.write_canceled_token().cancelled() => Err(SocketError::Canceled),
                    sent = self.state.socket.send(&slices[..count]) => sent,
                }
            };

            match result {
                Ok(0) => self.fail(&SocketError::io(io::ErrorKind::WriteZero)),
                Ok(bytes) => {
                    self.buffer.consume(bytes);
                    if self.high_volume_logging {
                        debug!(connection_id = self.state.id(), bytes, "write succeeded");
                    }
                }
                Err(SocketError::Canceled) => self.state.cancel_pending_write(),
                Err(e) => self.fail(&e),
            }
        }
    }

    fn fail(&mut self, e: &SocketError) {
        info!(connection_id = self.state.id(), cause = %e, "write failed");
        self.completed = true;
        self.state.on_write_failed();
    }

    /// Stops sending; later flushes report canceled.
    pub fn cancel_pending_flush(&self) {
        self.state.cancel_pending_write();
    }

    pub fn is_canceled(&self) -> bool {
        self.state.is_write_canceled()
    }

    pub fn is_completed(&self) -> bool {
        self.completed || self.is_canceled()
    }

    /// Stops writing. Bytes not flushed before are dropped.
    pub fn complete(&mut self, error: Option<&dyn Error>) {
        if let Some(e) = error {
            debug!(connection_id = self.state.id(), cause = %e, "writer completed with error");
        }
        self.completed = true;
        self.state.on_writer_complete();
    }

    pub(crate) fn dispose(&mut self) {
        self.buffer.dispose();
    }
}

// SAFETY: every call is forwarded to the safe `RollingBuffer` cursor methods,
// which panic rather than expose memory outside the last segment.
unsafe impl<S: NetworkSocket> BufMut for OutboundStream<S> {
    fn remaining_mut(&self) -> usize {
        self.buffer.remaining_mut()
    }

    unsafe fn advance_mut(&mut self, cnt: usize) {
        self.buffer.commit_write(cnt);
    }

    fn chunk_mut(&mut self) -> &mut UninitSlice {
        UninitSlice::new(self.buffer.get_writable(0))
    }
}
