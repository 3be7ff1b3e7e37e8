use std::io;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("socket error: {source}")]
    SocketError {
        #[from]
        source: SocketError,
    },

    #[error("output error: {source}")]
    OutputError {
        #[from]
        source: OutputError,
    },

    #[error("listen error: {source}")]
    ListenError {
        #[from]
        source: ListenError,
    },
}

#[derive(Error, Debug)]
pub enum SocketError {
    #[error("pending read was canceled")]
    Canceled,

    #[error("concurrent calls to receive are not allowed")]
    ConcurrentReceive,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SocketError {
    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("unexpected call to resume, it must be called exactly once per suspend")]
    UnbalancedResume,
}

#[derive(Error, Debug)]
pub enum ListenError {
    #[error("listener is not bound")]
    NotBound,

    #[error("listener is already bound to {endpoint}")]
    AlreadyBound { endpoint: SocketAddr },

    #[error("failed to bind {endpoint}: {source}")]
    Bind { endpoint: SocketAddr, source: io::Error },

    #[error("failed to accept: {source}")]
    Accept { source: io::Error },
}

impl ListenError {
    pub fn bind(endpoint: SocketAddr, source: io::Error) -> Self {
        Self::Bind { endpoint, source }
    }

    pub fn accept<E: Into<io::Error>>(e: E) -> Self {
        Self::Accept { source: e.into() }
    }
}
