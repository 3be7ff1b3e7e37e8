//! The two byte channels a connection exposes to the protocol layer
//!
//! - [`InboundStream`]: pull-based reader with consumed/examined tracking
//! - [`OutboundStream`]: buffered writer with suspend/resume batching

mod inbound;
mod outbound;

pub use inbound::{InboundStream, ReadResult};
pub use outbound::{FlushResult, OutboundStream};
