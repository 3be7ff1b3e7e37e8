//! Answers every HTTP/1.1 request with `Hello World!`.
//!
//! ```shell
//! cargo run --example hello_world
//! curl -v http://127.0.0.1:8080/
//! ```

use bytes::{Buf, BufMut};
use micro_socket::{Connection, InboundStream, Listener, OutboundStream, TcpSocket, TransportError, TransportOptions};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

const MAX_HEADERS: usize = 64;
const RESPONSE_BODY: &[u8] = b"Hello World!\r\n";

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run().await {
        error!(cause = %e, "server error");
    }
}

async fn run() -> Result<(), TransportError> {
    let options = TransportOptions::builder().no_delay(true).listen_backlog(1024).build();
    let mut listener = Listener::new(Arc::new(options));
    listener.bind("127.0.0.1:8080".parse().expect("valid socket address"))?;
    info!(port = 8080, "start listening");

    loop {
        match listener.accept().await {
            Ok(Some(connection)) => {
                tokio::spawn(serve(connection));
            }
            Ok(None) => return Ok(()),
            Err(e) => warn!(cause = %e, "failed to accept"),
        }
    }
}

enum Parsed {
    Request { len: usize, path: String },
    Partial,
    Invalid(httparse::Error),
}

async fn serve(mut connection: Connection) {
    let id = connection.id().to_owned();
    let (input, output) = connection.split();

    if let Err(e) = respond(&id, input, output).await {
        error!(connection_id = %id, cause = %e, "request handling failed");
    }

    output.complete(None);
    input.complete(None);
    connection.dispose();
    info!(connection_id = %id, "finished process, connection shutdown");
}

async fn respond(
    id: &str,
    input: &mut InboundStream<TcpSocket>,
    output: &mut OutboundStream<TcpSocket>,
) -> Result<(), TransportError> {
    loop {
        let result = input.read().await;
        let completed = result.is_completed();
        let buffer = result.into_buffer();
        let (start, end) = (buffer.start(), buffer.end());

        let parsed = {
            // httparse wants contiguous bytes; copy only when the request spans segments
            let bytes = if buffer.chunk().len() == buffer.remaining() {
                Cow::Borrowed(buffer.chunk())
            } else {
                Cow::Owned(buffer.chunks().flatten().copied().collect::<Vec<_>>())
            };

            let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
            let mut request = httparse::Request::new(&mut headers);
            match request.parse(&bytes) {
                Ok(httparse::Status::Complete(len)) => Parsed::Request { len, path: request.path.unwrap_or("/").to_owned() },
                Ok(httparse::Status::Partial) => Parsed::Partial,
                Err(e) => Parsed::Invalid(e),
            }
        };

        match parsed {
            Parsed::Request { len, path } => {
                info!(connection_id = %id, path = %path, "request received");
                input.advance(start + len as u64);
            }
            Parsed::Partial if completed => return Ok(()),
            Parsed::Partial => {
                // keep the partial request, wait until more bytes arrive
                input.advance_to(start, end);
                continue;
            }
            Parsed::Invalid(e) => {
                warn!(connection_id = %id, cause = %e, "invalid request");
                return Ok(());
            }
        }

        // status line and headers are buffered, the body joins them in one send
        output.suspend();
        output.put_slice(b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n");
        output.put_slice(format!("Content-Length: {}\r\n\r\n", RESPONSE_BODY.len()).as_bytes());
        output.flush().await;
        output.put_slice(RESPONSE_BODY);
        output.resume().await?;

        if output.is_completed() {
            return Ok(());
        }
    }
}
