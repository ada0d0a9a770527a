//! Response serialisation
//!
//! The head is written in one go. A body held in memory follows it
//! directly; a streamed body is copied chunk by chunk as the upstream
//! produces it, so the proxy never holds a whole upstream reply.
//!
//! Framing for streamed bodies:
//!
//! ```text
//!   length known          -> Content-Length, raw bytes
//!   length unknown, 1.1   -> Transfer-Encoding: chunked
//!   length unknown, 1.0   -> raw bytes, connection closes afterwards
//! ```

use futures_util::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::headers::HeaderMap;
use crate::http::response::{Body, Response, StatusCode};

const HTTP_VERSION: &str = "HTTP/1.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Sized,
    Chunked,
    UntilClose,
}

pub struct ResponseWriter {
    head: Vec<u8>,
    body: Body,
    framing: Framing,
}

impl ResponseWriter {
    /// Prepare `response` for a client that can (`chunked_ok`) or cannot
    /// read chunked bodies.
    pub fn new(response: Response, chunked_ok: bool) -> Self {
        let Response {
            status,
            mut headers,
            body,
        } = response;

        let framing = match body.length() {
            Some(_) => Framing::Sized,
            None if chunked_ok => {
                headers.remove("Content-Length");
                headers.insert("Transfer-Encoding", "chunked");
                Framing::Chunked
            }
            None => {
                headers.remove("Content-Length");
                headers.insert("Connection", "close");
                Framing::UntilClose
            }
        };

        Self {
            head: serialize_head(status, &headers),
            body,
            framing,
        }
    }

    /// Whether the body is delimited by closing the connection.
    pub fn closes_connection(&self) -> bool {
        self.framing == Framing::UntilClose
    }

    /// Write the head and body, returning the number of body bytes sent.
    ///
    /// An error from a streamed body surfaces here after the head has gone
    /// out; the connection cannot be reused after that.
    pub async fn write_to_stream<W>(self, stream: &mut W) -> anyhow::Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        stream.write_all(&self.head).await?;

        let sent = match self.body {
            Body::Full(bytes) => {
                stream.write_all(&bytes).await?;
                bytes.len() as u64
            }
            Body::Stream { stream: mut body, .. } => {
                let mut sent = 0u64;
                while let Some(chunk) = body.next().await {
                    let chunk = chunk?;
                    // a zero-size chunk would end a chunked body early
                    if chunk.is_empty() {
                        continue;
                    }

                    if self.framing == Framing::Chunked {
                        stream.write_all(format!("{:x}\r\n", chunk.len()).as_bytes()).await?;
                        stream.write_all(&chunk).await?;
                        stream.write_all(b"\r\n").await?;
                    } else {
                        stream.write_all(&chunk).await?;
                    }
                    sent += chunk.len() as u64;
                }

                if self.framing == Framing::Chunked {
                    stream.write_all(b"0\r\n\r\n").await?;
                }
                sent
            }
        };

        stream.flush().await?;
        Ok(sent)
    }
}

fn serialize_head(status: StatusCode, headers: &HeaderMap) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        status.as_u16(),
        status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    for (k, v) in headers.iter() {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");
    buf
}
