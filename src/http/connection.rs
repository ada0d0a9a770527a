use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::http::parser::{expects_continue, parse_http_request, ParseError};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;
use crate::proxy::{BalancerError, DispatchError, LoadBalancer};

pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    balancer: Arc<LoadBalancer>,
    buffer: BytesMut,
    state: ConnectionState,
    /// Set once `100 Continue` went out for the request being read.
    continue_sent: bool,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Writing(ResponseWriter, bool), // bool = keep_alive?
    Closed,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr, balancer: Arc<LoadBalancer>) -> Self {
        Self {
            stream,
            peer,
            balancer,
            buffer: BytesMut::with_capacity(4096),
            state: ConnectionState::Reading,
            continue_sent: false,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => {
                    self.state = match self.read_request().await {
                        Ok(Some(req)) => ConnectionState::Processing(req),
                        Ok(None) => ConnectionState::Closed,
                        Err(e) if e.is::<ParseError>() => {
                            tracing::debug!(peer = %self.peer, error = %e, "Rejecting malformed request");
                            let writer = ResponseWriter::new(Response::bad_request(), true);
                            ConnectionState::Writing(writer, false)
                        }
                        Err(e) => return Err(e),
                    };
                }

                ConnectionState::Processing(mut req) => {
                    req.remote_addr = Some(self.peer);
                    let keep_alive = req.keep_alive();
                    let chunked_ok = req.accepts_chunked();
                    let response = self.handle_request(req).await;

                    let writer = ResponseWriter::new(response, chunked_ok);
                    let keep_alive = keep_alive && !writer.closes_connection();
                    self.state = ConnectionState::Writing(writer, keep_alive);
                }

                ConnectionState::Writing(writer, keep_alive) => {
                    let sent = writer.write_to_stream(&mut self.stream).await?;
                    tracing::trace!(peer = %self.peer, bytes = sent, "Response written");

                    if keep_alive {
                        self.state = ConnectionState::Reading; // go back for next request
                    }
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    pub async fn read_request(&mut self) -> anyhow::Result<Option<Request>> {
        loop {
            // Try parsing whatever we already have
            match parse_http_request(&self.buffer) {
                Ok((request, consumed)) => {
                    self.buffer.advance(consumed);
                    self.continue_sent = false;
                    return Ok(Some(request));
                }

                Err(ParseError::Incomplete) => {
                    // A client that sent only its head may be waiting for
                    // permission to send the body.
                    if !self.continue_sent && expects_continue(&self.buffer) {
                        self.stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await?;
                        self.stream.flush().await?;
                        self.continue_sent = true;
                    }
                }

                Err(e) => {
                    return Err(e.into());
                }
            }

            let n = self.stream.read_buf(&mut self.buffer).await?;

            if n == 0 {
                if !self.buffer.is_empty() {
                    tracing::debug!(peer = %self.peer, "Client closed mid-request");
                }
                return Ok(None);
            }
        }
    }

    /// Dispatches one request and maps failures onto the response the
    /// client sees.
    fn handle_request(&self, req: Request) -> impl std::future::Future<Output = Response> + Send + 'static {
        let balancer = Arc::clone(&self.balancer);
        let peer = self.peer;
        async move {
            match balancer.dispatch(req).await {
                Ok(response) => response,
                Err(DispatchError::Forward(e)) => {
                    tracing::warn!(peer = %peer, error = %e, "proxy error");
                    Response::bad_gateway()
                }
                Err(DispatchError::Select(e @ BalancerError::NoLiveTargets)) => {
                    tracing::error!(peer = %peer, error = %e, "No upstream available");
                    Response::service_unavailable()
                }
                Err(DispatchError::Select(e)) => {
                    tracing::error!(peer = %peer, error = %e, "Dispatch failed");
                    Response::service_unavailable()
                }
            }
        }
    }
}
