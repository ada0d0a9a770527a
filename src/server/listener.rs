use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::info;

use crate::http::connection::Connection;
use crate::proxy::LoadBalancer;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to accept: {0}")]
    Accept(#[source] std::io::Error),
}

pub async fn run(addr: &str, balancer: Arc<LoadBalancer>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    info!("Listening on {}", addr);
    info!("Serving requests at 'localhost:{}'", balancer.port());

    serve(listener, balancer).await
}

/// Accept connections forever, one task per client.
///
/// A failed accept (out of file descriptors, a connection reset before it
/// was taken) is logged and retried after a growing pause; it never stops
/// the server.
pub async fn serve(listener: TcpListener, balancer: Arc<LoadBalancer>) -> anyhow::Result<()> {
    let mut backoff = AcceptBackoff::default();

    loop {
        let (socket, peer) = match accept(&listener).await {
            Ok(accepted) => {
                backoff.reset();
                accepted
            }
            Err(e) => {
                let delay = backoff.next_delay();
                tracing::warn!(error = %e, retry_in = ?delay, "Accept failed");
                tokio::time::sleep(delay).await;
                continue;
            }
        };
        tracing::debug!("Accepted connection from {}", peer);

        let balancer = Arc::clone(&balancer);
        tokio::spawn(async move {
            let mut conn = Connection::new(socket, peer, balancer);
            if let Err(e) = conn.run().await {
                tracing::error!("Connection error from {}: {}", peer, e);
            }
        });
    }
}

async fn accept(listener: &TcpListener) -> Result<(TcpStream, SocketAddr), ListenerError> {
    listener.accept().await.map_err(ListenerError::Accept)
}

const MIN_ACCEPT_DELAY: Duration = Duration::from_millis(5);
const MAX_ACCEPT_DELAY: Duration = Duration::from_secs(1);

/// Pause between failed accepts: doubles from 5ms up to 1s, and starts
/// over after a successful accept.
#[derive(Debug, Default)]
struct AcceptBackoff {
    current: Option<Duration>,
}

impl AcceptBackoff {
    fn next_delay(&mut self) -> Duration {
        let delay = match self.current {
            None => MIN_ACCEPT_DELAY,
            Some(prev) => (prev * 2).min(MAX_ACCEPT_DELAY),
        };
        self.current = Some(delay);
        delay
    }

    fn reset(&mut self) {
        self.current = None;
    }
}
