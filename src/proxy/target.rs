//! Upstream targets
//!
//! A target is one backend the load balancer can hand a request to. The
//! balancer only sees the [`Upstream`] capability set, so anything that
//! can report an address and liveness and forward a request can join the
//! rotation.

use async_trait::async_trait;
use url::Url;

use crate::error::{ProxyError, TargetError};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::proxy::reverse::ReverseProxy;

/// Capabilities the load balancer needs from a backend.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// The address the target was configured with.
    fn address(&self) -> &str;

    /// Whether the target may be selected right now.
    fn is_alive(&self) -> bool;

    /// Relay `request` to the backend and return its response.
    async fn forward(&self, request: Request) -> Result<Response, ProxyError>;
}

/// Liveness predicate injected into a [`SimpleTarget`].
pub trait Liveness: Send + Sync {
    fn is_alive(&self) -> bool;
}

/// Reports every target as alive.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAlive;

impl Liveness for AlwaysAlive {
    fn is_alive(&self) -> bool {
        true
    }
}

impl<F> Liveness for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_alive(&self) -> bool {
        self()
    }
}

/// A backend reached through its own reverse proxy.
pub struct SimpleTarget {
    address: String,
    proxy: ReverseProxy,
    liveness: Box<dyn Liveness>,
}

impl SimpleTarget {
    /// Create a target for `address`.
    ///
    /// The address must be an absolute `http` or `https` URL with a host.
    pub fn new(address: impl Into<String>) -> Result<Self, TargetError> {
        let address = address.into();
        let url = parse_address(&address)?;
        let proxy = ReverseProxy::new(url).map_err(|source| TargetError::Client {
            address: address.clone(),
            source,
        })?;

        Ok(Self {
            address,
            proxy,
            liveness: Box::new(AlwaysAlive),
        })
    }

    /// Replace the liveness predicate.
    pub fn with_liveness(mut self, liveness: impl Liveness + 'static) -> Self {
        self.liveness = Box::new(liveness);
        self
    }

    /// Send the client's `Host` header upstream unchanged.
    ///
    /// Off by default: virtual-hosted upstreams route on their own name.
    pub fn preserve_host(mut self, preserve: bool) -> Self {
        self.proxy = self.proxy.with_preserve_host(preserve);
        self
    }

    /// The parsed form of [`Upstream::address`].
    pub fn url(&self) -> &Url {
        self.proxy.target()
    }
}

impl std::fmt::Debug for SimpleTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleTarget")
            .field("address", &self.address)
            .field("alive", &self.liveness.is_alive())
            .finish()
    }
}

#[async_trait]
impl Upstream for SimpleTarget {
    fn address(&self) -> &str {
        &self.address
    }

    fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }

    async fn forward(&self, request: Request) -> Result<Response, ProxyError> {
        self.proxy.serve(request).await
    }
}

fn parse_address(address: &str) -> Result<Url, TargetError> {
    let url = Url::parse(address).map_err(|source| TargetError::InvalidAddress {
        address: address.to_string(),
        source,
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(TargetError::UnsupportedScheme {
            address: address.to_string(),
            scheme: url.scheme().to_string(),
        });
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(TargetError::MissingHost {
            address: address.to_string(),
        });
    }

    Ok(url)
}
