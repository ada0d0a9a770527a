//! Error types for target construction, selection and forwarding.

use thiserror::Error;

/// Errors raised while building an upstream target.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("invalid upstream address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: url::ParseError,
    },

    #[error("upstream address {address:?} has no host")]
    MissingHost { address: String },

    #[error("upstream address {address:?} uses unsupported scheme {scheme:?}")]
    UnsupportedScheme { address: String, scheme: String },

    #[error("failed to build HTTP client for {address:?}: {source}")]
    Client {
        address: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors raised by the load balancer itself.
#[derive(Debug, Error)]
pub enum BalancerError {
    #[error("load balancer needs at least one upstream target")]
    NoTargets,

    #[error("no live upstream targets")]
    NoLiveTargets,

    #[error(transparent)]
    Target(#[from] TargetError),
}

/// Errors raised while relaying a request to an upstream.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("invalid request target {0:?}")]
    InvalidTarget(String),

    #[error("upstream returned invalid status code {0}")]
    InvalidStatus(u16),
}

/// Errors surfaced by a single dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Select(#[from] BalancerError),

    #[error(transparent)]
    Forward(#[from] ProxyError),
}
