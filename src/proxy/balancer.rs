//! Round-robin load balancer
//!
//! Holds a fixed, ordered pool of upstream targets and hands each request
//! to the next live one.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::Config;
use crate::error::{BalancerError, DispatchError};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::proxy::target::{SimpleTarget, Upstream};

/// Round-robin dispatcher over a fixed set of targets.
///
/// Insertion order is rotation order. The cursor only ever grows and is
/// reduced modulo the pool size before indexing.
pub struct LoadBalancer {
    port: String,
    targets: Vec<Box<dyn Upstream>>,
    cursor: AtomicUsize,
}

impl LoadBalancer {
    /// Create a load balancer.
    ///
    /// Fails with [`BalancerError::NoTargets`] when `targets` is empty.
    pub fn new(
        port: impl Into<String>,
        targets: Vec<Box<dyn Upstream>>,
    ) -> Result<Self, BalancerError> {
        if targets.is_empty() {
            return Err(BalancerError::NoTargets);
        }

        Ok(Self {
            port: port.into(),
            targets,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Build a [`SimpleTarget`] for each configured upstream, in order.
    ///
    /// Stops at the first address that fails to parse.
    pub fn from_config(config: &Config) -> Result<Self, BalancerError> {
        let targets = config
            .upstreams
            .iter()
            .map(|address| {
                SimpleTarget::new(address.as_str())
                    .map(|t| Box::new(t.preserve_host(config.preserve_host)) as Box<dyn Upstream>)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(config.listen_port.as_str(), targets)
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn targets(&self) -> impl Iterator<Item = &dyn Upstream> {
        self.targets.iter().map(|t| t.as_ref())
    }

    /// Select the next live target.
    ///
    /// One slot is claimed atomically; dead targets after it are skipped and
    /// the cursor is advanced past them so the next caller continues from
    /// the slot after the selected one. At most one full pass is made:
    /// if no target is alive, [`BalancerError::NoLiveTargets`] is returned.
    pub fn select_next(&self) -> Result<&dyn Upstream, BalancerError> {
        let len = self.targets.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed);

        for skipped in 0..len {
            let target = self.targets[start.wrapping_add(skipped) % len].as_ref();

            if target.is_alive() {
                if skipped > 0 {
                    self.cursor.fetch_add(skipped, Ordering::Relaxed);
                }
                return Ok(target);
            }

            tracing::debug!(address = target.address(), "Skipping upstream that is not alive");
        }

        Err(BalancerError::NoLiveTargets)
    }

    /// Forward `request` to the next live target.
    ///
    /// Forwarding failures are returned as-is; there is no retry against
    /// another target.
    pub async fn dispatch(&self, request: Request) -> Result<Response, DispatchError> {
        let target = self.select_next()?;

        tracing::info!(
            address = target.address(),
            method = %request.method,
            path = %request.path,
            "Forwarding request"
        );

        Ok(target.forward(request).await?)
    }
}

impl std::fmt::Debug for LoadBalancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBalancer")
            .field("port", &self.port)
            .field(
                "targets",
                &self.targets.iter().map(|t| t.address()).collect::<Vec<_>>(),
            )
            .field("cursor", &self.cursor.load(Ordering::Relaxed))
            .finish()
    }
}
