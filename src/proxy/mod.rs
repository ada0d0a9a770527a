//! Reverse proxy functionality
//!
//! This module implements the dispatch core: upstream targets, the
//! round-robin load balancer, and the reverse proxy each target forwards
//! through.

pub mod balancer;
pub mod reverse;
pub mod target;

pub use crate::error::{BalancerError, DispatchError, ProxyError, TargetError};
pub use balancer::LoadBalancer;
pub use reverse::ReverseProxy;
pub use target::{AlwaysAlive, Liveness, SimpleTarget, Upstream};
