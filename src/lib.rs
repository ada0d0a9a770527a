//! Turnstile - round-robin HTTP load balancer
//!
//! Core library: the upstream targets, the load balancer that rotates
//! across them, and the HTTP/1.1 transport that feeds it.

pub mod config;
pub mod error;
pub mod http;
pub mod proxy;
pub mod server;
