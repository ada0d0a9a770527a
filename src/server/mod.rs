//! TCP listener that feeds client connections to the load balancer.

pub mod listener;
