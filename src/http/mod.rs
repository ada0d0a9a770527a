//! HTTP/1.1 transport for the inbound side of the proxy.
//!
//! The HTTP layer is organized into several submodules:
//!
//! - **`connection`**: per-client state machine that feeds requests to the load balancer
//! - **`parser`**: parses incoming HTTP requests from byte buffers
//! - **`headers`**: ordered, case-insensitive header list
//! - **`request`**: HTTP request representation
//! - **`response`**: HTTP response representation with builder pattern
//! - **`writer`**: writes responses to the client, streaming upstream bodies
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for incoming request data
//!        └──────┬──────┘
//!               │ Request received
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Dispatch to an upstream
//!        └──────┬───────────┘
//!               │ Response ready
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Send response to client
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close → Closed
//! ```
//!
//! A request that fails to parse skips Processing: the connection writes
//! `400 Bad Request` and closes. While Reading, a complete head with
//! `Expect: 100-continue` is answered with `100 Continue` before the body
//! is awaited.

pub mod connection;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
