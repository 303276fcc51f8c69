//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper connection, request ID, tracing, timeouts)
//!     → routing::mux (most specific pattern wins)
//!     → liveness.rs (200, empty body)
//!       forward.rs  (strip prefix, rewrite target, headers.rs cleanup)
//!     → Stream response to client
//! ```

pub mod forward;
pub mod handler;
pub mod headers;
pub mod liveness;
pub mod server;

pub use forward::{upstream_client, ForwardError, ForwardingHandler, UpstreamClient};
pub use handler::{handler_fn, Handler, HandlerFn, SharedHandler};
pub use liveness::LivenessHandler;
pub use server::{GatewayServer, ServerError};
