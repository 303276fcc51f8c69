//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Configured address
//!     → listener.rs (resolve, bind)
//!     → accept loop in http::server
//!     → connection.rs (lifecycle tracking, idle detection)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Each connection tracked for graceful shutdown
//! - Bind failures surface as typed errors before the server starts

pub mod connection;
pub mod listener;

pub use connection::{ConnectionActivity, ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{bind, ListenerError};
