//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     UpstreamConfig[]
//!     → table.rs (validate patterns and backend URLs, reject duplicates)
//!     → RouteTable (immutable)
//!
//! Request dispatch:
//!     Request path
//!     → mux.rs (clean path, exact hit, subtree redirect, longest subtree)
//!     → Return: handler, redirect or 404
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same pattern

pub mod mux;
pub mod table;

pub use mux::{clean_path, RegistrationError, Resolution, ServeMux};
pub use table::{RouteDefinition, RouteError, RouteTable};
