//! Route Gateway
//!
//! A small HTTP reverse-proxy gateway built with Tokio, Hyper and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ net::listener ──▶ http::server ──▶ routing::mux
//!                                                          │
//!                                 ┌────────────────────────┴──────────┐
//!                                 ▼                                   ▼
//!                        http::liveness                      http::forward ──▶ Backend
//!                        (200, empty)                        (per route)
//!
//!     Cross-cutting: config, lifecycle (state, shutdown, signals), observability
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use http::{GatewayServer, ServerError};
pub use lifecycle::{ServerState, ShutdownHandle, ShutdownOutcome};
