//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Server (state.rs):
//!     Constructed → Started → Draining → Terminated
//!
//! Shutdown (shutdown.rs):
//!     shutdown() → Stop accepting → Drain connections → Force-close after grace
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: forced close after the grace period

pub mod shutdown;
pub mod signals;
pub mod state;

pub use shutdown::{Shutdown, ShutdownHandle, ShutdownOutcome, ShutdownSignal};
pub use signals::shutdown_signal;
pub use state::{Lifecycle, ServerState};
