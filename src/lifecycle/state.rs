//! Gateway server state machine.
//!
//! # State Transitions
//! ```text
//! Constructed → Started      : start()/serve()
//! Started     → Draining     : shutdown() observed by the accept loop
//! Draining    → Terminated   : drain finished or grace period expired
//! Constructed → Terminated   : shutdown() before start
//! ```
//!
//! # Design Decisions
//! - State is a single atomic; transitions out of Constructed use compare-exchange
//! - The shutdown outcome is published once and read by every waiter

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::watch;

use crate::lifecycle::shutdown::{Shutdown, ShutdownOutcome, ShutdownSignal};

/// Lifecycle state of a gateway server.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Constructed = 0,
    Started = 1,
    Draining = 2,
    Terminated = 3,
}

impl From<u8> for ServerState {
    fn from(val: u8) -> Self {
        match val {
            0 => ServerState::Constructed,
            1 => ServerState::Started,
            2 => ServerState::Draining,
            _ => ServerState::Terminated,
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::Constructed => "constructed",
            ServerState::Started => "started",
            ServerState::Draining => "draining",
            ServerState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Shared lifecycle of one server: state, shutdown trigger and outcome.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
    shutdown: Shutdown,
    outcome: watch::Sender<Option<ShutdownOutcome>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            state: AtomicU8::new(ServerState::Constructed as u8),
            shutdown: Shutdown::new(),
            outcome,
        }
    }

    pub fn state(&self) -> ServerState {
        ServerState::from(self.state.load(Ordering::SeqCst))
    }

    /// Move from Constructed to Started. On failure returns the current state.
    pub fn begin(&self) -> Result<(), ServerState> {
        self.state
            .compare_exchange(
                ServerState::Constructed as u8,
                ServerState::Started as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map(|_| ())
            .map_err(ServerState::from)
    }

    /// Signal the accept loop has stopped and connections are draining.
    pub fn begin_draining(&self) {
        self.state
            .store(ServerState::Draining as u8, Ordering::SeqCst);
    }

    /// Record the final outcome and enter Terminated.
    ///
    /// Only the first outcome is kept.
    pub fn finish(&self, outcome: ShutdownOutcome) {
        self.state
            .store(ServerState::Terminated as u8, Ordering::SeqCst);
        self.outcome.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(outcome);
            true
        });
    }

    /// Signal observed by the accept loop.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.subscribe()
    }

    /// Trigger shutdown and wait for the accept loop to publish the outcome.
    pub async fn shutdown(&self) -> ShutdownOutcome {
        let never_started = self
            .state
            .compare_exchange(
                ServerState::Constructed as u8,
                ServerState::Terminated as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if never_started {
            self.finish(ShutdownOutcome::Drained);
        }

        self.shutdown.trigger();

        let mut rx = self.outcome.subscribe();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => *outcome,
            Err(_) => None,
        };
        outcome.unwrap_or(ShutdownOutcome::Drained)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
