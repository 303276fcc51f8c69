//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (Ctrl+C) or SIGTERM
//! - Report which signal arrived so the caller can start graceful shutdown
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGTERM is only available on Unix; elsewhere Ctrl+C is the only trigger

/// Wait for a termination signal and return its name.
pub async fn shutdown_signal() -> std::io::Result<&'static str> {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await?;
        Ok::<_, std::io::Error>("SIGINT")
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            res = ctrl_c => res,
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await
    }
}
