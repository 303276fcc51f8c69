//! TCP listener binding.
//!
//! # Responsibilities
//! - Resolve the configured address (host names and `:port` shorthand)
//! - Bind the listening socket
//! - Report the bound address

use tokio::net::TcpListener;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Address could not be resolved to a socket address.
    #[error("invalid listen address '{address}': {source}")]
    Resolve {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to bind to address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Expand `:port` into a wildcard bind address.
pub fn normalize_address(address: &str) -> String {
    if address.starts_with(':') {
        format!("0.0.0.0{address}")
    } else {
        address.to_string()
    }
}

/// Bind to the configured address.
pub async fn bind(address: &str) -> Result<TcpListener, ListenerError> {
    let address = normalize_address(address);

    let addrs: Vec<_> = tokio::net::lookup_host(address.as_str())
        .await
        .map_err(|source| ListenerError::Resolve {
            address: address.clone(),
            source,
        })?
        .collect();

    let listener = TcpListener::bind(addrs.as_slice())
        .await
        .map_err(|source| ListenerError::Bind {
            address: address.clone(),
            source,
        })?;

    if let Ok(local_addr) = listener.local_addr() {
        tracing::info!(address = %local_addr, "Listener bound");
    }

    Ok(listener)
}
