//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the level passed on the command line

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when neither `RUST_LOG` nor a CLI level is given.
pub const DEFAULT_FILTER: &str = "route_gateway=info,tower_http=info";

/// Install the global tracing subscriber.
pub fn init_logging(level: Option<&str>) {
    let fallback = level.map_or_else(
        || DEFAULT_FILTER.to_string(),
        |level| format!("route_gateway={level},tower_http={level}"),
    );

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
