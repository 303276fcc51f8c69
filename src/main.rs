//! Route Gateway
//!
//! Loads the route configuration, registers one forwarding handler per route
//! plus the liveness probe, and serves until SIGINT/SIGTERM.
//!
//! # Exit Codes
//! - `0`: clean shutdown, every request drained
//! - `1`: configuration or bind error, or the shutdown grace period was exceeded

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::task::JoinError;

use route_gateway::config::{load_config, GatewayConfig};
use route_gateway::http::{upstream_client, ForwardingHandler, LivenessHandler};
use route_gateway::lifecycle::shutdown_signal;
use route_gateway::observability::{logging, metrics};
use route_gateway::routing::RouteTable;
use route_gateway::{GatewayServer, ServerError, ServerState};

#[derive(Parser)]
#[command(name = "route-gateway")]
#[command(about = "Path-prefix HTTP reverse-proxy gateway", long_about = None)]
struct Cli {
    /// Configuration file (.yml, .yaml or .toml)
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,

    /// Log level used when RUST_LOG is not set (e.g., debug)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level.as_deref());

    tracing::info!("route-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %cli.config.display(), error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        address = %config.server.address,
        upstreams = config.upstreams.len(),
        health_check_path = %config.server.health_check_path,
        "Configuration loaded"
    );

    if cli.check {
        tracing::info!("Configuration is valid");
        return ExitCode::SUCCESS;
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(e) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    error = %e,
                    "Failed to parse metrics address"
                );
            }
        }
    }

    let server = match build_server(config) {
        Ok(server) => Arc::new(server),
        Err(e) => {
            tracing::error!(error = %e, "Failed to set up routes");
            return ExitCode::FAILURE;
        }
    };

    let mut serving = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.start().await })
    };

    tokio::select! {
        result = &mut serving => return exit_code(serve_succeeded(result)),
        signal = shutdown_signal() => match signal {
            Ok(name) => tracing::info!(signal = name, "Shutdown signal received"),
            Err(e) => {
                // Without signal handlers only the server itself can end the process.
                tracing::error!(error = %e, "Failed to listen for shutdown signals, serving until stopped");
                return exit_code(serve_succeeded(serving.await));
            }
        },
    }

    let outcome = server.shutdown().await;
    if let Err(e) = serving.await {
        tracing::error!(error = %e, "Server task failed");
    }

    tracing::info!(outcome = %outcome, "Shutdown complete");
    exit_code(outcome.is_clean())
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Whether a serving task that ended on its own did so cleanly.
fn serve_succeeded(result: Result<Result<(), ServerError>, JoinError>) -> bool {
    match result {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Server failed");
            false
        }
        Err(e) => {
            tracing::error!(error = %e, "Server task failed");
            false
        }
    }
}

/// Construct the server and register the liveness probe and every route.
fn build_server(config: GatewayConfig) -> Result<GatewayServer, Box<dyn std::error::Error>> {
    let routes = RouteTable::from_config(&config.upstreams)?;
    let health_check_path = config.server.health_check_path.clone();
    let server = GatewayServer::new(config.server);

    server.register_handler(&health_check_path, LivenessHandler)?;
    tracing::info!(pattern = %health_check_path, "Registered liveness handler");

    let client = upstream_client();
    for route in &routes {
        let pattern = route.pattern().to_string();
        let backend = route.backend_url().to_string();
        let rewrite_prefix = route.rewrite_prefix();

        server.register_handler(&pattern, ForwardingHandler::with_client(route.clone(), client.clone()))?;
        tracing::info!(
            pattern = %pattern,
            backend = %backend,
            rewrite_prefix,
            "Registered forwarding handler"
        );
    }

    Ok(server)
}
