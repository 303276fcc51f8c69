//! Per-route reverse proxy.
//!
//! # Responsibilities
//! - Compute the outbound path (optional prefix strip, backend base path join)
//! - Point the request at the backend and clean up hop-by-hop headers
//! - Stream the backend response back unchanged
//! - Map backend failures to 502 Bad Gateway
//!
//! # Design Decisions
//! - One pooled client shared by all routes; the pool is internally synchronized
//! - Bodies are streamed in both directions, never buffered
//! - No retries: a failed attempt is answered immediately
//! - Dropping the handler future (client gone, write timeout, forced shutdown)
//!   drops the outbound request and its connection

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::uri::Scheme;
use axum::http::{header, Request, StatusCode, Uri, Version};
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::http::handler::Handler;
use crate::http::headers;
use crate::observability::metrics;
use crate::routing::RouteDefinition;

/// Pooled HTTP/1.1 client used for all backend calls.
pub type UpstreamClient = Client<HttpConnector, Body>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Build the shared upstream client.
pub fn upstream_client() -> UpstreamClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(CONNECT_TIMEOUT));
    connector.set_nodelay(true);

    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .build(connector)
}

/// Errors that prevent a request from being sent upstream.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("request path does not start with the route prefix")]
    PrefixMismatch,

    #[error("invalid outbound uri: {0}")]
    InvalidUri(#[from] axum::http::Error),
}

/// Forwards every request it receives to one route's backend.
#[derive(Clone)]
pub struct ForwardingHandler {
    route: Arc<RouteDefinition>,
    client: UpstreamClient,
}

impl ForwardingHandler {
    /// Create a handler with its own client.
    pub fn new(route: RouteDefinition) -> Self {
        Self::with_client(route, upstream_client())
    }

    /// Create a handler sharing an existing client pool.
    pub fn with_client(route: RouteDefinition, client: UpstreamClient) -> Self {
        Self {
            route: Arc::new(route),
            client,
        }
    }

    /// Path and query to request from the backend for an inbound URI.
    pub fn outbound_path_and_query(&self, inbound: &Uri) -> Result<String, ForwardError> {
        let path = inbound.path();
        let path = if self.route.rewrite_prefix() {
            path.strip_prefix(self.route.strip_prefix())
                .ok_or(ForwardError::PrefixMismatch)?
        } else {
            path
        };

        let backend = self.route.backend_url();
        let mut target = join_paths(backend.path(), path);

        let query = match (backend.query().unwrap_or(""), inbound.query().unwrap_or("")) {
            ("", q) | (q, "") => q.to_string(),
            (base, q) => format!("{base}&{q}"),
        };
        if !query.is_empty() {
            target.push('?');
            target.push_str(&query);
        }
        Ok(target)
    }

    /// Absolute backend URI for an inbound URI.
    pub fn outbound_uri(&self, inbound: &Uri) -> Result<Uri, ForwardError> {
        let path_and_query = self.outbound_path_and_query(inbound)?;
        let uri = Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.route.authority().clone())
            .path_and_query(path_and_query)
            .build()?;
        Ok(uri)
    }

    async fn forward(&self, request: Request<Body>) -> Response {
        let start_time = Instant::now();
        let pattern = self.route.pattern();
        let method = request.method().clone();
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        let (mut parts, body) = request.into_parts();

        let uri = match self.outbound_uri(&parts.uri) {
            Ok(uri) => uri,
            Err(ForwardError::PrefixMismatch) => {
                tracing::debug!(request_id = %request_id, route = %pattern, path = %parts.uri.path(), "Path outside route prefix");
                metrics::record_request(pattern, method.as_str(), 404, start_time);
                return (StatusCode::NOT_FOUND, "404 page not found\n").into_response();
            }
            Err(e) => {
                tracing::error!(request_id = %request_id, route = %pattern, error = %e, "Cannot build upstream request");
                metrics::record_request(pattern, method.as_str(), 502, start_time);
                return StatusCode::BAD_GATEWAY.into_response();
            }
        };

        let client_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let inbound_host = parts.headers.get(header::HOST).cloned();

        headers::strip_hop_by_hop(&mut parts.headers);
        headers::set_forwarded(&mut parts.headers, client_ip, inbound_host);
        // The client derives Host from the outbound URI.
        parts.headers.remove(header::HOST);

        tracing::debug!(
            request_id = %request_id,
            route = %pattern,
            method = %method,
            upstream = %uri,
            "Forwarding request"
        );

        parts.uri = uri;
        parts.version = Version::HTTP_11;
        let outbound = Request::from_parts(parts, body);

        match self.client.request(outbound).await {
            Ok(response) => {
                let (mut parts, body) = response.into_parts();
                headers::strip_hop_by_hop(&mut parts.headers);
                metrics::record_request(pattern, method.as_str(), parts.status.as_u16(), start_time);
                Response::from_parts(parts, Body::new(body))
            }
            Err(e) => {
                tracing::error!(
                    request_id = %request_id,
                    route = %pattern,
                    upstream = %self.route.authority(),
                    error = %e,
                    "Upstream error"
                );
                metrics::record_request(pattern, method.as_str(), 502, start_time);
                StatusCode::BAD_GATEWAY.into_response()
            }
        }
    }
}

impl Handler for ForwardingHandler {
    fn serve(&self, request: Request<Body>) -> BoxFuture<'_, Response> {
        Box::pin(self.forward(request))
    }
}

/// Join a backend base path and a request path with exactly one slash.
///
/// An empty or unrooted request path is treated as rooted at `/`.
fn join_paths(base: &str, path: &str) -> String {
    let path = path.strip_prefix('/').unwrap_or(path);
    let mut joined = String::with_capacity(base.len() + path.len() + 2);
    joined.push_str(base);
    if !joined.ends_with('/') {
        joined.push('/');
    }
    joined.push_str(path);
    joined
}
