//! Gateway server: registration, accept loop and graceful shutdown.
//!
//! # Responsibilities
//! - Collect pattern registrations before the server starts
//! - Bind the listener and accept connections, one task per connection
//! - Configure HTTP/1.1 and HTTP/2 (header read timeout, header size limits)
//! - Wire up middleware (request ID, tracing) around the serve mux
//! - Enforce write and idle timeouts per connection; the write timeout covers
//!   the whole response, body included
//! - Drain connections on shutdown, force-closing after the grace period
//!
//! # Design Decisions
//! - The dispatch table is frozen into an `Arc` at start; no locks while serving
//! - The accept loop never awaits a handler
//! - Connections are driven by hyper directly so each one can be asked to
//!   finish its in-flight request and close

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use hyper::body::{Body as HttpBody, Frame, Incoming, SizeHint};
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::{Instant, Sleep};
use tower::ServiceExt;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::http::handler::Handler;
use crate::lifecycle::{
    Lifecycle, ServerState, Shutdown, ShutdownHandle, ShutdownOutcome, ShutdownSignal,
};
use crate::net::connection::RequestGuard;
use crate::net::{listener, ConnectionGuard, ConnectionId, ConnectionTracker, ListenerError};
use crate::routing::{RegistrationError, ServeMux};

/// Smallest read buffer hyper accepts for HTTP/1.
const MIN_HTTP1_BUF_SIZE: usize = 8192;

/// Pause after a failed accept (e.g., file descriptor exhaustion).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Errors returned by [`GatewayServer`].
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("server is {0}, expected constructed")]
    InvalidState(ServerState),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// HTTP gateway serving a pattern dispatch table.
pub struct GatewayServer {
    config: ServerConfig,
    mux: Mutex<ServeMux>,
    lifecycle: Arc<Lifecycle>,
    tracker: ConnectionTracker,
}

impl GatewayServer {
    /// Create a server with the given tuning. Nothing is bound until `start`.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            mux: Mutex::new(ServeMux::new()),
            lifecycle: Arc::new(Lifecycle::new()),
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle.state()
    }

    /// Number of client connections currently open.
    pub fn open_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Register `handler` for `pattern`.
    ///
    /// Only allowed before the server starts.
    pub fn register_handler(
        &self,
        pattern: &str,
        handler: impl Handler,
    ) -> Result<(), ServerError> {
        let mut mux = self.mux.lock().unwrap_or_else(PoisonError::into_inner);
        match self.lifecycle.state() {
            ServerState::Constructed => {}
            state => return Err(ServerError::InvalidState(state)),
        }
        mux.register(pattern, handler)?;
        tracing::debug!(pattern = %pattern, "Handler registered");
        Ok(())
    }

    /// Bind the configured address and serve until shutdown completes.
    pub async fn start(&self) -> Result<(), ServerError> {
        let mux = self.freeze()?;
        let _terminate = self.terminate_on_drop();
        let listener = listener::bind(&self.config.address).await?;
        self.run(listener, mux).await;
        Ok(())
    }

    /// Serve on an already-bound listener until shutdown completes.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let mux = self.freeze()?;
        let _terminate = self.terminate_on_drop();
        self.run(listener, mux).await;
        Ok(())
    }

    /// Stop accepting, drain within `shutdown_timeout`, then force-close.
    pub async fn shutdown(&self) -> ShutdownOutcome {
        self.lifecycle.shutdown().await
    }

    /// Handle that can stop this server from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(Arc::clone(&self.lifecycle))
    }

    /// Leave the constructed state and take a snapshot of the dispatch table.
    fn freeze(&self) -> Result<Arc<ServeMux>, ServerError> {
        let mux = self.mux.lock().unwrap_or_else(PoisonError::into_inner);
        self.lifecycle.begin().map_err(ServerError::InvalidState)?;
        Ok(Arc::new(mux.clone()))
    }

    fn terminate_on_drop(&self) -> TerminateOnDrop<'_> {
        TerminateOnDrop {
            lifecycle: &self.lifecycle,
            tracker: &self.tracker,
        }
    }

    async fn run(&self, listener: TcpListener, mux: Arc<ServeMux>) {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(
                address = %addr,
                patterns = ?mux,
                "Gateway server listening"
            );
        }

        let app = build_router(mux);
        let builder = connection_builder(&self.config);
        let settings = ConnectionSettings {
            write_timeout: self.config.write_timeout,
            idle_timeout: self.config.idle_timeout,
        };

        let mut shutdown = self.lifecycle.shutdown_signal();
        let drain = Shutdown::new();
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => break,

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let guard = self.tracker.track();
                        tracing::trace!(connection_id = %guard.id(), peer = %peer, "Connection accepted");
                        connections.spawn(serve_connection(
                            stream,
                            peer,
                            app.clone(),
                            builder.clone(),
                            settings,
                            guard,
                            drain.subscribe(),
                        ));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },

                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!(error = %e, "Connection task panicked");
                        }
                    }
                }
            }
        }

        drop(listener);
        self.lifecycle.begin_draining();
        drain.trigger();
        tracing::info!(
            connections = connections.len(),
            grace = ?self.config.shutdown_timeout,
            "Stopped accepting, draining connections"
        );

        let drained = tokio::time::timeout(self.config.shutdown_timeout, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        let outcome = match drained {
            Ok(()) => ShutdownOutcome::Drained,
            Err(_) => {
                let forced = connections.len();
                connections.abort_all();
                while connections.join_next().await.is_some() {}
                ShutdownOutcome::GraceExceeded { forced }
            }
        };

        match outcome {
            ShutdownOutcome::Drained => tracing::info!("All connections drained"),
            ShutdownOutcome::GraceExceeded { forced } => {
                tracing::warn!(forced, "Grace period exceeded, connections forced closed")
            }
        }
        self.lifecycle.finish(outcome);
    }
}

/// Publishes a terminal outcome when serving ends early (bind failure or a
/// dropped serve future). A completed drain has already published its own.
struct TerminateOnDrop<'a> {
    lifecycle: &'a Lifecycle,
    tracker: &'a ConnectionTracker,
}

impl Drop for TerminateOnDrop<'_> {
    fn drop(&mut self) {
        let forced = self.tracker.active_count() as usize;
        let outcome = if forced == 0 {
            ShutdownOutcome::Drained
        } else {
            ShutdownOutcome::GraceExceeded { forced }
        };
        self.lifecycle.finish(outcome);
    }
}

#[derive(Debug, Clone, Copy)]
struct ConnectionSettings {
    write_timeout: Duration,
    idle_timeout: Duration,
}

/// UUID v4 request IDs for `x-request-id`.
#[derive(Debug, Clone, Copy, Default)]
struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Build the Axum router wrapping the serve mux with middleware layers.
fn build_router(mux: Arc<ServeMux>) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(mux)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
}

async fn dispatch(State(mux): State<Arc<ServeMux>>, request: Request<Body>) -> Response {
    mux.dispatch(request).await
}

fn connection_builder(config: &ServerConfig) -> auto::Builder<TokioExecutor> {
    let mut builder = auto::Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(config.read_timeout)
        .max_buf_size(config.max_header_bytes.max(MIN_HTTP1_BUF_SIZE));
    builder
        .http2()
        .timer(TokioTimer::new())
        .max_header_list_size(u32::try_from(config.max_header_bytes).unwrap_or(u32::MAX));
    builder
}

/// Serve one client connection until it closes, idles out or is drained.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    app: Router,
    builder: auto::Builder<TokioExecutor>,
    settings: ConnectionSettings,
    guard: ConnectionGuard,
    mut drain: ShutdownSignal,
) {
    let connection_id = guard.id();
    let activity = Arc::clone(guard.activity());

    let service = {
        let activity = Arc::clone(&activity);
        hyper::service::service_fn(move |mut request: Request<Incoming>| {
            let app = app.clone();
            let in_flight = activity.begin();
            async move {
                let deadline = Instant::now() + settings.write_timeout;
                request.extensions_mut().insert(ConnectInfo(peer));
                let response = match tokio::time::timeout_at(deadline, app.oneshot(request)).await {
                    Ok(Ok(response)) => response.map(|body| {
                        Body::new(DeadlineBody::new(body, deadline, in_flight, connection_id))
                    }),
                    Ok(Err(never)) => match never {},
                    Err(_) => {
                        tracing::warn!(
                            connection_id = %connection_id,
                            timeout = ?settings.write_timeout,
                            "Response not produced within write timeout"
                        );
                        StatusCode::GATEWAY_TIMEOUT.into_response()
                    }
                };
                Ok::<_, Infallible>(response)
            }
        })
    };

    let conn = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let mut closing = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(connection_id = %connection_id, error = %e, "Connection ended with error");
                }
                break;
            }
            _ = drain.recv(), if !closing => {
                closing = true;
                conn.as_mut().graceful_shutdown();
            }
            _ = activity.idle_timeout(settings.idle_timeout), if !closing => {
                tracing::debug!(connection_id = %connection_id, "Closing idle connection");
                closing = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }

    drop(guard);
}

#[derive(Debug, thiserror::Error)]
#[error("response not delivered within the write timeout")]
struct WriteTimeoutElapsed;

/// Response body that fails once the write deadline passes.
///
/// Failing the body makes hyper abort the connection, so a stalled backend
/// cannot hold the client past the deadline. Holds the request's in-flight
/// mark until the body is done.
struct DeadlineBody {
    inner: Body,
    deadline: Pin<Box<Sleep>>,
    expired: bool,
    connection_id: ConnectionId,
    _in_flight: RequestGuard,
}

impl DeadlineBody {
    fn new(inner: Body, deadline: Instant, in_flight: RequestGuard, connection_id: ConnectionId) -> Self {
        Self {
            inner,
            deadline: Box::pin(tokio::time::sleep_until(deadline)),
            expired: false,
            connection_id,
            _in_flight: in_flight,
        }
    }
}

impl HttpBody for DeadlineBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.expired {
            return Poll::Ready(None);
        }
        if let Poll::Ready(frame) = Pin::new(&mut this.inner).poll_frame(cx) {
            return Poll::Ready(frame);
        }
        if this.deadline.as_mut().poll(cx).is_ready() {
            this.expired = true;
            tracing::warn!(
                connection_id = %this.connection_id,
                "Response body not delivered within write timeout"
            );
            return Poll::Ready(Some(Err(axum::Error::new(WriteTimeoutElapsed))));
        }
        Poll::Pending
    }

    fn is_end_stream(&self) -> bool {
        self.expired || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
