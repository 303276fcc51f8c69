//! The single capability every registered responder implements.
//!
//! Liveness and forwarding handlers (and test doubles) are all plain
//! [`Handler`]s; the serve mux stores them as trait objects keyed by pattern.

use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::BoxFuture;

/// Respond to an HTTP request.
pub trait Handler: Send + Sync + 'static {
    /// Produce the response for `request`. Must always resolve to a response;
    /// failures are mapped to an HTTP status by the handler itself.
    fn serve(&self, request: Request<Body>) -> BoxFuture<'_, Response>;
}

/// Handler stored in the dispatch table.
pub type SharedHandler = Arc<dyn Handler>;

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn serve(&self, request: Request<Body>) -> BoxFuture<'_, Response> {
        (**self).serve(request)
    }
}

/// Adapter turning an async closure into a [`Handler`].
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

/// Build a [`Handler`] from an async function or closure.
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    HandlerFn { f }
}

impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn serve(&self, request: Request<Body>) -> BoxFuture<'_, Response> {
        Box::pin((self.f)(request))
    }
}
