//! Liveness probe handler.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::future::{self, BoxFuture};

use crate::http::handler::Handler;

/// Always answers `200 OK` with an empty body, whatever the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct LivenessHandler;

impl Handler for LivenessHandler {
    fn serve(&self, _request: Request<Body>) -> BoxFuture<'_, Response> {
        Box::pin(future::ready(StatusCode::OK.into_response()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[tokio::test]
    async fn test_any_method_any_body() {
        for method in [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS] {
            let request = Request::builder()
                .method(method.clone())
                .uri("/health-check")
                .header("content-type", "application/json")
                .body(Body::from("{\"ping\": true}"))
                .unwrap();

            let response = LivenessHandler.serve(request).await;
            assert_eq!(response.status(), StatusCode::OK, "{method}");

            let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
            assert!(body.is_empty());
        }
    }
}
