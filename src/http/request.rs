//! Request id assignment.
//!
//! Every request carries an `x-request-id`. One is generated (UUID v4) when
//! the client did not send it, and it is echoed back on the response.

use axum::http::{HeaderName, HeaderValue, Request};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates a fresh UUID v4 per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Layer that assigns a request id when the request has none.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

/// Layer that copies the request id onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// The request id of `request`, or `"unknown"`.
pub fn request_id_of<B>(request: &Request<B>) -> &str {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }

    #[tokio::test]
    async fn test_request_id_generated_when_absent() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let id = response.headers().get(X_REQUEST_ID).unwrap().to_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_request_id_preserved_when_present() {
        let request = Request::builder()
            .uri("/")
            .header(X_REQUEST_ID, "abc-123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_id_of(&request), "abc-123");

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.headers().get(X_REQUEST_ID).unwrap(), "abc-123");
    }
}
