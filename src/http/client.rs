//! Outbound calls to the `/single` endpoint.

use std::time::Duration;

use axum::{
    body::Body,
    http::{header::USER_AGENT, Method, Request, StatusCode, Uri},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::observability::SpanContext;

/// Upper bound on a sub-response body we bother to read.
const MAX_RESPONSE_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum WorkError {
    #[error("failed to build sub-request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("sub-request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("sub-request timed out after {0:?}")]
    Timeout(Duration),

    #[error("sub-request returned {0}")]
    Status(StatusCode),

    #[error("failed to read sub-response: {0}")]
    Body(#[from] axum::Error),
}

/// HTTP client bound to one sub-request target.
#[derive(Clone)]
pub struct SubrequestClient {
    client: Client<HttpConnector, Body>,
    target: Uri,
    timeout: Duration,
}

impl SubrequestClient {
    pub fn new(target: Uri, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            target,
            timeout,
        }
    }

    pub fn target(&self) -> &Uri {
        &self.target
    }

    /// Issue one `GET` to the target, continuing the trace in `ctx`.
    ///
    /// Anything but a 2xx response within the timeout is an error.
    pub async fn call(&self, ctx: &SpanContext) -> Result<(), WorkError> {
        let mut request = Request::builder()
            .method(Method::GET)
            .uri(self.target.clone())
            .header(USER_AGENT, concat!("traced-user-service/", env!("CARGO_PKG_VERSION")))
            .body(Body::empty())?;
        ctx.inject(request.headers_mut());

        let response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| WorkError::Timeout(self.timeout))??;

        let status = response.status();
        if !status.is_success() {
            return Err(WorkError::Status(status));
        }
        axum::body::to_bytes(Body::new(response.into_body()), MAX_RESPONSE_BYTES).await?;
        Ok(())
    }
}
