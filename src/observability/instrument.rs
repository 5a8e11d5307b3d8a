//! Mode-dependent handler instrumentation.
//!
//! # Responsibilities
//! - Pick, once at startup, whether route handlers are decorated
//! - Open a span around every decorated request and hand its context to handlers
//! - Record per-route request metrics
//!
//! # Design Decisions
//! - Two fixed strategies behind one `wrap` operation (identity, tracing decorator)
//! - The decorator layers the route's `MethodRouter`, so 405 responses are traced too
//! - Handlers receive the request's [`SpanContext`] as an extractor; without a
//!   decorator they see [`SpanContext::none`]

use std::convert::Infallible;
use std::time::Instant;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};

use crate::config::Mode;
use crate::observability::context::SpanContext;
use crate::observability::metrics;
use crate::observability::telemetry::Telemetry;

/// Strategy used to wrap every route handler, chosen by [`Mode`].
#[derive(Debug, Clone)]
pub enum InstrumentationGateway {
    /// Handlers are returned unchanged.
    Passthrough,
    /// Handlers are bracketed by a span and request metrics.
    Tracing(Telemetry),
}

impl InstrumentationGateway {
    pub fn for_mode(mode: Mode, telemetry: &Telemetry) -> Self {
        match mode {
            Mode::Plain => InstrumentationGateway::Passthrough,
            Mode::Traced => InstrumentationGateway::Tracing(telemetry.clone()),
        }
    }

    pub fn is_tracing(&self) -> bool {
        matches!(self, InstrumentationGateway::Tracing(_))
    }

    /// Wrap the handler for `route`.
    pub fn wrap<S>(&self, route: &'static str, handler: MethodRouter<S>) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        match self {
            InstrumentationGateway::Passthrough => handler,
            InstrumentationGateway::Tracing(telemetry) => {
                let instrumentation = RouteInstrumentation {
                    route,
                    telemetry: telemetry.clone(),
                };
                handler.layer(middleware::from_fn_with_state(instrumentation, trace_route))
            }
        }
    }
}

#[derive(Clone)]
struct RouteInstrumentation {
    route: &'static str,
    telemetry: Telemetry,
}

async fn trace_route(
    State(instrumentation): State<RouteInstrumentation>,
    mut request: Request,
    next: Next,
) -> Response {
    let RouteInstrumentation { route, telemetry } = instrumentation;
    let start = Instant::now();
    let method = request.method().clone();

    let parent = SpanContext::from_headers(request.headers()).unwrap_or_else(SpanContext::none);
    let (ctx, mut span) = telemetry.start_span(&parent, route);
    span.set_attribute("http.route", route);
    span.set_attribute("http.method", method.to_string());
    request.extensions_mut().insert(ctx);

    let response = next.run(request).await;

    let status = response.status();
    span.set_attribute("http.status_code", status.as_u16() as i64);
    if status.is_server_error() {
        span.record_error_message(format!("{route} responded {status}"));
    }
    metrics::record_request(method.as_str(), route, status.as_u16(), start);

    tracing::debug!(
        trace_id = %ctx.trace_id(),
        route,
        method = %method,
        status = status.as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Request traced"
    );
    span.end();
    response
}

impl<S> FromRequestParts<S> for SpanContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<SpanContext>()
            .copied()
            .unwrap_or_else(SpanContext::none))
    }
}
