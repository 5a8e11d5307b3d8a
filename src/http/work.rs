//! Simulated work endpoints: `/single` sleeps, `/multi` fans out to `/single`.

use std::ops::RangeInclusive;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header::HOST, HeaderMap},
    Json,
};
use rand::Rng;
use serde_json::{json, Value as JsonValue};

use crate::config::WorkConfig;
use crate::http::client::{SubrequestClient, WorkError};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics::{SLEEP_DURATION, SUBREQUESTS};
use crate::observability::{KeyValue, SpanContext, Telemetry};

/// Sleep and fan-out bounds, validated at config load.
#[derive(Debug, Clone)]
pub struct WorkSettings {
    sleep_ms: RangeInclusive<u64>,
    fanout: RangeInclusive<u32>,
}

impl WorkSettings {
    pub fn from_config(config: &WorkConfig) -> Self {
        Self {
            sleep_ms: config.min_sleep_ms..=config.max_sleep_ms,
            fanout: config.min_fanout..=config.max_fanout,
        }
    }

    fn sleep_time(&self) -> Duration {
        Duration::from_millis(rand::thread_rng().gen_range(self.sleep_ms.clone()))
    }

    fn fanout(&self) -> u32 {
        rand::thread_rng().gen_range(self.fanout.clone())
    }
}

pub async fn single(
    State(state): State<AppState>,
    ctx: SpanContext,
    headers: HeaderMap,
) -> String {
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let slept = random_sleep(&state.telemetry, &state.work, &ctx, host).await;
    format!("work completed in {slept:?}\n")
}

pub async fn multi(
    State(state): State<AppState>,
    ctx: SpanContext,
) -> Result<Json<JsonValue>, ApiError> {
    let n = state.work.fanout();
    tracing::info!(trace_id = %ctx.trace_id(), subrequests = n, "Generating sub-requests");

    compute_subrequests(&state.telemetry, &state.client, &ctx, n)
        .await
        .map_err(|e| {
            tracing::warn!(
                trace_id = %ctx.trace_id(),
                target = %state.client.target(),
                error = %e,
                "Sub-request failed"
            );
            ApiError::BadGateway("Sub-request failed")
        })?;

    Ok(Json(json!({ "multi": "success" })))
}

async fn random_sleep(
    telemetry: &Telemetry,
    work: &WorkSettings,
    ctx: &SpanContext,
    host: String,
) -> Duration {
    let sleep_time = work.sleep_time();
    tokio::time::sleep(sleep_time).await;

    telemetry.record_histogram(
        ctx,
        SLEEP_DURATION,
        sleep_time.as_secs_f64(),
        &[KeyValue::new("host.value", host)],
    );
    sleep_time
}

/// Call the sub-request target `n` times in sequence under one `subrequests`
/// span. Stops at the first failure; the count is recorded only when every
/// call succeeded.
pub async fn compute_subrequests(
    telemetry: &Telemetry,
    client: &SubrequestClient,
    ctx: &SpanContext,
    n: u32,
) -> Result<(), WorkError> {
    let (ctx, mut span) = telemetry.start_span(ctx, "subrequests");
    span.set_attribute("subrequests.count", n);

    for completed in 0..n {
        if let Err(e) = client.call(&ctx).await {
            span.set_attribute("subrequests.completed", completed);
            span.record_error(&e);
            return Err(e);
        }
    }

    telemetry.record_histogram(&ctx, SUBREQUESTS, f64::from(n), &[]);
    Ok(())
}
