//! The telemetry handle injected into every layer that emits spans or metrics.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::observability::context::SpanContext;
use crate::observability::exporter::{HistogramObservation, TelemetryExporter};
use crate::observability::span::{FinishedSpan, KeyValue, Span};

/// Errors raised by telemetry exporters.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The exporter was already shut down.
    #[error("exporter is shut down")]
    Closed,

    /// The exporter could not deliver data to its sink.
    #[error("export failed: {0}")]
    Export(String),

    /// Flushing buffered data failed during shutdown.
    #[error("flush failed: {0}")]
    Flush(String),
}

/// Counters of spans opened and closed through one telemetry handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpanStats {
    pub opened: u64,
    pub closed: u64,
}

pub(crate) struct TelemetryInner {
    service_name: String,
    exporter: Arc<dyn TelemetryExporter>,
    opened: AtomicU64,
    closed: AtomicU64,
}

impl TelemetryInner {
    pub(crate) fn finish(&self, span: FinishedSpan) {
        self.closed.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.exporter.export_span(span) {
            tracing::warn!(
                service = %self.service_name,
                error = %e,
                "Dropping span, exporter rejected it"
            );
        }
    }
}

/// Cheap, cloneable handle to the process telemetry pipeline.
///
/// A disabled handle (plain mode) hands out no-op spans and drops histogram
/// observations, so callers never branch on the mode themselves.
#[derive(Clone, Default)]
pub struct Telemetry {
    inner: Option<Arc<TelemetryInner>>,
}

impl Telemetry {
    /// Create an enabled handle that delivers to `exporter`.
    pub fn new(service_name: impl Into<String>, exporter: Arc<dyn TelemetryExporter>) -> Self {
        Self {
            inner: Some(Arc::new(TelemetryInner {
                service_name: service_name.into(),
                exporter,
                opened: AtomicU64::new(0),
                closed: AtomicU64::new(0),
            })),
        }
    }

    /// Create a handle that records nothing.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Start a child of `parent` (or a new root when `parent` is
    /// [`SpanContext::none`]). Returns the context to pass further down.
    ///
    /// When disabled the parent context is returned unchanged. A valid parent
    /// that is not sampled yields a no-op span; its child context still
    /// propagates the trace, unsampled.
    pub fn start_span(
        &self,
        parent: &SpanContext,
        name: impl Into<Cow<'static, str>>,
    ) -> (SpanContext, Span) {
        match &self.inner {
            Some(_) if parent.is_valid() && !parent.is_sampled() => (parent.child(), Span::noop()),
            Some(inner) => {
                inner.opened.fetch_add(1, Ordering::Relaxed);
                let context = parent.child();
                let span = Span::start(inner.clone(), name.into(), context, parent);
                (context, span)
            }
            None => (*parent, Span::noop()),
        }
    }

    /// Record one histogram observation.
    ///
    /// Never fails the caller: exporter errors are logged and swallowed.
    pub fn record_histogram(
        &self,
        ctx: &SpanContext,
        name: &'static str,
        value: f64,
        attributes: &[KeyValue],
    ) {
        let Some(inner) = &self.inner else {
            return;
        };

        let observation = HistogramObservation {
            name,
            value,
            attributes: attributes.to_vec(),
            trace_id: ctx.is_valid().then(|| ctx.trace_id()),
        };
        if let Err(e) = inner.exporter.export_histogram(observation) {
            tracing::warn!(metric = name, error = %e, "Dropping histogram observation");
        }
    }

    /// Spans opened and closed so far.
    pub fn span_stats(&self) -> SpanStats {
        self.inner
            .as_ref()
            .map(|inner| SpanStats {
                opened: inner.opened.load(Ordering::Relaxed),
                closed: inner.closed.load(Ordering::Relaxed),
            })
            .unwrap_or_default()
    }

    /// Flush and close the exporter. Only the bootstrap calls this.
    pub(crate) async fn shutdown(&self) -> Result<(), TelemetryError> {
        match &self.inner {
            Some(inner) => inner.exporter.shutdown().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Some(inner) => f
                .debug_struct("Telemetry")
                .field("service_name", &inner.service_name)
                .field("stats", &self.span_stats())
                .finish(),
            None => f.write_str("Telemetry(disabled)"),
        }
    }
}
