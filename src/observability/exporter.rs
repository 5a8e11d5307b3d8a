//! Telemetry exporters.
//!
//! # Responsibilities
//! - Receive finished spans and histogram observations
//! - Deliver them to a sink (structured logs, metrics recorder)
//! - Flush buffered data on shutdown
//!
//! # Design Decisions
//! - Export calls are synchronous and cheap; buffering keeps request paths fast
//! - Shutdown is async so slow sinks can be bounded by a deadline

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::observability::context::TraceId;
use crate::observability::span::{FinishedSpan, KeyValue};
use crate::observability::telemetry::TelemetryError;

/// One numeric measurement destined for a histogram.
#[derive(Debug, Clone)]
pub struct HistogramObservation {
    pub name: &'static str,
    pub value: f64,
    pub attributes: Vec<KeyValue>,
    /// Trace the observation was made under, if any.
    pub trace_id: Option<TraceId>,
}

/// Sink for finished spans and histogram observations.
#[async_trait]
pub trait TelemetryExporter: Send + Sync + 'static {
    fn export_span(&self, span: FinishedSpan) -> Result<(), TelemetryError>;

    fn export_histogram(&self, observation: HistogramObservation) -> Result<(), TelemetryError>;

    /// Flush anything buffered and stop accepting data.
    async fn shutdown(&self) -> Result<(), TelemetryError>;
}

/// Exporter that writes spans as structured log events and forwards
/// histogram observations to the `metrics` facade.
///
/// Spans are buffered and written in batches of `batch_size`.
pub struct LogExporter {
    service_name: String,
    batch_size: usize,
    buffer: Mutex<Vec<FinishedSpan>>,
    closed: AtomicBool,
}

impl LogExporter {
    pub fn new(service_name: impl Into<String>, batch_size: usize) -> Self {
        Self {
            service_name: service_name.into(),
            batch_size: batch_size.max(1),
            buffer: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of spans waiting for the next batch.
    pub fn pending(&self) -> usize {
        self.buffer.lock().map(|b| b.len()).unwrap_or(0)
    }

    fn take_batch(&self, force: bool) -> Result<Vec<FinishedSpan>, TelemetryError> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| TelemetryError::Export("span buffer poisoned".into()))?;
        if force || buffer.len() >= self.batch_size {
            Ok(std::mem::take(&mut *buffer))
        } else {
            Ok(Vec::new())
        }
    }

    fn write_batch(&self, batch: Vec<FinishedSpan>) {
        for span in batch {
            let attributes = span
                .attributes
                .iter()
                .map(|kv| format!("{}={}", kv.key, kv.value))
                .collect::<Vec<_>>()
                .join(" ");
            let parent = span
                .parent_span_id
                .map(|id| id.to_string())
                .unwrap_or_default();

            tracing::info!(
                target: "telemetry::span",
                service = %self.service_name,
                name = %span.name,
                trace_id = %span.context.trace_id(),
                span_id = %span.context.span_id(),
                parent_span_id = %parent,
                duration_ms = span.duration.as_secs_f64() * 1000.0,
                attributes = %attributes,
                error = span.error.as_deref(),
                "span"
            );
        }
    }
}

#[async_trait]
impl TelemetryExporter for LogExporter {
    fn export_span(&self, span: FinishedSpan) -> Result<(), TelemetryError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TelemetryError::Closed);
        }
        {
            let mut buffer = self
                .buffer
                .lock()
                .map_err(|_| TelemetryError::Export("span buffer poisoned".into()))?;
            buffer.push(span);
        }
        let batch = self.take_batch(false)?;
        self.write_batch(batch);
        Ok(())
    }

    fn export_histogram(&self, observation: HistogramObservation) -> Result<(), TelemetryError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TelemetryError::Closed);
        }
        let labels: Vec<metrics::Label> = observation
            .attributes
            .iter()
            .map(|kv| metrics::Label::new(kv.key, kv.value.to_string()))
            .collect();
        metrics::histogram!(observation.name, labels).record(observation.value);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), TelemetryError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(TelemetryError::Closed);
        }
        let batch = self
            .take_batch(true)
            .map_err(|e| TelemetryError::Flush(e.to_string()))?;
        let flushed = batch.len();
        self.write_batch(batch);
        tracing::info!(flushed, "Span exporter flushed");
        Ok(())
    }
}
