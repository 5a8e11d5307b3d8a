//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! bootstrap.rs (acquire once per process)
//!     → logging.rs (tracing subscriber)
//!     → metrics.rs (Prometheus recorder, traced mode only)
//!     → exporter.rs (span / histogram sink)
//!     → Telemetry handle, injected into every layer
//!
//! Per request (traced mode):
//!     instrument.rs opens the route span
//!     → handler span → service span (context.rs threads the trace)
//!     → span.rs delivers finished spans to the exporter
//! ```
//!
//! # Design Decisions
//! - No ambient tracer globals: the telemetry handle is passed explicitly
//! - Plain mode hands out a disabled handle; call sites stay identical
//! - Telemetry failures never change a response

pub mod bootstrap;
pub mod context;
pub mod exporter;
pub mod instrument;
pub mod logging;
pub mod memory;
pub mod metrics;
pub mod span;
pub mod telemetry;

pub use bootstrap::{BootstrapError, Observability};
pub use context::{SpanContext, SpanId, TraceId};
pub use exporter::{HistogramObservation, LogExporter, TelemetryExporter};
pub use instrument::InstrumentationGateway;
pub use memory::InMemoryExporter;
pub use span::{FinishedSpan, KeyValue, Span, Value};
pub use telemetry::{SpanStats, Telemetry, TelemetryError};
