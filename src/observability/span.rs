//! Span handles and finished span records.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;

use crate::observability::context::{SpanContext, SpanId};
use crate::observability::telemetry::TelemetryInner;

/// Attribute value attached to spans and histogram observations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Str(Cow<'static, str>),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&'static str> for Value {
    fn from(v: &'static str) -> Self {
        Value::Str(Cow::Borrowed(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Cow::Owned(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// A key/value attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyValue {
    pub key: &'static str,
    pub value: Value,
}

impl KeyValue {
    pub fn new(key: &'static str, value: impl Into<Value>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// A span after it ended, as delivered to exporters.
#[derive(Debug, Clone)]
pub struct FinishedSpan {
    pub name: Cow<'static, str>,
    pub context: SpanContext,
    pub parent_span_id: Option<SpanId>,
    pub start_time: SystemTime,
    pub duration: Duration,
    pub attributes: Vec<KeyValue>,
    pub error: Option<String>,
}

impl FinishedSpan {
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .rev()
            .find(|kv| kv.key == key)
            .map(|kv| &kv.value)
    }
}

struct ActiveSpan {
    telemetry: Arc<TelemetryInner>,
    name: Cow<'static, str>,
    context: SpanContext,
    parent_span_id: Option<SpanId>,
    start_time: SystemTime,
    started: Instant,
    attributes: Vec<KeyValue>,
    error: Option<String>,
}

/// Handle to an open span.
///
/// The span ends exactly once: on [`Span::end`], or when the handle is dropped
/// (early return, `?`, cancelled future, panic unwind). Spans handed out by a
/// disabled telemetry record nothing.
#[must_use = "a span ends as soon as it is dropped"]
pub struct Span {
    active: Option<ActiveSpan>,
}

impl Span {
    pub(crate) fn start(
        telemetry: Arc<TelemetryInner>,
        name: Cow<'static, str>,
        context: SpanContext,
        parent: &SpanContext,
    ) -> Self {
        Self {
            active: Some(ActiveSpan {
                telemetry,
                name,
                context,
                parent_span_id: parent.is_valid().then(|| parent.span_id()),
                start_time: SystemTime::now(),
                started: Instant::now(),
                attributes: Vec::new(),
                error: None,
            }),
        }
    }

    pub(crate) fn noop() -> Self {
        Self { active: None }
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn set_attribute(&mut self, key: &'static str, value: impl Into<Value>) {
        if let Some(active) = self.active.as_mut() {
            active.attributes.push(KeyValue::new(key, value));
        }
    }

    /// Record a terminal error. The last recorded error wins.
    pub fn record_error(&mut self, err: &dyn std::error::Error) {
        if let Some(active) = self.active.as_mut() {
            let mut message = err.to_string();
            let mut source = err.source();
            while let Some(cause) = source {
                message.push_str(": ");
                message.push_str(&cause.to_string());
                source = cause.source();
            }
            active.error = Some(message);
        }
    }

    pub(crate) fn record_error_message(&mut self, message: impl Into<String>) {
        if let Some(active) = self.active.as_mut() {
            active.error = Some(message.into());
        }
    }

    pub fn end(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(active) = self.active.take() {
            let finished = FinishedSpan {
                name: active.name,
                context: active.context,
                parent_span_id: active.parent_span_id,
                start_time: active.start_time,
                duration: active.started.elapsed(),
                attributes: active.attributes,
                error: active.error,
            };
            active.telemetry.finish(finished);
        }
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        self.finish();
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.active {
            Some(active) => f
                .debug_struct("Span")
                .field("name", &active.name)
                .field("context", &active.context)
                .finish(),
            None => f.write_str("Span(noop)"),
        }
    }
}
