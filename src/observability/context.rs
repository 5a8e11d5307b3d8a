//! Trace correlation tokens.
//!
//! A [`SpanContext`] links every span of one logical request into a single
//! trace. It is passed explicitly as a parameter through each layer and, for
//! outgoing sub-requests, serialized as a W3C `traceparent` header.

use std::fmt;

use axum::http::{HeaderMap, HeaderValue};
use rand::Rng;

/// W3C Trace Context header name.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// 128-bit trace identifier. Zero is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(u128);

/// 64-bit span identifier. Zero is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(u64);

impl TraceId {
    pub const INVALID: TraceId = TraceId(0);

    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        loop {
            let id: u128 = rng.gen();
            if id != 0 {
                return Self(id);
            }
        }
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 32 || !is_hex(hex) {
            return None;
        }
        u128::from_str_radix(hex, 16).ok().map(Self)
    }

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl SpanId {
    pub const INVALID: SpanId = SpanId(0);

    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        loop {
            let id: u64 = rng.gen();
            if id != 0 {
                return Self(id);
            }
        }
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 16 || !is_hex(hex) {
            return None;
        }
        u64::from_str_radix(hex, 16).ok().map(Self)
    }

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

/// `from_str_radix` alone would also take a leading sign.
fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Propagatable correlation handle for one span of a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanContext {
    trace_id: TraceId,
    span_id: SpanId,
    sampled: bool,
}

impl SpanContext {
    /// The "no parent" context. Spans started under it become trace roots.
    pub const fn none() -> Self {
        Self {
            trace_id: TraceId::INVALID,
            span_id: SpanId::INVALID,
            sampled: false,
        }
    }

    pub fn new(trace_id: TraceId, span_id: SpanId, sampled: bool) -> Self {
        Self {
            trace_id,
            span_id,
            sampled,
        }
    }

    /// A fresh root context with random identifiers.
    pub fn new_root() -> Self {
        Self::new(TraceId::random(), SpanId::random(), true)
    }

    /// A child of this context: same trace, new span id.
    /// Children of [`SpanContext::none`] are new roots.
    pub fn child(&self) -> Self {
        if self.is_valid() {
            Self::new(self.trace_id, SpanId::random(), self.sampled)
        } else {
            Self::new_root()
        }
    }

    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    pub fn is_sampled(&self) -> bool {
        self.sampled
    }

    pub fn is_valid(&self) -> bool {
        self.trace_id.is_valid() && self.span_id.is_valid()
    }

    /// Format as W3C traceparent header value.
    /// Format: version-trace_id-parent_id-flags
    pub fn to_traceparent(&self) -> String {
        format!(
            "00-{}-{}-{:02x}",
            self.trace_id,
            self.span_id,
            u8::from(self.sampled)
        )
    }

    /// Parse from W3C traceparent header value.
    pub fn from_traceparent(value: &str) -> Option<Self> {
        let parts: Vec<&str> = value.trim().split('-').collect();
        if parts.len() != 4 || parts[0] != "00" || parts[3].len() != 2 || !is_hex(parts[3]) {
            return None;
        }

        let trace_id = TraceId::from_hex(parts[1])?;
        let span_id = SpanId::from_hex(parts[2])?;
        let flags = u8::from_str_radix(parts[3], 16).ok()?;

        let ctx = Self::new(trace_id, span_id, flags & 0x01 != 0);
        ctx.is_valid().then_some(ctx)
    }

    /// Extract a remote parent from request headers.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(TRACEPARENT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(Self::from_traceparent)
    }

    /// Inject this context into outgoing request headers.
    /// Invalid contexts are not propagated.
    pub fn inject(&self, headers: &mut HeaderMap) {
        if !self.is_valid() {
            return;
        }
        if let Ok(value) = HeaderValue::from_str(&self.to_traceparent()) {
            headers.insert(TRACEPARENT_HEADER, value);
        }
    }
}

impl Default for SpanContext {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for SpanContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "trace_id={} span_id={} sampled={}",
            self.trace_id, self.span_id, self.sampled
        )
    }
}
