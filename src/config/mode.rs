//! Operating mode resolution.
//!
//! The mode decides whether request handlers are wrapped with span and metric
//! capture. It is read from the environment exactly once at startup.

use std::fmt;

/// Environment variable selecting the operating mode.
pub const MODE_ENV_VAR: &str = "MODE";

/// Tokens (compared case-insensitively) that select [`Mode::Traced`].
const TRACED_TOKENS: &[&str] = &["otel", "traced"];

/// Process-wide selector between plain and instrumented request handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Handlers run bare; telemetry primitives are no-ops.
    #[default]
    Plain,
    /// Handlers are wrapped with tracing and metrics.
    Traced,
}

impl Mode {
    /// Resolve a raw value. Unknown or empty input yields [`Mode::Plain`].
    pub fn resolve(raw: &str) -> Self {
        let value = raw.trim().to_ascii_lowercase();
        if TRACED_TOKENS.contains(&value.as_str()) {
            Mode::Traced
        } else {
            Mode::Plain
        }
    }

    /// Resolve from the `MODE` environment variable.
    pub fn from_env() -> Self {
        std::env::var(MODE_ENV_VAR)
            .map(|raw| Self::resolve(&raw))
            .unwrap_or_default()
    }

    pub fn is_traced(self) -> bool {
        self == Mode::Traced
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Plain => write!(f, "plain"),
            Mode::Traced => write!(f, "traced"),
        }
    }
}
