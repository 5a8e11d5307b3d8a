//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → handed to the lifecycle controller at startup
//!
//! MODE environment variable
//!     → mode.rs (resolve once)
//!     → Mode (plain or traced, fixed for the process)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults so the service runs without a file
//! - The operating mode comes only from the environment, never the file

pub mod loader;
pub mod mode;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use mode::{Mode, MODE_ENV_VAR};
pub use schema::AppConfig;
pub use schema::HealthConfig;
pub use schema::HealthProbe;
pub use schema::ListenerConfig;
pub use schema::LogFormat;
pub use schema::ObservabilityConfig;
pub use schema::TimeoutConfig;
pub use schema::WorkConfig;
