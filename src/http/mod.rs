//! HTTP boundary.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, middleware, state)
//!     → request.rs (request id)
//!     → observability::instrument (route span, traced mode only)
//!     → handlers.rs / work.rs (translate to domain calls)
//!     → response.rs (errors as JSON)
//! ```
//!
//! `/multi` calls back into `/single` through client.rs, carrying the trace
//! context in a `traceparent` header.

pub mod client;
pub mod handlers;
pub mod request;
pub mod response;
pub mod server;
pub mod work;

pub use client::{SubrequestClient, WorkError};
pub use request::X_REQUEST_ID;
pub use response::ApiError;
pub use server::{build_router, AppState, Dependencies};
