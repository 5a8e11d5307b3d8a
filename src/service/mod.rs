//! Domain services.
//!
//! # Data Flow
//! ```text
//! http handlers
//!     → user.rs (uniqueness, not-found semantics, pagination)
//!     → persistence::UserStore
//! ```

pub mod pagination;
pub mod user;

pub use pagination::Pagination;
pub use user::{ServiceError, UserService};
