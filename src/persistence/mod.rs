//! Persistence access for the user record.
//!
//! # Responsibilities
//! - Define the store contract consumed by the domain service
//! - Provide an in-process store so the service runs end to end
//!
//! # Design Decisions
//! - Every operation takes the caller's [`SpanContext`] for log correlation;
//!   stores never open spans of their own
//! - "Not found" is a distinct error variant so the layer above can turn it
//!   into an absent result

pub mod entity;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::observability::SpanContext;

pub use entity::{NewUser, User};
pub use memory::MemoryStore;

/// Errors surfaced by a [`UserStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No live record matched.
    #[error("record not found")]
    NotFound,

    /// The store's own uniqueness constraint on email fired.
    #[error("duplicate email: {email}")]
    UniqueViolation { email: String },

    /// The backing engine failed.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Opaque store for [`User`] records.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Prepare the schema. Called once at startup before serving.
    async fn prepare(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Persist a new user, assigning id and timestamps.
    async fn create(&self, ctx: &SpanContext, user: NewUser) -> Result<User, StoreError>;

    async fn get_by_id(&self, ctx: &SpanContext, id: u64) -> Result<User, StoreError>;

    async fn get_by_email(&self, ctx: &SpanContext, email: &str) -> Result<User, StoreError>;

    /// Live users ordered by id.
    async fn list(&self, ctx: &SpanContext, limit: u32, offset: u64) -> Result<Vec<User>, StoreError>;
}
