//! In-process user store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::observability::SpanContext;
use crate::persistence::{NewUser, StoreError, User, UserStore};

/// A thread-safe, in-memory [`UserStore`].
///
/// Cloning shares the same data. Email uniqueness among live users is
/// enforced here as well as in the domain service.
#[derive(Clone)]
pub struct MemoryStore {
    users: Arc<DashMap<u64, User>>,
    /// email -> id of the live user owning it.
    emails: Arc<DashMap<String, u64>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            users: Arc::new(DashMap::new()),
            emails: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Number of live users.
    pub fn count(&self) -> usize {
        self.emails.len()
    }

    /// Mark a user deleted. The record stays but disappears from reads and
    /// releases its email.
    ///
    /// Never holds a `users` guard while touching `emails`: `create` locks
    /// them in the opposite order.
    pub fn soft_delete(&self, id: u64) -> Result<(), StoreError> {
        let email = {
            let mut user = self.users.get_mut(&id).ok_or(StoreError::NotFound)?;
            if user.is_deleted() {
                return Err(StoreError::NotFound);
            }
            let now = Utc::now();
            user.deleted_at = Some(now);
            user.updated_at = now;
            user.email.clone()
        };
        self.emails.remove_if(&email, |_, owner| *owner == id);
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, ctx: &SpanContext, user: NewUser) -> Result<User, StoreError> {
        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(StoreError::UniqueViolation { email: user.email }),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let now = Utc::now();
                let record = User {
                    id,
                    name: user.name,
                    email: user.email,
                    created_at: now,
                    updated_at: now,
                    deleted_at: None,
                };
                self.users.insert(id, record.clone());
                slot.insert(id);

                tracing::debug!(trace_id = %ctx.trace_id(), user_id = id, "User inserted");
                Ok(record)
            }
        }
    }

    async fn get_by_id(&self, ctx: &SpanContext, id: u64) -> Result<User, StoreError> {
        tracing::debug!(trace_id = %ctx.trace_id(), user_id = id, "Fetching user by id");
        self.users
            .get(&id)
            .filter(|u| !u.is_deleted())
            .map(|u| u.value().clone())
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_email(&self, ctx: &SpanContext, email: &str) -> Result<User, StoreError> {
        tracing::debug!(trace_id = %ctx.trace_id(), "Fetching user by email");
        let id = *self.emails.get(email).ok_or(StoreError::NotFound)?;
        self.get_by_id(ctx, id).await
    }

    async fn list(&self, ctx: &SpanContext, limit: u32, offset: u64) -> Result<Vec<User>, StoreError> {
        let mut live: Vec<User> = self
            .users
            .iter()
            .filter(|entry| !entry.value().is_deleted())
            .map(|entry| entry.value().clone())
            .collect();
        live.sort_by_key(|u| u.id);

        let page: Vec<User> = live
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(limit as usize)
            .collect();

        tracing::debug!(
            trace_id = %ctx.trace_id(),
            limit,
            offset,
            returned = page.len(),
            "Listed users"
        );
        Ok(page)
    }
}
