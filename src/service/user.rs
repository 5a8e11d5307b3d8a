//! User domain rules.

use std::sync::Arc;

use thiserror::Error;

use crate::config::HealthProbe;
use crate::observability::{SpanContext, Telemetry};
use crate::persistence::{NewUser, StoreError, User, UserStore};
use crate::service::pagination::Pagination;

/// Domain-level failures.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A live user already owns the email.
    #[error("user with email {email} already exists")]
    Conflict { email: String },

    /// Any store failure other than "not found".
    #[error("failed to {operation}")]
    Unexpected {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl ServiceError {
    fn unexpected(operation: &'static str, source: StoreError) -> Self {
        ServiceError::Unexpected { operation, source }
    }
}

/// Business rules over the user store.
pub struct UserService {
    store: Arc<dyn UserStore>,
    telemetry: Telemetry,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, telemetry: Telemetry) -> Self {
        Self { store, telemetry }
    }

    /// Create a user unless a live user already owns `email`.
    pub async fn create_user(
        &self,
        ctx: &SpanContext,
        name: &str,
        email: &str,
    ) -> Result<User, ServiceError> {
        let (ctx, mut span) = self.telemetry.start_span(ctx, "UserService.CreateUser");
        span.set_attribute("user.name", name.to_string());
        span.set_attribute("user.email", email.to_string());

        match self.store.get_by_email(&ctx, email).await {
            Ok(_) => {
                span.set_attribute("user.already_exists", true);
                return Err(ServiceError::Conflict {
                    email: email.to_string(),
                });
            }
            Err(StoreError::NotFound) => {}
            Err(e) => {
                let err = ServiceError::unexpected("check existing user", e);
                span.record_error(&err);
                return Err(err);
            }
        }

        let user = match self.store.create(&ctx, NewUser::new(name, email)).await {
            Ok(user) => user,
            Err(StoreError::UniqueViolation { email }) => {
                span.set_attribute("user.already_exists", true);
                return Err(ServiceError::Conflict { email });
            }
            Err(e) => {
                let err = ServiceError::unexpected("create user", e);
                span.record_error(&err);
                return Err(err);
            }
        };

        span.set_attribute("user.created_id", user.id);
        tracing::info!(trace_id = %ctx.trace_id(), user_id = user.id, "User created");
        Ok(user)
    }

    /// Fetch a user. A missing user is `Ok(None)`, not an error.
    pub async fn get_user_by_id(
        &self,
        ctx: &SpanContext,
        id: u64,
    ) -> Result<Option<User>, ServiceError> {
        let (ctx, mut span) = self.telemetry.start_span(ctx, "UserService.GetUserByID");
        span.set_attribute("user.id", id);

        match self.store.get_by_id(&ctx, id).await {
            Ok(user) => Ok(Some(user)),
            Err(StoreError::NotFound) => {
                span.set_attribute("user.not_found", true);
                Ok(None)
            }
            Err(e) => {
                let err = ServiceError::unexpected("get user", e);
                span.record_error(&err);
                Err(err)
            }
        }
    }

    pub async fn list_users(
        &self,
        ctx: &SpanContext,
        page: Pagination,
    ) -> Result<Vec<User>, ServiceError> {
        let (ctx, mut span) = self.telemetry.start_span(ctx, "UserService.ListUsers");
        span.set_attribute("query.limit", page.limit());
        span.set_attribute("query.offset", page.offset());

        let users = self
            .store
            .list(&ctx, page.limit(), page.offset())
            .await
            .map_err(|e| {
                let err = ServiceError::unexpected("list users", e);
                span.record_error(&err);
                err
            })?;

        span.set_attribute("result.count", users.len());
        Ok(users)
    }

    /// Run the configured read-only readiness probe.
    pub async fn check_health(
        &self,
        ctx: &SpanContext,
        probe: HealthProbe,
    ) -> Result<(), ServiceError> {
        match probe {
            HealthProbe::None => Ok(()),
            HealthProbe::StoreList => self
                .list_users(ctx, Pagination::new(Some(1), Some(0)))
                .await
                .map(|_| ()),
        }
    }
}
