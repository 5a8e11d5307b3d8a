//! User and health endpoints.
//!
//! Each handler opens its own span under the route span, translates the HTTP
//! request into a domain call and maps the outcome to a status.

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::SpanContext;
use crate::persistence::User;
use crate::service::{Pagination, ServiceError};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<User>,
    pub count: usize,
    pub limit: u32,
    pub offset: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

/// `GET /users`. Unparseable query strings fall back to the default window.
pub async fn list_users(
    State(state): State<AppState>,
    ctx: SpanContext,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<UserList>, ApiError> {
    let (ctx, mut span) = state.telemetry.start_span(&ctx, "get-users-list");
    let query = query.map(|Query(q)| q).unwrap_or_default();
    let page = Pagination::from_query(query.limit.as_deref(), query.offset.as_deref());
    span.set_attribute("query.limit", page.limit());
    span.set_attribute("query.offset", page.offset());

    let users = state
        .deps
        .user_service
        .list_users(&ctx, page)
        .await
        .map_err(|e| {
            tracing::error!(trace_id = %ctx.trace_id(), error = %e, "Failed to list users");
            span.record_error(&e);
            ApiError::Internal("Failed to get users")
        })?;

    span.set_attribute("result.count", users.len());
    Ok(Json(UserList {
        count: users.len(),
        users,
        limit: page.limit(),
        offset: page.offset(),
    }))
}

/// `POST /users`.
pub async fn create_user(
    State(state): State<AppState>,
    ctx: SpanContext,
    body: Bytes,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let (ctx, mut span) = state.telemetry.start_span(&ctx, "create-user");

    let request: CreateUserRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(trace_id = %ctx.trace_id(), error = %e, "Rejected user payload");
        span.record_error(&e);
        ApiError::BadRequest("Invalid JSON")
    })?;

    let name = request.name.trim();
    let email = request.email.trim();
    if name.is_empty() || email.is_empty() {
        span.set_attribute("validation.failed", true);
        return Err(ApiError::BadRequest("Name and email are required"));
    }

    match state.deps.user_service.create_user(&ctx, name, email).await {
        Ok(user) => {
            span.set_attribute("user.id", user.id);
            Ok((StatusCode::CREATED, Json(user)))
        }
        Err(ServiceError::Conflict { email }) => {
            span.set_attribute("user.already_exists", true);
            Err(ApiError::Conflict(format!("User with email {email} already exists")))
        }
        Err(e) => {
            tracing::error!(trace_id = %ctx.trace_id(), error = %e, "Failed to create user");
            span.record_error(&e);
            Err(ApiError::Internal("Failed to create user"))
        }
    }
}

/// `GET /users/{id}`.
pub async fn get_user(
    State(state): State<AppState>,
    ctx: SpanContext,
    Path(raw_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let (ctx, mut span) = state.telemetry.start_span(&ctx, "get-user-by-id");

    let id: u64 = raw_id.parse().map_err(|_| {
        span.set_attribute("validation.failed", true);
        ApiError::BadRequest("Invalid user ID")
    })?;
    span.set_attribute("user.id", id);

    match state.deps.user_service.get_user_by_id(&ctx, id).await {
        Ok(Some(user)) => Ok(Json(user)),
        Ok(None) => Err(ApiError::NotFound("User not found")),
        Err(e) => {
            tracing::error!(trace_id = %ctx.trace_id(), user_id = id, error = %e, "Failed to get user");
            span.record_error(&e);
            Err(ApiError::Internal("Failed to get user"))
        }
    }
}

/// `GET /health`.
pub async fn health(
    State(state): State<AppState>,
    ctx: SpanContext,
) -> Result<Json<HealthStatus>, ApiError> {
    let (ctx, mut span) = state.telemetry.start_span(&ctx, "health-check");

    if let Err(e) = state.deps.user_service.check_health(&ctx, state.health_probe).await {
        tracing::error!(trace_id = %ctx.trace_id(), error = %e, "Health check failed");
        span.set_attribute("health.check.failed", true);
        span.record_error(&e);
        return Err(ApiError::Internal("Health check failed"));
    }

    Ok(Json(HealthStatus {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    }))
}
