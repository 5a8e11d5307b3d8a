//! HTTP server setup.
//!
//! # Responsibilities
//! - Assemble the application state handed to every handler
//! - Build the Axum router, every route wrapped by the instrumentation gateway
//! - Wire up middleware (request ids, tracing, timeouts, body limit)

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{uri::InvalidUri, Request, Uri},
    routing::get,
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{AppConfig, HealthProbe, WorkConfig};
use crate::http::client::SubrequestClient;
use crate::http::handlers;
use crate::http::request::{propagate_request_id_layer, request_id_of, set_request_id_layer};
use crate::http::work::{self, WorkSettings};
use crate::observability::{InstrumentationGateway, Telemetry};
use crate::service::UserService;

/// Read-only services handed to the lifecycle controller.
#[derive(Clone)]
pub struct Dependencies {
    pub user_service: Arc<UserService>,
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub deps: Dependencies,
    pub telemetry: Telemetry,
    pub health_probe: HealthProbe,
    pub work: Arc<WorkSettings>,
    pub client: SubrequestClient,
}

impl AppState {
    /// `local_addr` is where this server accepts; `/multi` calls back into
    /// it unless `work.single_url` names another target.
    pub fn new(
        deps: Dependencies,
        telemetry: Telemetry,
        config: &AppConfig,
        local_addr: SocketAddr,
    ) -> Result<Self, InvalidUri> {
        let target = subrequest_target(&config.work, local_addr)?;
        let client = SubrequestClient::new(
            target,
            Duration::from_secs(config.timeouts.subrequest_secs),
        );

        Ok(Self {
            deps,
            telemetry,
            health_probe: config.health.probe,
            work: Arc::new(WorkSettings::from_config(&config.work)),
            client,
        })
    }
}

fn subrequest_target(work: &WorkConfig, local_addr: SocketAddr) -> Result<Uri, InvalidUri> {
    if let Some(url) = &work.single_url {
        return url.parse();
    }

    let mut addr = local_addr;
    if addr.ip().is_unspecified() {
        let loopback = match addr.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
        };
        addr.set_ip(loopback);
    }
    format!("http://{addr}/single").parse()
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(
    state: AppState,
    gateway: &InstrumentationGateway,
    config: &AppConfig,
) -> Router {
    Router::new()
        .route(
            "/users",
            gateway.wrap("/users", get(handlers::list_users).post(handlers::create_user)),
        )
        .route("/users/{id}", gateway.wrap("/users/{id}", get(handlers::get_user)))
        .route("/health", gateway.wrap("/health", get(handlers::health)))
        .route("/single", gateway.wrap("/single", get(work::single)))
        .route("/multi", gateway.wrap("/multi", get(work::multi)))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.listener.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id_of(request),
            )
        }))
        .layer(set_request_id_layer())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use crate::http::request::X_REQUEST_ID;
    use crate::observability::{InMemoryExporter, SpanStats};
    use crate::observability::Value as AttrValue;
    use crate::persistence::testing::BrokenStore;
    use crate::persistence::{MemoryStore, StoreError, UserStore};
    use axum::{body::to_bytes, http::StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct Harness {
        router: Router,
        store: MemoryStore,
        telemetry: Telemetry,
        exporter: InMemoryExporter,
    }

    fn harness(mode: Mode, config: AppConfig) -> Harness {
        let store = MemoryStore::new();
        let (router, telemetry, exporter) = router_over(Arc::new(store.clone()), mode, config);
        Harness {
            router,
            store,
            telemetry,
            exporter,
        }
    }

    fn router_over(
        store: Arc<dyn UserStore>,
        mode: Mode,
        config: AppConfig,
    ) -> (Router, Telemetry, InMemoryExporter) {
        let exporter = InMemoryExporter::new();
        let telemetry = match mode {
            Mode::Plain => Telemetry::disabled(),
            Mode::Traced => Telemetry::new("test", Arc::new(exporter.clone())),
        };
        let deps = Dependencies {
            user_service: Arc::new(UserService::new(store, telemetry.clone())),
        };
        let state = AppState::new(deps, telemetry.clone(), &config, "127.0.0.1:1".parse().unwrap())
            .unwrap();
        let gateway = InstrumentationGateway::for_mode(mode, &telemetry);
        (build_router(state, &gateway, &config), telemetry, exporter)
    }

    fn unavailable_store() -> Arc<dyn UserStore> {
        Arc::new(BrokenStore(StoreError::Unavailable("connection reset".into())))
    }

    async fn send(router: &Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[test]
    fn test_subrequest_target_defaults_to_loopback() {
        let work = WorkConfig::default();
        let target = subrequest_target(&work, "0.0.0.0:8080".parse().unwrap()).unwrap();
        assert_eq!(target, "http://127.0.0.1:8080/single");

        let target = subrequest_target(&work, "[::]:8080".parse().unwrap()).unwrap();
        assert_eq!(target, "http://[::1]:8080/single");

        let work = WorkConfig {
            single_url: Some("http://worker:9000/single".into()),
            ..WorkConfig::default()
        };
        let target = subrequest_target(&work, "0.0.0.0:8080".parse().unwrap()).unwrap();
        assert_eq!(target, "http://worker:9000/single");
    }

    #[tokio::test]
    async fn test_create_user_validation() {
        let h = harness(Mode::Plain, AppConfig::default());

        let (status, body) = send(&h.router, "POST", "/users", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid JSON" }));

        let (status, body) = send(&h.router, "POST", "/users", r#"{"name":"Ann"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Name and email are required" }));

        let (status, _) =
            send(&h.router, "POST", "/users", r#"{"name":"  ","email":"a@b.c"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(h.store.count(), 0);
    }

    #[tokio::test]
    async fn test_create_then_conflict_then_fetch() {
        let h = harness(Mode::Plain, AppConfig::default());
        let payload = r#"{"name":"Ann","email":"ann@example.com"}"#;

        let (status, created) = send(&h.router, "POST", "/users", payload).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_u64().unwrap();
        assert!(created.get("deleted_at").is_none());

        let (status, body) = send(&h.router, "POST", "/users", payload).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("ann@example.com"));
        assert_eq!(h.store.count(), 1);

        let (status, fetched) = send(&h.router, "GET", &format!("/users/{id}"), "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["email"], "ann@example.com");

        let (status, body) = send(&h.router, "GET", "/users/999999", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "User not found" }));

        let (status, body) = send(&h.router, "GET", "/users/abc", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid user ID" }));
    }

    #[tokio::test]
    async fn test_list_users_clamps_window() {
        let h = harness(Mode::Plain, AppConfig::default());
        for i in 0..3 {
            let payload = format!(r#"{{"name":"u{i}","email":"u{i}@example.com"}}"#);
            send(&h.router, "POST", "/users", &payload).await;
        }

        let (status, body) = send(&h.router, "GET", "/users?limit=500&offset=-1", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["limit"], 10);
        assert_eq!(body["offset"], 0);
        assert_eq!(body["count"], 3);

        let (_, body) = send(&h.router, "GET", "/users?limit=2&offset=1", "").await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["users"][0]["name"], "u1");

        let (status, body) = send(&h.router, "GET", "/users?limit=1&limit=2", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["limit"], 10);
    }

    #[tokio::test]
    async fn test_health_reports_version() {
        let h = harness(Mode::Plain, AppConfig::default());
        let (status, body) = send(&h.router, "GET", "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "status": "healthy", "version": env!("CARGO_PKG_VERSION") })
        );
    }

    #[tokio::test]
    async fn test_unsupported_method_and_request_id() {
        let h = harness(Mode::Plain, AppConfig::default());
        let request = Request::builder()
            .method("DELETE")
            .uri("/users")
            .body(Body::empty())
            .unwrap();
        let response = h.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn test_traced_requests_nest_spans_under_route() {
        let h = harness(Mode::Traced, AppConfig::default());
        let payload = r#"{"name":"Ann","email":"ann@example.com"}"#;
        let (status, _) = send(&h.router, "POST", "/users", payload).await;
        assert_eq!(status, StatusCode::CREATED);

        let route = &h.exporter.spans_named("/users")[0];
        let handler = &h.exporter.spans_named("create-user")[0];
        let service = &h.exporter.spans_named("UserService.CreateUser")[0];
        assert_eq!(handler.parent_span_id, Some(route.context.span_id()));
        assert_eq!(service.parent_span_id, Some(handler.context.span_id()));
        assert_eq!(service.context.trace_id(), route.context.trace_id());

        let stats = h.telemetry.span_stats();
        assert_eq!(stats, SpanStats { opened: 3, closed: 3 });
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let mut config = AppConfig::default();
        config.listener.max_body_bytes = 16;
        let h = harness(Mode::Plain, config);

        let payload = r#"{"name":"Ann","email":"ann@example.com"}"#;
        let (status, _) = send(&h.router, "POST", "/users", payload).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(h.store.count(), 0);
    }

    #[tokio::test]
    async fn test_store_failures_map_to_fixed_messages() {
        let (router, _, _) = router_over(unavailable_store(), Mode::Plain, AppConfig::default());
        let payload = r#"{"name":"Ann","email":"ann@example.com"}"#;

        let cases = [
            ("GET", "/users", "", "Failed to get users"),
            ("POST", "/users", payload, "Failed to create user"),
            ("GET", "/users/1", "", "Failed to get user"),
            ("GET", "/health", "", "Health check failed"),
        ];
        for (method, uri, body, message) in cases {
            let (status, response) = send(&router, method, uri, body).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{method} {uri}");
            assert_eq!(response, json!({ "error": message }), "{method} {uri}");
            assert!(!response.to_string().contains("connection reset"));
        }
    }

    #[tokio::test]
    async fn test_failed_health_check_marks_span() {
        let (router, telemetry, exporter) =
            router_over(unavailable_store(), Mode::Traced, AppConfig::default());
        let (status, _) = send(&router, "GET", "/health", "").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let check = &exporter.spans_named("health-check")[0];
        assert_eq!(check.attribute("health.check.failed"), Some(&AttrValue::from(true)));
        assert!(check.error.as_deref().unwrap().contains("connection reset"));

        let route = &exporter.spans_named("/health")[0];
        assert_eq!(check.parent_span_id, Some(route.context.span_id()));
        assert!(route.error.is_some());

        let stats = telemetry.span_stats();
        assert_eq!(stats.opened, stats.closed);
    }

    #[tokio::test]
    async fn test_list_span_records_window_and_count() {
        let h = harness(Mode::Traced, AppConfig::default());
        for i in 0..3 {
            let payload = format!(r#"{{"name":"u{i}","email":"u{i}@example.com"}}"#);
            send(&h.router, "POST", "/users", &payload).await;
        }

        let (status, _) = send(&h.router, "GET", "/users?limit=2&offset=2", "").await;
        assert_eq!(status, StatusCode::OK);

        let list = &h.exporter.spans_named("get-users-list")[0];
        assert_eq!(list.attribute("query.limit"), Some(&AttrValue::from(2u32)));
        assert_eq!(list.attribute("query.offset"), Some(&AttrValue::from(2u64)));
        assert_eq!(list.attribute("result.count"), Some(&AttrValue::from(1usize)));
    }
}
