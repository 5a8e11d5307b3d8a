//! End-to-end tests for the user endpoints over a real listener.

use reqwest::StatusCode;
use serde_json::{json, Value};

use traced_user_service::observability::{SpanContext, SpanStats};
use traced_user_service::Mode;

mod common;

#[tokio::test]
async fn test_create_duplicate_fetch_scenario() {
    let server = common::start_server(Mode::Traced, common::test_config()).await;
    let ann = json!({ "name": "Ann", "email": "ann@example.com" });

    let res = server.client.post(server.url("/users")).json(&ann).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    let id = created["id"].as_u64().expect("numeric id");

    let res = server.client.post(server.url("/users")).json(&ann).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(server.store.count(), 1);

    let res = server.client.get(server.url(&format!("/users/{id}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let fetched: Value = res.json().await.unwrap();
    assert_eq!(fetched["name"], "Ann");
    assert_eq!(fetched["email"], "ann@example.com");

    let res = server.client.get(server.url("/users/999999")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "error": "User not found" }));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_bad_requests() {
    let server = common::start_server(Mode::Traced, common::test_config()).await;

    let res = server
        .client
        .post(server.url("/users"))
        .header("content-type", "application/json")
        .body("{\"name\":")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await.unwrap()["error"], "Invalid JSON");

    let res = server
        .client
        .post(server.url("/users"))
        .json(&json!({ "name": "", "email": "x@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        res.json::<Value>().await.unwrap()["error"],
        "Name and email are required"
    );

    let res = server.client.get(server.url("/users/-4")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server.client.delete(server.url("/users")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);

    let failed_validation = server.exporter.spans_named("create-user");
    assert_eq!(failed_validation.len(), 2);
    assert_eq!(server.store.count(), 0);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_list_pagination_over_http() {
    let server = common::start_server(Mode::Plain, common::test_config()).await;
    for i in 0..12 {
        let user = json!({ "name": format!("user{i}"), "email": format!("user{i}@example.com") });
        let res = server.client.post(server.url("/users")).json(&user).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    for query in ["", "?limit=0", "?limit=500", "?limit=abc&offset=-1"] {
        let body: Value = server
            .client
            .get(server.url(&format!("/users{query}")))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["count"], 10, "query {query:?}");
        assert_eq!(body["limit"], 10);
        assert_eq!(body["offset"], 0);
        assert_eq!(body["users"][0]["name"], "user0");
    }

    let body: Value = server
        .client
        .get(server.url("/users?limit=5&offset=10"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 2);
    assert_eq!(body["users"][1]["name"], "user11");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_plain_mode_records_no_telemetry() {
    let server = common::start_server(Mode::Plain, common::test_config()).await;

    let res = server
        .client
        .post(server.url("/users"))
        .json(&json!({ "name": "Ann", "email": "ann@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert!(res.headers().contains_key("x-request-id"));

    let res = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let health: Value = res.json().await.unwrap();
    assert_eq!(health["status"], "healthy");

    assert!(server.exporter.spans().is_empty());
    assert_eq!(server.telemetry.span_stats(), SpanStats::default());

    let exporter = server.exporter.clone();
    server.stop().await.unwrap();
    assert_eq!(exporter.shutdown_calls(), 0);
}

#[tokio::test]
async fn test_traced_request_continues_incoming_trace() {
    let server = common::start_server(Mode::Traced, common::test_config()).await;
    let parent = SpanContext::new_root();

    let res = server
        .client
        .get(server.url("/health"))
        .header("traceparent", parent.to_traceparent())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let route = &server.exporter.spans_named("/health")[0];
    assert_eq!(route.context.trace_id(), parent.trace_id());
    assert_eq!(route.parent_span_id, Some(parent.span_id()));

    let spans = server.exporter.spans();
    assert!(spans.iter().all(|s| s.context.trace_id() == parent.trace_id()));
    assert_eq!(
        spans.iter().map(|s| &*s.name).collect::<Vec<&str>>(),
        ["UserService.ListUsers", "health-check", "/health"]
    );

    let stats = server.telemetry.span_stats();
    assert_eq!(stats.opened, stats.closed);

    let exporter = server.exporter.clone();
    server.stop().await.unwrap();
    assert!(exporter.is_shut_down());
}
