//! End-to-end widget and isolation scenarios against the real router.

use axum::http::StatusCode;
use devtools::repositories::{BugReportRepository, TelemetryRepository};
use serde_json::json;

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{empty_request, json_request, read_json, seed_project, spawn_app, test_config};

const P1_PIN: &str = "4821";
const P2_PIN: &str = "9173";

fn telemetry_event(project_id: &str) -> serde_json::Value {
    json!({
        "projectId": project_id,
        "kind": "error",
        "name": "TypeError: x is undefined",
        "payload": { "line": 12 },
        "pageUrl": "https://customer.example/checkout",
        "occurredAt": "2026-10-01T12:00:00Z"
    })
}

#[tokio::test]
async fn unauthenticated_dashboard_requests_never_reach_handlers() {
    let app = spawn_app(test_config()).await.unwrap();
    seed_project(app.db(), "p1", None).await.unwrap();

    let api = app.send(empty_request("GET", "/api/projects", &[])).await;
    assert_eq!(api.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        api.headers().get("content-type").unwrap(),
        "application/problem+json"
    );

    let page = app.send(empty_request("GET", "/", &[])).await;
    assert_eq!(page.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(page.headers().get("location").unwrap(), "/unlock");

    let create = app
        .send(json_request(
            "POST",
            "/api/projects",
            &json!({ "id": "sneaky", "name": "Sneaky" }),
            &[],
        ))
        .await;
    assert_eq!(create.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn widget_pin_for_payload_project_writes_bug_report() {
    let app = spawn_app(test_config()).await.unwrap();
    seed_project(app.db(), "p1", Some(P1_PIN)).await.unwrap();

    let response = app
        .send(json_request(
            "POST",
            "/api/widget/bugs",
            &json!({ "projectId": "p1", "title": "Checkout button does nothing" }),
            &[("x-devtools-pin", P1_PIN), ("origin", "https://customer.example")],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(response.headers().contains_key("access-control-allow-origin"));
    let body = read_json(response).await;
    assert_eq!(body["status"], "open");

    let stored = BugReportRepository::new(app.db())
        .list_for_project("p1", 10)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].source, "widget");
}

#[tokio::test]
async fn pin_for_one_project_cannot_write_into_another() {
    let app = spawn_app(test_config()).await.unwrap();
    seed_project(app.db(), "p1", Some(P1_PIN)).await.unwrap();
    seed_project(app.db(), "p2", Some(P2_PIN)).await.unwrap();

    let response = app
        .send(json_request(
            "POST",
            "/api/widget/bugs",
            &json!({ "projectId": "p2", "title": "Injected report" }),
            &[("x-devtools-pin", P1_PIN)],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["message"], "Invalid PIN");

    let count = BugReportRepository::new(app.db())
        .count_for_project("p2")
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn project_without_pin_rejects_widget_traffic_with_403() {
    let app = spawn_app(test_config()).await.unwrap();
    seed_project(app.db(), "p3", None).await.unwrap();

    let response = app
        .send(json_request(
            "POST",
            "/api/widget/bugs",
            &json!({ "projectId": "p3", "title": "Anything" }),
            &[("x-devtools-pin", "0000")],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_json(response).await["message"], "PIN not configured");
}

#[tokio::test]
async fn cross_project_batch_is_rejected_whole() {
    let app = spawn_app(test_config()).await.unwrap();
    seed_project(app.db(), "p1", Some(P1_PIN)).await.unwrap();
    seed_project(app.db(), "p2", Some(P2_PIN)).await.unwrap();

    let response = app
        .send(json_request(
            "POST",
            "/api/telemetry",
            &json!({
                "events": [telemetry_event("p1"), telemetry_event("p1"), telemetry_event("p2")]
            }),
            &[("x-devtools-pin", P1_PIN)],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "CROSS_PROJECT_BATCH");
    assert_eq!(
        TelemetryRepository::new(app.db()).count_all().await.unwrap(),
        0
    );
}

#[tokio::test]
async fn widget_preflight_is_answered_at_the_edge() {
    let app = spawn_app(test_config()).await.unwrap();

    for path in ["/api/telemetry", "/api/widget/bugs"] {
        let response = app
            .send(empty_request(
                "OPTIONS",
                path,
                &[
                    ("origin", "https://customer.example"),
                    ("access-control-request-method", "POST"),
                ],
            ))
            .await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let headers = response.headers();
        assert_eq!(headers.get("access-control-allow-origin").unwrap(), "*");
        assert!(
            headers
                .get("access-control-allow-headers")
                .unwrap()
                .to_str()
                .unwrap()
                .contains("X-DevTools-Pin")
        );
        assert_eq!(headers.get("access-control-max-age").unwrap(), "86400");
        assert_eq!(read_json(response).await, serde_json::Value::Null);
    }
}

#[tokio::test]
async fn preflight_echoes_listed_origin() {
    let mut config = test_config();
    config.widget_allowed_origins = vec![
        "https://a.example".to_string(),
        "https://b.example".to_string(),
    ];
    let app = spawn_app(config).await.unwrap();

    let listed = app
        .send(empty_request(
            "OPTIONS",
            "/api/telemetry",
            &[("origin", "https://b.example")],
        ))
        .await;
    assert_eq!(
        listed.headers().get("access-control-allow-origin").unwrap(),
        "https://b.example"
    );
    assert_eq!(
        listed.headers().get("access-control-allow-credentials").unwrap(),
        "true"
    );

    let unlisted = app
        .send(empty_request(
            "OPTIONS",
            "/api/telemetry",
            &[("origin", "https://evil.example")],
        ))
        .await;
    assert_eq!(
        unlisted.headers().get("access-control-allow-origin").unwrap(),
        "https://a.example"
    );
}

#[tokio::test]
async fn telemetry_batch_is_stored_with_rate_limit_headers() {
    let app = spawn_app(test_config()).await.unwrap();
    seed_project(app.db(), "p1", Some(P1_PIN)).await.unwrap();

    let response = app
        .send(json_request(
            "POST",
            "/api/telemetry",
            &json!({ "events": [telemetry_event("p1"), telemetry_event("p1")] }),
            &[("x-devtools-pin", P1_PIN), ("x-forwarded-for", "203.0.113.9")],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(response.headers().get("x-ratelimit-limit").unwrap(), "100");
    assert_eq!(response.headers().get("x-ratelimit-remaining").unwrap(), "99");
    assert!(response.headers().contains_key("x-ratelimit-reset"));
    assert_eq!(read_json(response).await["accepted"], 2);

    assert_eq!(
        TelemetryRepository::new(app.db())
            .count_for_project("p1")
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn telemetry_over_the_limit_gets_429() {
    let mut config = test_config();
    config.telemetry_rate_limit = 2;
    let app = spawn_app(config).await.unwrap();
    seed_project(app.db(), "p1", Some(P1_PIN)).await.unwrap();

    let batch = json!({ "events": [telemetry_event("p1")] });
    let headers = [("x-devtools-pin", P1_PIN), ("x-forwarded-for", "198.51.100.4")];

    for _ in 0..2 {
        let ok = app
            .send(json_request("POST", "/api/telemetry", &batch, &headers))
            .await;
        assert_eq!(ok.status(), StatusCode::ACCEPTED);
    }

    let limited = app
        .send(json_request("POST", "/api/telemetry", &batch, &headers))
        .await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers().contains_key("retry-after"));
    assert_eq!(limited.headers().get("x-ratelimit-remaining").unwrap(), "0");
    assert_eq!(read_json(limited).await["code"], "RATE_LIMITED");

    // Another client keeps its own budget
    let other = app
        .send(json_request(
            "POST",
            "/api/telemetry",
            &batch,
            &[("x-devtools-pin", P1_PIN), ("x-forwarded-for", "198.51.100.5")],
        ))
        .await;
    assert_eq!(other.status(), StatusCode::ACCEPTED);

    assert_eq!(
        TelemetryRepository::new(app.db())
            .count_for_project("p1")
            .await
            .unwrap(),
        3
    );
}

#[tokio::test]
async fn malformed_telemetry_is_rejected_before_any_write() {
    let app = spawn_app(test_config()).await.unwrap();
    seed_project(app.db(), "p1", Some(P1_PIN)).await.unwrap();
    let pin = [("x-devtools-pin", P1_PIN)];

    let too_many: Vec<_> = (0..101).map(|_| telemetry_event("p1")).collect();
    let cases = [
        json!({ "events": [] }),
        json!({ "events": too_many }),
        json!({ "events": [{ "projectId": "p1", "kind": "bogus", "name": "x" }] }),
        json!({ "events": [telemetry_event("p1")], "extra": true }),
    ];

    for body in cases {
        let response = app
            .send(json_request("POST", "/api/telemetry", &body, &pin))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
    }

    assert_eq!(
        TelemetryRepository::new(app.db()).count_all().await.unwrap(),
        0
    );
}
