mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;

fn server_with_token(token: Option<&str>) -> (TestServer, signal_api::AppState) {
    let mut config = common::test_config();
    config.publish_token = token.map(str::to_string);
    let (app, state) = common::test_app_with(config);
    (TestServer::new(app).unwrap(), state)
}

#[tokio::test]
async fn publish_without_configured_token_is_accepted() {
    let (server, state) = server_with_token(None);
    let mut rx = state.broadcast.subscribe();

    let resp = server
        .post("/api/v1/projects/prj_1/events")
        .json(&json!({ "event": "taskUpdated", "data": { "id": "tsk_1" } }))
        .await;

    resp.assert_status(StatusCode::ACCEPTED);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["accepted"], true);

    let payload = rx.try_recv().expect("event broadcast");
    assert_eq!(payload.project_id, "prj_1");
    assert_eq!(payload.event_name, "taskUpdated");
    assert_eq!(payload.data["data"]["id"], "tsk_1");
    assert!(payload.origin.is_none());
}

#[tokio::test]
async fn publish_requires_matching_token() {
    let (server, _state) = server_with_token(Some("s3cret"));

    let resp = server
        .post("/api/v1/projects/prj_1/events")
        .json(&json!({ "event": "taskCreated" }))
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);

    let resp = server
        .post("/api/v1/projects/prj_1/events")
        .add_header(AUTHORIZATION, "Bearer wrong")
        .json(&json!({ "event": "taskCreated" }))
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = server
        .post("/api/v1/projects/prj_1/events")
        .add_header(AUTHORIZATION, "Bearer s3cret")
        .json(&json!({ "event": "taskCreated" }))
        .await;
    resp.assert_status(StatusCode::ACCEPTED);
}

#[tokio::test]
async fn publish_validates_event_name() {
    let (server, state) = server_with_token(None);
    let mut rx = state.broadcast.subscribe();

    let resp = server
        .post("/api/v1/projects/prj_1/events")
        .json(&json!({ "event": "   " }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"][0]["field"], "event");

    let resp = server
        .post("/api/v1/projects/prj_1/events")
        .json(&json!({ "event": "x".repeat(65) }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    assert!(rx.try_recv().is_err());
}
