mod common;

use axum_test::TestServer;
use signal_api::gateway::events::{ClientEvent, JoinRequest};
use signal_api::gateway::directory::RoomKind;
use signal_api::gateway::registry::ConnectionId;

#[tokio::test]
async fn health_reports_connections_and_rooms() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server.get("/health").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body, serde_json::json!({ "status": "ok", "connections": 0, "rooms": 0 }));

    let id = ConnectionId::from("conn_test");
    state.hub.connect(id.clone());
    state.hub.handle(
        &id,
        ClientEvent::Join(JoinRequest {
            kind: RoomKind::Room,
            room_id: "R1".to_string(),
            name: "Ada".to_string(),
            user_id: None,
        }),
    );

    let body: serde_json::Value = server.get("/health").await.json();
    assert_eq!(body["connections"], 1);
    assert_eq!(body["rooms"], 1);
}

#[tokio::test]
async fn openapi_document_lists_routes() {
    use utoipa::OpenApi;

    let doc = signal_api::routes::ApiDoc::openapi();
    let json = serde_json::to_value(&doc).unwrap();
    assert!(json["paths"]["/health"].is_object());
    assert!(json["paths"]["/api/v1/projects/{project_id}/events"]["post"].is_object());
}
