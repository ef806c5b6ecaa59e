//! Server-side publishing of project events to subscribed connections.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::middleware::PublishCaller;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::gateway::fanout::BroadcastPayload;
use crate::AppState;

const MAX_EVENT_NAME_CHARS: usize = 64;

pub fn router() -> Router<AppState> {
    Router::new().route("/projects/{project_id}/events", post(publish_event))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishEventRequest {
    /// Event name delivered to clients, e.g. `taskCreated`.
    pub event: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublishEventResponse {
    pub accepted: bool,
}

// ---------------------------------------------------------------------------
// POST /api/v1/projects/:project_id/events
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/events",
    tag = "Projects",
    security(("bearer" = [])),
    params(
        ("project_id" = String, Path, description = "Project ID"),
    ),
    request_body = PublishEventRequest,
    responses(
        (status = 202, description = "Event queued for subscribers", body = PublishEventResponse),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn publish_event(
    State(state): State<AppState>,
    caller: PublishCaller,
    Path(project_id): Path<String>,
    Json(body): Json<PublishEventRequest>,
) -> Result<(StatusCode, Json<PublishEventResponse>), ApiError> {
    let event = body.event.trim().to_string();
    let mut errors = Vec::new();
    if event.is_empty() {
        errors.push(FieldError {
            field: "event".to_string(),
            message: "Event name is required".to_string(),
        });
    } else if event.chars().count() > MAX_EVENT_NAME_CHARS {
        errors.push(FieldError {
            field: "event".to_string(),
            message: format!("Event name must be {MAX_EVENT_NAME_CHARS} characters or fewer"),
        });
    }
    if project_id.trim().is_empty() {
        errors.push(FieldError {
            field: "project_id".to_string(),
            message: "Project ID is required".to_string(),
        });
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let receivers = state.broadcast.publish(BroadcastPayload {
        project_id: project_id.clone(),
        event_name: event.clone(),
        data: serde_json::json!({
            "projectId": project_id,
            "data": body.data,
        }),
        origin: None,
    });

    tracing::debug!(
        project_id = %project_id,
        event = %event,
        receivers,
        authenticated = caller.authenticated,
        "project event published"
    );

    Ok((StatusCode::ACCEPTED, Json(PublishEventResponse { accepted: true })))
}
