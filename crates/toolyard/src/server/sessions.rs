//! Session lifecycle endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::model::Session;
use crate::server::error::{ApiError, ApiErrorResponse};
use crate::server::ServerState;

/// Request payload for opening a session against a tool.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OpenSessionRequest {
    pub tool_id: String,
    pub agent_id: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    tag = "sessions",
    request_body = OpenSessionRequest,
    responses(
        (status = 201, description = "Session opened", body = Session),
        (status = 404, body = ApiErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub(crate) async fn open_session(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let session = state
        .registry
        .open_session(&payload.tool_id, &payload.agent_id)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[utoipa::path(
    post,
    path = "/api/v1/sessions/{session_id}/close",
    tag = "sessions",
    params(("session_id" = String, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Closed session", body = Session),
        (status = 404, body = ApiErrorResponse),
    )
)]
pub(crate) async fn close_session(
    State(state): State<Arc<ServerState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let session = state.registry.close_session(&session_id).await?;
    Ok(Json(session))
}
