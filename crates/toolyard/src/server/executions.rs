//! Invocation and history endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use utoipa::IntoParams;

use crate::model::{Execution, ExecutionPage};
use crate::server::error::{ApiError, ApiErrorResponse};
use crate::server::tools::checked_limit;
use crate::server::ServerState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ExecuteToolQuery {
    /// Agent performing the invocation.
    pub agent_id: String,
    /// Session to attribute the invocation to, for stateful tools.
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[utoipa::path(
    post,
    path = "/api/v1/tools/{tool_id}/execute",
    tag = "executions",
    params(
        ("tool_id" = String, Path, description = "Tool identifier"),
        ExecuteToolQuery,
    ),
    request_body = Value,
    responses(
        (status = 201, description = "Recorded execution", body = Execution),
        (status = 404, body = ApiErrorResponse),
        (status = 409, description = "Tool is inactive", body = ApiErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub(crate) async fn execute_tool(
    State(state): State<Arc<ServerState>>,
    Path(tool_id): Path<String>,
    Query(query): Query<ExecuteToolQuery>,
    Json(input): Json<Value>,
) -> Result<(StatusCode, Json<Execution>), ApiError> {
    let execution = state
        .registry
        .execute_tool(&tool_id, &query.agent_id, query.session_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(execution)))
}

#[utoipa::path(
    get,
    path = "/api/v1/tools/{tool_id}/history",
    tag = "executions",
    params(
        ("tool_id" = String, Path, description = "Tool identifier"),
        HistoryQuery,
    ),
    responses(
        (status = 200, description = "One page of executions, newest first", body = ExecutionPage),
        (status = 400, description = "Bad pagination bounds", body = ApiErrorResponse),
        (status = 404, body = ApiErrorResponse),
    )
)]
pub(crate) async fn execution_history(
    State(state): State<Arc<ServerState>>,
    Path(tool_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ExecutionPage>, ApiError> {
    let limit = checked_limit(query.limit, state.max_page_size)?;
    let offset = query.offset.unwrap_or(0);
    let page = state
        .registry
        .execution_history(&tool_id, limit, offset)
        .await?;
    Ok(Json(page))
}
