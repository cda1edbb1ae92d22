//! Tool catalog endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::model::{NewTool, Tool, ToolPage, ToolPatch};
use crate::server::error::{ApiError, ApiErrorResponse};
use crate::server::ServerState;

pub(crate) const DEFAULT_PAGE_LIMIT: u32 = 100;

/// Request payload for registering a tool version.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterToolRequest {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    /// OpenAPI-3.0-shaped document describing how to invoke the tool.
    pub configuration_schema: Value,
    pub docker_image_uri: Option<String>,
}

/// Request payload for updating a tool's mutable fields.
///
/// Unknown keys are rejected so immutable fields (name, version, schema)
/// cannot be smuggled through a partial update.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateToolRequest {
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub docker_image_uri: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListToolsQuery {
    /// Page size, between 1 and the configured maximum. Defaults to 100.
    pub limit: Option<u32>,
    /// Rows to skip. Defaults to 0.
    pub offset: Option<u32>,
    /// Only return tools whose active flag is set.
    pub active_only: Option<bool>,
}

pub(crate) fn checked_limit(requested: Option<u32>, max: u32) -> Result<u32, ApiError> {
    let limit = requested.unwrap_or_else(|| DEFAULT_PAGE_LIMIT.min(max));
    if limit < 1 || limit > max {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {max}"
        )));
    }
    Ok(limit)
}

#[utoipa::path(
    post,
    path = "/api/v1/tools",
    tag = "tools",
    request_body = RegisterToolRequest,
    responses(
        (status = 201, description = "Tool registered", body = Tool),
        (status = 400, description = "Invalid configuration schema", body = ApiErrorResponse),
        (status = 409, description = "Duplicate (name, version)", body = ApiErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub(crate) async fn register_tool(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<RegisterToolRequest>,
) -> Result<(StatusCode, Json<Tool>), ApiError> {
    let tool = state
        .registry
        .register_tool(NewTool {
            name: payload.name,
            version: payload.version,
            description: payload.description,
            configuration_schema: payload.configuration_schema,
            docker_image_uri: payload.docker_image_uri,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(tool)))
}

#[utoipa::path(
    get,
    path = "/api/v1/tools",
    tag = "tools",
    params(ListToolsQuery),
    responses(
        (status = 200, description = "One page of tools", body = ToolPage),
        (status = 400, description = "Bad pagination bounds", body = ApiErrorResponse),
    )
)]
pub(crate) async fn list_tools(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ListToolsQuery>,
) -> Result<Json<ToolPage>, ApiError> {
    let limit = checked_limit(query.limit, state.max_page_size)?;
    let offset = query.offset.unwrap_or(0);
    let page = state
        .registry
        .list_tools(limit, offset, query.active_only.unwrap_or(false))
        .await?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/api/v1/tools/{name}",
    tag = "tools",
    params(("name" = String, Path, description = "Tool name")),
    responses(
        (status = 200, description = "All versions, newest first", body = [Tool]),
        (status = 404, body = ApiErrorResponse),
    )
)]
pub(crate) async fn get_tool_versions(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Tool>>, ApiError> {
    let versions = state.registry.get_tool_versions(&name).await?;
    Ok(Json(versions))
}

#[utoipa::path(
    get,
    path = "/api/v1/tools/{name}/{version}",
    tag = "tools",
    params(
        ("name" = String, Path, description = "Tool name"),
        ("version" = String, Path, description = "Tool version"),
    ),
    responses(
        (status = 200, body = Tool),
        (status = 404, body = ApiErrorResponse),
    )
)]
pub(crate) async fn get_tool(
    State(state): State<Arc<ServerState>>,
    Path((name, version)): Path<(String, String)>,
) -> Result<Json<Tool>, ApiError> {
    let tool = state.registry.get_tool(&name, &version).await?;
    Ok(Json(tool))
}

#[utoipa::path(
    put,
    path = "/api/v1/tools/{name}/{version}",
    tag = "tools",
    params(
        ("name" = String, Path, description = "Tool name"),
        ("version" = String, Path, description = "Tool version"),
    ),
    request_body = UpdateToolRequest,
    responses(
        (status = 200, description = "Updated tool", body = Tool),
        (status = 404, body = ApiErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub(crate) async fn update_tool(
    State(state): State<Arc<ServerState>>,
    Path((name, version)): Path<(String, String)>,
    Json(payload): Json<UpdateToolRequest>,
) -> Result<Json<Tool>, ApiError> {
    let tool = state
        .registry
        .update_tool(
            &name,
            &version,
            ToolPatch {
                description: payload.description,
                is_active: payload.is_active,
                docker_image_uri: payload.docker_image_uri,
            },
        )
        .await?;
    Ok(Json(tool))
}

#[utoipa::path(
    delete,
    path = "/api/v1/tools/{name}/{version}",
    tag = "tools",
    params(
        ("name" = String, Path, description = "Tool name"),
        ("version" = String, Path, description = "Tool version"),
    ),
    responses(
        (status = 204, description = "Tool and its permissions deleted"),
        (status = 404, body = ApiErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub(crate) async fn delete_tool(
    State(state): State<Arc<ServerState>>,
    Path((name, version)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.registry.delete_tool(&name, &version).await?;
    Ok(StatusCode::NO_CONTENT)
}
