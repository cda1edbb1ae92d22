//! Permission grant endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::model::{Permission, PermissionGrant, PermissionPage, PrincipalType};
use crate::server::error::{ApiError, ApiErrorResponse};
use crate::server::ServerState;

/// Request payload for granting a principal access to a tool version.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GrantPermissionRequest {
    pub principal_id: String,
    pub principal_type: PrincipalType,
    pub granted_by: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/tools/{name}/{version}/permissions",
    tag = "permissions",
    params(
        ("name" = String, Path, description = "Tool name"),
        ("version" = String, Path, description = "Tool version"),
    ),
    request_body = GrantPermissionRequest,
    responses(
        (status = 201, description = "Permission granted", body = Permission),
        (status = 404, body = ApiErrorResponse),
        (status = 409, description = "Principal already holds this grant", body = ApiErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub(crate) async fn grant_permission(
    State(state): State<Arc<ServerState>>,
    Path((name, version)): Path<(String, String)>,
    Json(payload): Json<GrantPermissionRequest>,
) -> Result<(StatusCode, Json<Permission>), ApiError> {
    let permission = state
        .registry
        .grant_permission(
            &name,
            &version,
            PermissionGrant {
                principal_id: payload.principal_id,
                principal_type: payload.principal_type,
                granted_by: payload.granted_by,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(permission)))
}

#[utoipa::path(
    get,
    path = "/api/v1/tools/{name}/{version}/permissions",
    tag = "permissions",
    params(
        ("name" = String, Path, description = "Tool name"),
        ("version" = String, Path, description = "Tool version"),
    ),
    responses(
        (status = 200, description = "All grants, newest first", body = PermissionPage),
        (status = 404, body = ApiErrorResponse),
    )
)]
pub(crate) async fn list_permissions(
    State(state): State<Arc<ServerState>>,
    Path((name, version)): Path<(String, String)>,
) -> Result<Json<PermissionPage>, ApiError> {
    let page = state.registry.list_permissions(&name, &version).await?;
    Ok(Json(page))
}
