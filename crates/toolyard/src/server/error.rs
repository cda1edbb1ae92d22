use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::RegistryError;

/// Standardised API error response body.
///
/// Every error returned by the HTTP layer serialises as:
/// ```json
/// { "ok": false, "error": { "code": "<code>", "message": "<message>" } }
/// ```
/// Schema-validation failures additionally carry the full violation list
/// under `error.details`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ApiErrorResponse,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiErrorResponse {
    pub ok: bool,
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiErrorResponse {
                ok: false,
                error: ApiErrorBody {
                    code: code.into(),
                    message: message.into(),
                    details: None,
                },
            },
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.body.error.details = Some(details);
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::ToolNotFound { .. }
            | RegistryError::ToolIdNotFound { .. }
            | RegistryError::SessionNotFound { .. } => Self::not_found(err.to_string()),
            RegistryError::ToolAlreadyExists { .. }
            | RegistryError::PermissionAlreadyExists { .. } => Self::conflict(err.to_string()),
            RegistryError::InvalidSchema(details) => Self::new(
                StatusCode::BAD_REQUEST,
                "invalid_schema",
                "configuration schema failed validation",
            )
            .with_details(details),
            RegistryError::ToolInactive { .. } => {
                Self::new(StatusCode::CONFLICT, "tool_inactive", err.to_string())
            }
            RegistryError::InvalidInput(msg) => Self::bad_request(msg),
            RegistryError::Store(msg) => Self::internal(msg),
        }
    }
}
