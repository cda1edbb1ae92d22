use utoipa::OpenApi;

use crate::model::{
    Execution, ExecutionPage, ExecutionStatus, Permission, PermissionLevel, PermissionPage,
    PrincipalType, Session, Tool, ToolPage,
};
use crate::server::error::{ApiErrorBody, ApiErrorResponse};
use crate::server::permissions::GrantPermissionRequest;
use crate::server::sessions::OpenSessionRequest;
use crate::server::tools::{RegisterToolRequest, UpdateToolRequest};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Toolyard API",
        version = "0.1.0",
        description = "Versioned tool catalog with permissions and execution tracking"
    ),
    paths(
        crate::server::tools::register_tool,
        crate::server::tools::list_tools,
        crate::server::tools::get_tool_versions,
        crate::server::tools::get_tool,
        crate::server::tools::update_tool,
        crate::server::tools::delete_tool,
        crate::server::permissions::grant_permission,
        crate::server::permissions::list_permissions,
        crate::server::executions::execute_tool,
        crate::server::executions::execution_history,
        crate::server::sessions::open_session,
        crate::server::sessions::close_session,
    ),
    components(schemas(
        // Error
        ApiErrorResponse,
        ApiErrorBody,
        // Catalog
        Tool,
        ToolPage,
        RegisterToolRequest,
        UpdateToolRequest,
        // Permissions
        Permission,
        PermissionPage,
        PrincipalType,
        PermissionLevel,
        GrantPermissionRequest,
        // Executions
        Execution,
        ExecutionPage,
        ExecutionStatus,
        // Sessions
        Session,
        OpenSessionRequest,
    )),
    tags(
        (name = "tools", description = "Tool catalog"),
        (name = "permissions", description = "Permission grants"),
        (name = "executions", description = "Invocation tracking"),
        (name = "sessions", description = "Stateful tool sessions"),
    )
)]
pub struct ApiDoc;
