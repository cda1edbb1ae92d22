//! Domain records for the tool catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// The kind of principal a permission is granted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalType {
    /// An individual agent.
    Agent,
    /// A role shared by many agents.
    Role,
}

impl PrincipalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalType::Agent => "agent",
            PrincipalType::Role => "role",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "agent" => Some(PrincipalType::Agent),
            "role" => Some(PrincipalType::Role),
            _ => None,
        }
    }
}

impl std::fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Level of access a permission grants. Only execution rights exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Execute,
}

impl PermissionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::Execute => "execute",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "execute" => Some(PermissionLevel::Execute),
            _ => None,
        }
    }
}

/// Status of a recorded execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Error => "error",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(ExecutionStatus::Pending),
            "running" => Some(ExecutionStatus::Running),
            "completed" => Some(ExecutionStatus::Completed),
            "error" => Some(ExecutionStatus::Error),
            _ => None,
        }
    }
}

/// One version of a named capability exposed to agents.
///
/// The (name, version) pair is unique across the catalog. Name, version, and
/// configuration schema are immutable after registration; description, the
/// active flag, and the image reference may be updated.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Tool {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    /// OpenAPI-3.0-shaped document describing how to invoke the tool.
    pub configuration_schema: Value,
    /// Container image reference for sandboxed execution, when one exists.
    pub docker_image_uri: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration input for a new tool version.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewTool {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub configuration_schema: Value,
    pub docker_image_uri: Option<String>,
}

/// Partial update of a tool's mutable fields. Absent fields are left
/// unchanged; immutable fields are not representable here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ToolPatch {
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub docker_image_uri: Option<String>,
}

/// A grant of use rights for one principal on one specific tool version.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Permission {
    pub id: String,
    pub tool_id: String,
    pub principal_id: String,
    pub principal_type: PrincipalType,
    pub permission_level: PermissionLevel,
    pub granted_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for granting a permission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PermissionGrant {
    pub principal_id: String,
    pub principal_type: PrincipalType,
    pub granted_by: Option<String>,
}

/// One stateful interaction of an agent with a tool.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Session {
    pub id: String,
    pub tool_id: String,
    pub agent_id: String,
    pub state: Option<Value>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// One recorded invocation of a tool, standalone or within a session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Execution {
    pub id: String,
    pub tool_id: String,
    pub session_id: Option<String>,
    pub agent_id: String,
    pub input: Value,
    pub output: Option<Value>,
    pub status: ExecutionStatus,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub resource_usage: Option<Value>,
}

/// One page of the tool listing, newest-created-first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ToolPage {
    pub tools: Vec<Tool>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

/// All permissions of one tool version, newest-first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PermissionPage {
    pub permissions: Vec<Permission>,
    pub total: u64,
}

/// One page of a tool's execution history, newest-first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExecutionPage {
    pub executions: Vec<Execution>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_type_roundtrip() {
        for kind in [PrincipalType::Agent, PrincipalType::Role] {
            assert_eq!(PrincipalType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(PrincipalType::parse("group"), None);
    }

    #[test]
    fn execution_status_roundtrip() {
        for status in [
            ExecutionStatus::Pending,
            ExecutionStatus::Running,
            ExecutionStatus::Completed,
            ExecutionStatus::Error,
        ] {
            assert_eq!(ExecutionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ExecutionStatus::parse("cancelled"), None);
    }

    #[test]
    fn principal_type_serializes_lowercase() {
        let json = serde_json::to_string(&PrincipalType::Agent).unwrap();
        assert_eq!(json, "\"agent\"");
        let parsed: PrincipalType = serde_json::from_str("\"role\"").unwrap();
        assert_eq!(parsed, PrincipalType::Role);
    }
}
