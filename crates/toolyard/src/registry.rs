//! Registry service: sole owner of catalog reads/writes and their
//! invariants.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{RegistryError, RegistryResult};
use crate::executor::{self, ToolRunner};
use crate::model::{
    Execution, ExecutionPage, NewTool, Permission, PermissionGrant, PermissionLevel,
    PermissionPage, PrincipalType, Session, Tool, ToolPage, ToolPatch,
};
use crate::schema::validate_configuration_schema;
use crate::store::{SharedStore, StoreError};

#[derive(Clone)]
pub struct RegistryService {
    store: SharedStore,
    runner: Arc<dyn ToolRunner>,
}

impl RegistryService {
    pub fn new(store: SharedStore, runner: Arc<dyn ToolRunner>) -> Self {
        Self { store, runner }
    }

    /// Register a new tool version.
    ///
    /// The configuration schema is shape-checked before anything is
    /// persisted; a duplicate (name, version) pair surfaces as
    /// [`RegistryError::ToolAlreadyExists`] off the store's unique
    /// constraint.
    pub async fn register_tool(&self, new_tool: NewTool) -> RegistryResult<Tool> {
        if let Err(errors) = validate_configuration_schema(&new_tool.configuration_schema) {
            return Err(RegistryError::InvalidSchema(errors));
        }

        let now = Utc::now();
        let tool = Tool {
            id: Uuid::new_v4().to_string(),
            name: new_tool.name,
            version: new_tool.version,
            description: new_tool.description,
            configuration_schema: new_tool.configuration_schema,
            docker_image_uri: new_tool.docker_image_uri,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        match self.store.insert_tool(&tool).await {
            Ok(()) => {
                tracing::info!(name = %tool.name, version = %tool.version, "registered tool");
                Ok(tool)
            }
            Err(StoreError::Conflict(_)) => {
                tracing::warn!(name = %tool.name, version = %tool.version, "duplicate registration");
                Err(RegistryError::ToolAlreadyExists {
                    name: tool.name,
                    version: tool.version,
                })
            }
            Err(error) => Err(store_err(error)),
        }
    }

    pub async fn get_tool(&self, name: &str, version: &str) -> RegistryResult<Tool> {
        self.store
            .tool_by_name_version(name, version)
            .await
            .map_err(store_err)?
            .ok_or_else(|| RegistryError::ToolNotFound {
                name: name.to_string(),
                version: version.to_string(),
            })
    }

    pub async fn get_tool_by_id(&self, id: &str) -> RegistryResult<Tool> {
        self.store
            .tool_by_id(id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| RegistryError::ToolIdNotFound { id: id.to_string() })
    }

    /// All versions of a name, newest-created-first. A name with zero
    /// versions is a not-found, not an empty list.
    pub async fn get_tool_versions(&self, name: &str) -> RegistryResult<Vec<Tool>> {
        let versions = self.store.tool_versions(name).await.map_err(store_err)?;
        if versions.is_empty() {
            return Err(RegistryError::ToolNotFound {
                name: name.to_string(),
                version: "*".to_string(),
            });
        }
        Ok(versions)
    }

    pub async fn list_tools(
        &self,
        limit: u32,
        offset: u32,
        active_only: bool,
    ) -> RegistryResult<ToolPage> {
        let (tools, total) = self
            .store
            .list_tools(limit, offset, active_only)
            .await
            .map_err(store_err)?;
        Ok(ToolPage {
            tools,
            total,
            limit,
            offset,
        })
    }

    /// Apply a partial update to a tool's mutable fields.
    ///
    /// Only description, the active flag, and the image reference can
    /// change; `updated_at` is refreshed even for an empty patch.
    pub async fn update_tool(
        &self,
        name: &str,
        version: &str,
        patch: ToolPatch,
    ) -> RegistryResult<Tool> {
        let mut tool = self.get_tool(name, version).await?;
        if let Some(description) = patch.description {
            tool.description = Some(description);
        }
        if let Some(is_active) = patch.is_active {
            tool.is_active = is_active;
        }
        if let Some(docker_image_uri) = patch.docker_image_uri {
            tool.docker_image_uri = Some(docker_image_uri);
        }
        tool.updated_at = Utc::now();
        self.store.update_tool(&tool).await.map_err(store_err)?;
        Ok(tool)
    }

    /// Delete a tool version and all its permissions.
    pub async fn delete_tool(&self, name: &str, version: &str) -> RegistryResult<()> {
        let tool = self.get_tool(name, version).await?;
        self.store.delete_tool(&tool.id).await.map_err(store_err)?;
        tracing::info!(name = %name, version = %version, "deleted tool");
        Ok(())
    }

    /// Grant a principal execute rights on one tool version.
    pub async fn grant_permission(
        &self,
        name: &str,
        version: &str,
        grant: PermissionGrant,
    ) -> RegistryResult<Permission> {
        let tool = self.get_tool(name, version).await?;
        let permission = Permission {
            id: Uuid::new_v4().to_string(),
            tool_id: tool.id,
            principal_id: grant.principal_id,
            principal_type: grant.principal_type,
            permission_level: PermissionLevel::Execute,
            granted_by: grant.granted_by,
            created_at: Utc::now(),
        };
        match self.store.insert_permission(&permission).await {
            Ok(()) => {
                tracing::info!(
                    principal = %permission.principal_id,
                    tool = %name,
                    version = %version,
                    "granted permission"
                );
                Ok(permission)
            }
            Err(StoreError::Conflict(_)) => Err(RegistryError::PermissionAlreadyExists {
                principal_type: permission.principal_type.to_string(),
                principal_id: permission.principal_id,
                tool: format!("{name}@{version}"),
            }),
            Err(error) => Err(store_err(error)),
        }
    }

    pub async fn list_permissions(
        &self,
        name: &str,
        version: &str,
    ) -> RegistryResult<PermissionPage> {
        let tool = self.get_tool(name, version).await?;
        let permissions = self
            .store
            .permissions_for_tool(&tool.id)
            .await
            .map_err(store_err)?;
        let total = permissions.len() as u64;
        Ok(PermissionPage { permissions, total })
    }

    /// Whether the principal holds a grant for this tool version.
    pub async fn has_permission(
        &self,
        name: &str,
        version: &str,
        principal_id: &str,
        principal_type: PrincipalType,
    ) -> RegistryResult<bool> {
        let tool = self.get_tool(name, version).await?;
        let found = self
            .store
            .find_permission(&tool.id, principal_id, principal_type)
            .await
            .map_err(store_err)?;
        Ok(found.is_some())
    }

    /// Invoke a tool by id, recording the execution.
    ///
    /// The tool must exist and be active; a supplied session id must
    /// reference an existing session. Runner failures are recorded on the
    /// returned execution, not raised.
    pub async fn execute_tool(
        &self,
        tool_id: &str,
        agent_id: &str,
        session_id: Option<String>,
        input: Value,
    ) -> RegistryResult<Execution> {
        let tool = self.get_tool_by_id(tool_id).await?;
        if !tool.is_active {
            return Err(RegistryError::ToolInactive { id: tool.id });
        }
        if let Some(session_id) = &session_id {
            self.store
                .session_by_id(session_id)
                .await
                .map_err(store_err)?
                .ok_or_else(|| RegistryError::SessionNotFound {
                    id: session_id.clone(),
                })?;
        }
        executor::run_execution(
            self.store.as_ref(),
            self.runner.as_ref(),
            &tool,
            agent_id,
            session_id,
            input,
        )
        .await
        .map_err(store_err)
    }

    /// One page of a tool's execution history, newest-first.
    pub async fn execution_history(
        &self,
        tool_id: &str,
        limit: u32,
        offset: u32,
    ) -> RegistryResult<ExecutionPage> {
        let tool = self.get_tool_by_id(tool_id).await?;
        let (executions, total) = self
            .store
            .executions_for_tool(&tool.id, limit, offset)
            .await
            .map_err(store_err)?;
        Ok(ExecutionPage {
            executions,
            total,
            limit,
            offset,
        })
    }

    /// Open a stateful session of an agent against a tool.
    pub async fn open_session(&self, tool_id: &str, agent_id: &str) -> RegistryResult<Session> {
        let tool = self.get_tool_by_id(tool_id).await?;
        let session = Session {
            id: Uuid::new_v4().to_string(),
            tool_id: tool.id,
            agent_id: agent_id.to_string(),
            state: None,
            started_at: Utc::now(),
            ended_at: None,
        };
        self.store
            .insert_session(&session)
            .await
            .map_err(store_err)?;
        Ok(session)
    }

    /// Close a session. Closing an already-closed session is a no-op;
    /// `ended_at` is stamped once.
    pub async fn close_session(&self, session_id: &str) -> RegistryResult<Session> {
        let mut session = self
            .store
            .session_by_id(session_id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| RegistryError::SessionNotFound {
                id: session_id.to_string(),
            })?;
        if session.ended_at.is_none() {
            session.ended_at = Some(Utc::now());
            self.store
                .update_session(&session)
                .await
                .map_err(store_err)?;
        }
        Ok(session)
    }
}

fn store_err(error: StoreError) -> RegistryError {
    RegistryError::Store(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::AcknowledgingRunner;
    use crate::model::ExecutionStatus;
    use crate::store::SqliteStore;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::tempdir;

    fn make_service(dir: &tempfile::TempDir) -> RegistryService {
        let store = SqliteStore::open(dir.path().join("registry.db")).expect("open store");
        RegistryService::new(Arc::new(store), Arc::new(AcknowledgingRunner))
    }

    fn valid_schema() -> Value {
        json!({
            "openapi": "3.0.0",
            "info": {"title": "S", "version": "1.0.0"},
            "paths": {}
        })
    }

    fn new_tool(name: &str, version: &str) -> NewTool {
        NewTool {
            name: name.to_string(),
            version: version.to_string(),
            description: Some("summarizes text".to_string()),
            configuration_schema: valid_schema(),
            docker_image_uri: None,
        }
    }

    fn agent_grant(principal_id: &str) -> PermissionGrant {
        PermissionGrant {
            principal_id: principal_id.to_string(),
            principal_type: PrincipalType::Agent,
            granted_by: None,
        }
    }

    #[tokio::test]
    async fn register_then_get_returns_equal_fields() {
        let dir = tempdir().expect("tempdir");
        let service = make_service(&dir);

        let registered = service
            .register_tool(new_tool("summarizer", "1.0.0"))
            .await
            .expect("register");
        assert!(registered.is_active);

        let fetched = service
            .get_tool("summarizer", "1.0.0")
            .await
            .expect("get");
        assert_eq!(fetched.id, registered.id);
        assert_eq!(fetched.name, "summarizer");
        assert_eq!(fetched.version, "1.0.0");
        assert_eq!(fetched.description.as_deref(), Some("summarizes text"));
        assert_eq!(fetched.configuration_schema, valid_schema());
    }

    #[tokio::test]
    async fn duplicate_registration_fails_and_preserves_first() {
        let dir = tempdir().expect("tempdir");
        let service = make_service(&dir);
        let first = service
            .register_tool(new_tool("summarizer", "1.0.0"))
            .await
            .expect("register");

        let err = service
            .register_tool(new_tool("summarizer", "1.0.0"))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, RegistryError::ToolAlreadyExists { .. }));

        let fetched = service
            .get_tool("summarizer", "1.0.0")
            .await
            .expect("get");
        assert_eq!(fetched.id, first.id);
    }

    #[tokio::test]
    async fn invalid_schema_rejected_without_persisting() {
        let dir = tempdir().expect("tempdir");
        let service = make_service(&dir);

        let mut tool = new_tool("summarizer", "1.0.0");
        tool.configuration_schema = json!({"info": {"title": "S", "version": "1"}, "paths": {}});
        let err = service.register_tool(tool).await.expect_err("bad schema");
        match err {
            RegistryError::InvalidSchema(errors) => {
                assert_eq!(errors, vec!["missing required key: 'openapi'"]);
            }
            other => panic!("expected InvalidSchema, got {other}"),
        }

        let err = service
            .get_tool("summarizer", "1.0.0")
            .await
            .expect_err("nothing persisted");
        assert!(matches!(err, RegistryError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn versions_require_at_least_one_row() {
        let dir = tempdir().expect("tempdir");
        let service = make_service(&dir);

        let err = service
            .get_tool_versions("ghost")
            .await
            .expect_err("no versions");
        assert!(matches!(err, RegistryError::ToolNotFound { .. }));

        service
            .register_tool(new_tool("summarizer", "1.0.0"))
            .await
            .expect("register");
        service
            .register_tool(new_tool("summarizer", "2.0.0"))
            .await
            .expect("register");
        let versions = service
            .get_tool_versions("summarizer")
            .await
            .expect("versions");
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].version, "2.0.0");
    }

    #[tokio::test]
    async fn list_active_only_excludes_deactivated() {
        let dir = tempdir().expect("tempdir");
        let service = make_service(&dir);
        service
            .register_tool(new_tool("keeper", "1.0.0"))
            .await
            .expect("register");
        service
            .register_tool(new_tool("retired", "1.0.0"))
            .await
            .expect("register");
        service
            .update_tool(
                "retired",
                "1.0.0",
                ToolPatch {
                    is_active: Some(false),
                    ..ToolPatch::default()
                },
            )
            .await
            .expect("deactivate");

        let page = service.list_tools(10, 0, true).await.expect("list");
        assert_eq!(page.total, 1);
        assert!(page.tools.iter().all(|tool| tool.is_active));

        let all = service.list_tools(10, 0, false).await.expect("list");
        assert_eq!(all.total, 2);
    }

    #[tokio::test]
    async fn empty_patch_still_refreshes_updated_at() {
        let dir = tempdir().expect("tempdir");
        let service = make_service(&dir);
        let registered = service
            .register_tool(new_tool("summarizer", "1.0.0"))
            .await
            .expect("register");

        tokio::time::sleep(Duration::from_millis(5)).await;
        let updated = service
            .update_tool("summarizer", "1.0.0", ToolPatch::default())
            .await
            .expect("update");

        assert!(updated.updated_at > registered.updated_at);
        assert_eq!(updated.description, registered.description);
        assert_eq!(updated.is_active, registered.is_active);
        assert_eq!(updated.docker_image_uri, registered.docker_image_uri);
    }

    #[tokio::test]
    async fn update_unknown_tool_not_found() {
        let dir = tempdir().expect("tempdir");
        let service = make_service(&dir);
        let err = service
            .update_tool("ghost", "1.0.0", ToolPatch::default())
            .await
            .expect_err("missing tool");
        assert!(matches!(err, RegistryError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn grant_twice_fails_with_permission_conflict() {
        let dir = tempdir().expect("tempdir");
        let service = make_service(&dir);
        service
            .register_tool(new_tool("summarizer", "1.0.0"))
            .await
            .expect("register");

        service
            .grant_permission("summarizer", "1.0.0", agent_grant("agent-7"))
            .await
            .expect("first grant");
        let err = service
            .grant_permission("summarizer", "1.0.0", agent_grant("agent-7"))
            .await
            .expect_err("duplicate grant");
        assert!(matches!(err, RegistryError::PermissionAlreadyExists { .. }));
    }

    #[tokio::test]
    async fn grant_on_missing_tool_not_found() {
        let dir = tempdir().expect("tempdir");
        let service = make_service(&dir);
        let err = service
            .grant_permission("ghost", "1.0.0", agent_grant("agent-7"))
            .await
            .expect_err("missing tool");
        assert!(matches!(err, RegistryError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn delete_removes_tool_and_permissions() {
        let dir = tempdir().expect("tempdir");
        let service = make_service(&dir);
        service
            .register_tool(new_tool("summarizer", "1.0.0"))
            .await
            .expect("register");
        service
            .grant_permission("summarizer", "1.0.0", agent_grant("agent-7"))
            .await
            .expect("grant");

        service
            .delete_tool("summarizer", "1.0.0")
            .await
            .expect("delete");

        let err = service
            .get_tool("summarizer", "1.0.0")
            .await
            .expect_err("gone");
        assert!(matches!(err, RegistryError::ToolNotFound { .. }));
        let err = service
            .list_permissions("summarizer", "1.0.0")
            .await
            .expect_err("gone");
        assert!(matches!(err, RegistryError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn list_permissions_counts_grants() {
        let dir = tempdir().expect("tempdir");
        let service = make_service(&dir);
        service
            .register_tool(new_tool("summarizer", "1.0.0"))
            .await
            .expect("register");
        service
            .grant_permission("summarizer", "1.0.0", agent_grant("agent-7"))
            .await
            .expect("grant");
        service
            .grant_permission(
                "summarizer",
                "1.0.0",
                PermissionGrant {
                    principal_id: "reviewers".to_string(),
                    principal_type: PrincipalType::Role,
                    granted_by: Some("admin".to_string()),
                },
            )
            .await
            .expect("grant");

        let page = service
            .list_permissions("summarizer", "1.0.0")
            .await
            .expect("list");
        assert_eq!(page.total, 2);
        assert_eq!(page.permissions.len(), 2);
    }

    #[tokio::test]
    async fn has_permission_checks_the_triple() {
        let dir = tempdir().expect("tempdir");
        let service = make_service(&dir);
        service
            .register_tool(new_tool("summarizer", "1.0.0"))
            .await
            .expect("register");
        service
            .grant_permission("summarizer", "1.0.0", agent_grant("agent-7"))
            .await
            .expect("grant");

        assert!(service
            .has_permission("summarizer", "1.0.0", "agent-7", PrincipalType::Agent)
            .await
            .expect("check"));
        assert!(!service
            .has_permission("summarizer", "1.0.0", "agent-7", PrincipalType::Role)
            .await
            .expect("check"));
    }

    #[tokio::test]
    async fn execute_records_completed_execution() {
        let dir = tempdir().expect("tempdir");
        let service = make_service(&dir);
        let tool = service
            .register_tool(new_tool("summarizer", "1.0.0"))
            .await
            .expect("register");

        let execution = service
            .execute_tool(&tool.id, "agent-7", None, json!({"text": "hello"}))
            .await
            .expect("execute");
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.agent_id, "agent-7");

        let history = service
            .execution_history(&tool.id, 10, 0)
            .await
            .expect("history");
        assert_eq!(history.total, 1);
    }

    #[tokio::test]
    async fn execute_inactive_tool_rejected_without_recording() {
        let dir = tempdir().expect("tempdir");
        let service = make_service(&dir);
        let tool = service
            .register_tool(new_tool("summarizer", "1.0.0"))
            .await
            .expect("register");
        service
            .update_tool(
                "summarizer",
                "1.0.0",
                ToolPatch {
                    is_active: Some(false),
                    ..ToolPatch::default()
                },
            )
            .await
            .expect("deactivate");

        let err = service
            .execute_tool(&tool.id, "agent-7", None, json!({}))
            .await
            .expect_err("inactive");
        assert!(matches!(err, RegistryError::ToolInactive { .. }));

        let history = service
            .execution_history(&tool.id, 10, 0)
            .await
            .expect("history");
        assert_eq!(history.total, 0);
    }

    #[tokio::test]
    async fn execute_with_non_object_input_records_error_row() {
        let dir = tempdir().expect("tempdir");
        let service = make_service(&dir);
        let tool = service
            .register_tool(new_tool("summarizer", "1.0.0"))
            .await
            .expect("register");

        let execution = service
            .execute_tool(&tool.id, "agent-7", None, json!("not an object"))
            .await
            .expect("recorded");
        assert_eq!(execution.status, ExecutionStatus::Error);
        assert!(execution
            .error
            .as_deref()
            .expect("error message")
            .contains("JSON object"));
    }

    #[tokio::test]
    async fn execute_unknown_tool_id_not_found() {
        let dir = tempdir().expect("tempdir");
        let service = make_service(&dir);
        let err = service
            .execute_tool("no-such-id", "agent-7", None, json!({}))
            .await
            .expect_err("missing");
        assert!(matches!(err, RegistryError::ToolIdNotFound { .. }));
    }

    #[tokio::test]
    async fn execute_with_unknown_session_rejected() {
        let dir = tempdir().expect("tempdir");
        let service = make_service(&dir);
        let tool = service
            .register_tool(new_tool("summarizer", "1.0.0"))
            .await
            .expect("register");

        let err = service
            .execute_tool(
                &tool.id,
                "agent-7",
                Some("no-such-session".to_string()),
                json!({}),
            )
            .await
            .expect_err("missing session");
        assert!(matches!(err, RegistryError::SessionNotFound { .. }));
    }

    #[tokio::test]
    async fn session_lifecycle_and_idempotent_close() {
        let dir = tempdir().expect("tempdir");
        let service = make_service(&dir);
        let tool = service
            .register_tool(new_tool("summarizer", "1.0.0"))
            .await
            .expect("register");

        let session = service
            .open_session(&tool.id, "agent-7")
            .await
            .expect("open");
        assert!(session.ended_at.is_none());

        let execution = service
            .execute_tool(&tool.id, "agent-7", Some(session.id.clone()), json!({}))
            .await
            .expect("execute in session");
        assert_eq!(execution.session_id.as_deref(), Some(session.id.as_str()));

        let closed = service.close_session(&session.id).await.expect("close");
        let ended_at = closed.ended_at.expect("ended");

        let closed_again = service
            .close_session(&session.id)
            .await
            .expect("close again");
        assert_eq!(closed_again.ended_at, Some(ended_at));
    }

    #[tokio::test]
    async fn history_pagination() {
        let dir = tempdir().expect("tempdir");
        let service = make_service(&dir);
        let tool = service
            .register_tool(new_tool("summarizer", "1.0.0"))
            .await
            .expect("register");
        for i in 0..3 {
            service
                .execute_tool(&tool.id, "agent-7", None, json!({ "round": i }))
                .await
                .expect("execute");
        }

        let page = service
            .execution_history(&tool.id, 2, 0)
            .await
            .expect("history");
        assert_eq!(page.total, 3);
        assert_eq!(page.executions.len(), 2);

        let rest = service
            .execution_history(&tool.id, 2, 2)
            .await
            .expect("history");
        assert_eq!(rest.executions.len(), 1);
    }
}
