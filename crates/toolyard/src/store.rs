//! Storage capability for the catalog.
//!
//! The service layer never talks to a database directly; it holds an
//! injected [`SharedStore`] whose lifecycle is owned by the caller. The
//! store's uniqueness constraints are the sole at-most-one-row-per-key
//! mechanism — a losing concurrent write surfaces as [`StoreError::Conflict`].

pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Execution, Permission, PrincipalType, Session, Tool};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("conflict on {0}")]
    Conflict(&'static str),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// A persisted row could not be decoded back into its domain record.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait ToolStore: Send + Sync {
    async fn insert_tool(&self, tool: &Tool) -> Result<(), StoreError>;
    async fn tool_by_name_version(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<Tool>, StoreError>;
    async fn tool_by_id(&self, id: &str) -> Result<Option<Tool>, StoreError>;
    /// All versions of a name, newest-created-first.
    async fn tool_versions(&self, name: &str) -> Result<Vec<Tool>, StoreError>;
    /// One page of tools newest-created-first, plus the total row count.
    async fn list_tools(
        &self,
        limit: u32,
        offset: u32,
        active_only: bool,
    ) -> Result<(Vec<Tool>, u64), StoreError>;
    /// Persist the mutable fields and `updated_at` of an existing tool.
    async fn update_tool(&self, tool: &Tool) -> Result<(), StoreError>;
    /// Delete a tool and all its permissions within one transaction.
    async fn delete_tool(&self, tool_id: &str) -> Result<(), StoreError>;

    async fn insert_permission(&self, permission: &Permission) -> Result<(), StoreError>;
    /// All permissions of a tool, newest-first.
    async fn permissions_for_tool(&self, tool_id: &str) -> Result<Vec<Permission>, StoreError>;
    async fn find_permission(
        &self,
        tool_id: &str,
        principal_id: &str,
        principal_type: PrincipalType,
    ) -> Result<Option<Permission>, StoreError>;

    async fn insert_session(&self, session: &Session) -> Result<(), StoreError>;
    async fn session_by_id(&self, id: &str) -> Result<Option<Session>, StoreError>;
    async fn update_session(&self, session: &Session) -> Result<(), StoreError>;

    async fn insert_execution(&self, execution: &Execution) -> Result<(), StoreError>;
    async fn update_execution(&self, execution: &Execution) -> Result<(), StoreError>;
    /// One page of a tool's executions newest-first, plus the total count.
    async fn executions_for_tool(
        &self,
        tool_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<Execution>, u64), StoreError>;
}

pub type SharedStore = Arc<dyn ToolStore>;

pub use sqlite::SqliteStore;
