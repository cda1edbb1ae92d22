//! SQLite-backed [`ToolStore`].

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde_json::Value;

use super::{StoreError, ToolStore};
use crate::model::{
    Execution, ExecutionStatus, Permission, PermissionLevel, PrincipalType, Session, Tool,
};

const TOOL_COLUMNS: &str = "id, name, version, description, configuration_schema, \
     docker_image_uri, is_active, created_at, updated_at";
const PERMISSION_COLUMNS: &str =
    "id, tool_id, principal_id, principal_type, permission_level, granted_by, created_at";
const SESSION_COLUMNS: &str = "id, tool_id, agent_id, state, started_at, ended_at";
const EXECUTION_COLUMNS: &str = "id, tool_id, session_id, agent_id, input, output, status, \
     error, started_at, finished_at, duration_ms, resource_usage";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run the schema setup.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tools (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                version TEXT NOT NULL,
                description TEXT,
                configuration_schema TEXT NOT NULL,
                docker_image_uri TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (name, version)
            );
            CREATE TABLE IF NOT EXISTS permissions (
                id TEXT PRIMARY KEY,
                tool_id TEXT NOT NULL REFERENCES tools (id),
                principal_id TEXT NOT NULL,
                principal_type TEXT NOT NULL,
                permission_level TEXT NOT NULL,
                granted_by TEXT,
                created_at TEXT NOT NULL,
                UNIQUE (tool_id, principal_id, principal_type)
            );
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                tool_id TEXT NOT NULL REFERENCES tools (id),
                agent_id TEXT NOT NULL,
                state TEXT,
                started_at TEXT NOT NULL,
                ended_at TEXT
            );
            CREATE TABLE IF NOT EXISTS executions (
                id TEXT PRIMARY KEY,
                tool_id TEXT NOT NULL,
                session_id TEXT REFERENCES sessions (id),
                agent_id TEXT NOT NULL,
                input TEXT NOT NULL,
                output TEXT,
                status TEXT NOT NULL,
                error TEXT,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                duration_ms INTEGER,
                resource_usage TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_tools_name ON tools (name);
            CREATE INDEX IF NOT EXISTS idx_permissions_tool ON permissions (tool_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_tool ON sessions (tool_id);
            CREATE INDEX IF NOT EXISTS idx_executions_tool ON executions (tool_id);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl ToolStore for SqliteStore {
    async fn insert_tool(&self, tool: &Tool) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO tools (id, name, version, description, configuration_schema, \
             docker_image_uri, is_active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                tool.id,
                tool.name,
                tool.version,
                tool.description,
                tool.configuration_schema.to_string(),
                tool.docker_image_uri,
                tool.is_active,
                tool.created_at.to_rfc3339(),
                tool.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|error| constraint_conflict(error, "tools (name, version)"))?;
        Ok(())
    }

    async fn tool_by_name_version(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<Tool>, StoreError> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {TOOL_COLUMNS} FROM tools WHERE name = ?1 AND version = ?2"),
                params![name, version],
                read_tool,
            )
            .optional()?;
        raw.map(RawTool::into_tool).transpose()
    }

    async fn tool_by_id(&self, id: &str) -> Result<Option<Tool>, StoreError> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {TOOL_COLUMNS} FROM tools WHERE id = ?1"),
                params![id],
                read_tool,
            )
            .optional()?;
        raw.map(RawTool::into_tool).transpose()
    }

    async fn tool_versions(&self, name: &str) -> Result<Vec<Tool>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TOOL_COLUMNS} FROM tools WHERE name = ?1 \
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![name], read_tool)?;
        let mut tools = Vec::new();
        for raw in rows {
            tools.push(raw?.into_tool()?);
        }
        Ok(tools)
    }

    async fn list_tools(
        &self,
        limit: u32,
        offset: u32,
        active_only: bool,
    ) -> Result<(Vec<Tool>, u64), StoreError> {
        let filter = if active_only {
            "WHERE is_active = 1"
        } else {
            ""
        };
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TOOL_COLUMNS} FROM tools {filter} \
             ORDER BY created_at DESC, rowid DESC LIMIT ?1 OFFSET ?2"
        ))?;
        let rows = stmt.query_map(params![limit as i64, offset as i64], read_tool)?;
        let mut tools = Vec::new();
        for raw in rows {
            tools.push(raw?.into_tool()?);
        }
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM tools {filter}"),
            [],
            |row| row.get(0),
        )?;
        Ok((tools, total as u64))
    }

    async fn update_tool(&self, tool: &Tool) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE tools SET description = ?1, docker_image_uri = ?2, is_active = ?3, \
             updated_at = ?4 WHERE id = ?5",
            params![
                tool.description,
                tool.docker_image_uri,
                tool.is_active,
                tool.updated_at.to_rfc3339(),
                tool.id,
            ],
        )?;
        Ok(())
    }

    async fn delete_tool(&self, tool_id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM permissions WHERE tool_id = ?1",
            params![tool_id],
        )?;
        tx.execute("DELETE FROM tools WHERE id = ?1", params![tool_id])?;
        tx.commit()?;
        Ok(())
    }

    async fn insert_permission(&self, permission: &Permission) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO permissions (id, tool_id, principal_id, principal_type, \
             permission_level, granted_by, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                permission.id,
                permission.tool_id,
                permission.principal_id,
                permission.principal_type.as_str(),
                permission.permission_level.as_str(),
                permission.granted_by,
                permission.created_at.to_rfc3339(),
            ],
        )
        .map_err(|error| {
            constraint_conflict(error, "permissions (tool_id, principal_id, principal_type)")
        })?;
        Ok(())
    }

    async fn permissions_for_tool(&self, tool_id: &str) -> Result<Vec<Permission>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE tool_id = ?1 \
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![tool_id], read_permission)?;
        let mut permissions = Vec::new();
        for raw in rows {
            permissions.push(raw?.into_permission()?);
        }
        Ok(permissions)
    }

    async fn find_permission(
        &self,
        tool_id: &str,
        principal_id: &str,
        principal_type: PrincipalType,
    ) -> Result<Option<Permission>, StoreError> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {PERMISSION_COLUMNS} FROM permissions \
                     WHERE tool_id = ?1 AND principal_id = ?2 AND principal_type = ?3"
                ),
                params![tool_id, principal_id, principal_type.as_str()],
                read_permission,
            )
            .optional()?;
        raw.map(RawPermission::into_permission).transpose()
    }

    async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (id, tool_id, agent_id, state, started_at, ended_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.id,
                session.tool_id,
                session.agent_id,
                session.state.as_ref().map(Value::to_string),
                session.started_at.to_rfc3339(),
                session.ended_at.map(|ts| ts.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    async fn session_by_id(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                params![id],
                read_session,
            )
            .optional()?;
        raw.map(RawSession::into_session).transpose()
    }

    async fn update_session(&self, session: &Session) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE sessions SET state = ?1, ended_at = ?2 WHERE id = ?3",
            params![
                session.state.as_ref().map(Value::to_string),
                session.ended_at.map(|ts| ts.to_rfc3339()),
                session.id,
            ],
        )?;
        Ok(())
    }

    async fn insert_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO executions (id, tool_id, session_id, agent_id, input, output, \
             status, error, started_at, finished_at, duration_ms, resource_usage) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                execution.id,
                execution.tool_id,
                execution.session_id,
                execution.agent_id,
                execution.input.to_string(),
                execution.output.as_ref().map(Value::to_string),
                execution.status.as_str(),
                execution.error,
                execution.started_at.to_rfc3339(),
                execution.finished_at.map(|ts| ts.to_rfc3339()),
                execution.duration_ms.map(|ms| ms as i64),
                execution.resource_usage.as_ref().map(Value::to_string),
            ],
        )?;
        Ok(())
    }

    async fn update_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE executions SET output = ?1, status = ?2, error = ?3, finished_at = ?4, \
             duration_ms = ?5, resource_usage = ?6 WHERE id = ?7",
            params![
                execution.output.as_ref().map(Value::to_string),
                execution.status.as_str(),
                execution.error,
                execution.finished_at.map(|ts| ts.to_rfc3339()),
                execution.duration_ms.map(|ms| ms as i64),
                execution.resource_usage.as_ref().map(Value::to_string),
                execution.id,
            ],
        )?;
        Ok(())
    }

    async fn executions_for_tool(
        &self,
        tool_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<Execution>, u64), StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM executions WHERE tool_id = ?1 \
             ORDER BY started_at DESC, rowid DESC LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt.query_map(params![tool_id, limit as i64, offset as i64], read_execution)?;
        let mut executions = Vec::new();
        for raw in rows {
            executions.push(raw?.into_execution()?);
        }
        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM executions WHERE tool_id = ?1",
            params![tool_id],
            |row| row.get(0),
        )?;
        Ok((executions, total as u64))
    }
}

fn constraint_conflict(error: rusqlite::Error, what: &'static str) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &error {
        if failure.code == ErrorCode::ConstraintViolation {
            return StoreError::Conflict(what);
        }
    }
    StoreError::Database(error)
}

// Rows are read into plain-typed raw structs inside the rusqlite closures;
// timestamp/JSON/enum decoding happens afterwards so parse failures surface
// as StoreError::Corrupt instead of being shoehorned into rusqlite errors.

struct RawTool {
    id: String,
    name: String,
    version: String,
    description: Option<String>,
    configuration_schema: String,
    docker_image_uri: Option<String>,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

fn read_tool(row: &Row<'_>) -> rusqlite::Result<RawTool> {
    Ok(RawTool {
        id: row.get(0)?,
        name: row.get(1)?,
        version: row.get(2)?,
        description: row.get(3)?,
        configuration_schema: row.get(4)?,
        docker_image_uri: row.get(5)?,
        is_active: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl RawTool {
    fn into_tool(self) -> Result<Tool, StoreError> {
        Ok(Tool {
            configuration_schema: parse_json(&self.configuration_schema)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            id: self.id,
            name: self.name,
            version: self.version,
            description: self.description,
            docker_image_uri: self.docker_image_uri,
            is_active: self.is_active,
        })
    }
}

struct RawPermission {
    id: String,
    tool_id: String,
    principal_id: String,
    principal_type: String,
    permission_level: String,
    granted_by: Option<String>,
    created_at: String,
}

fn read_permission(row: &Row<'_>) -> rusqlite::Result<RawPermission> {
    Ok(RawPermission {
        id: row.get(0)?,
        tool_id: row.get(1)?,
        principal_id: row.get(2)?,
        principal_type: row.get(3)?,
        permission_level: row.get(4)?,
        granted_by: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl RawPermission {
    fn into_permission(self) -> Result<Permission, StoreError> {
        let principal_type = PrincipalType::parse(&self.principal_type).ok_or_else(|| {
            StoreError::Corrupt(format!("unknown principal type '{}'", self.principal_type))
        })?;
        let permission_level = PermissionLevel::parse(&self.permission_level).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "unknown permission level '{}'",
                self.permission_level
            ))
        })?;
        Ok(Permission {
            created_at: parse_timestamp(&self.created_at)?,
            id: self.id,
            tool_id: self.tool_id,
            principal_id: self.principal_id,
            principal_type,
            permission_level,
            granted_by: self.granted_by,
        })
    }
}

struct RawSession {
    id: String,
    tool_id: String,
    agent_id: String,
    state: Option<String>,
    started_at: String,
    ended_at: Option<String>,
}

fn read_session(row: &Row<'_>) -> rusqlite::Result<RawSession> {
    Ok(RawSession {
        id: row.get(0)?,
        tool_id: row.get(1)?,
        agent_id: row.get(2)?,
        state: row.get(3)?,
        started_at: row.get(4)?,
        ended_at: row.get(5)?,
    })
}

impl RawSession {
    fn into_session(self) -> Result<Session, StoreError> {
        Ok(Session {
            state: self.state.as_deref().map(parse_json).transpose()?,
            started_at: parse_timestamp(&self.started_at)?,
            ended_at: self
                .ended_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            id: self.id,
            tool_id: self.tool_id,
            agent_id: self.agent_id,
        })
    }
}

struct RawExecution {
    id: String,
    tool_id: String,
    session_id: Option<String>,
    agent_id: String,
    input: String,
    output: Option<String>,
    status: String,
    error: Option<String>,
    started_at: String,
    finished_at: Option<String>,
    duration_ms: Option<i64>,
    resource_usage: Option<String>,
}

fn read_execution(row: &Row<'_>) -> rusqlite::Result<RawExecution> {
    Ok(RawExecution {
        id: row.get(0)?,
        tool_id: row.get(1)?,
        session_id: row.get(2)?,
        agent_id: row.get(3)?,
        input: row.get(4)?,
        output: row.get(5)?,
        status: row.get(6)?,
        error: row.get(7)?,
        started_at: row.get(8)?,
        finished_at: row.get(9)?,
        duration_ms: row.get(10)?,
        resource_usage: row.get(11)?,
    })
}

impl RawExecution {
    fn into_execution(self) -> Result<Execution, StoreError> {
        let status = ExecutionStatus::parse(&self.status).ok_or_else(|| {
            StoreError::Corrupt(format!("unknown execution status '{}'", self.status))
        })?;
        Ok(Execution {
            input: parse_json(&self.input)?,
            output: self.output.as_deref().map(parse_json).transpose()?,
            started_at: parse_timestamp(&self.started_at)?,
            finished_at: self
                .finished_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            resource_usage: self
                .resource_usage
                .as_deref()
                .map(parse_json)
                .transpose()?,
            duration_ms: self.duration_ms.map(|ms| ms.max(0) as u64),
            id: self.id,
            tool_id: self.tool_id,
            session_id: self.session_id,
            agent_id: self.agent_id,
            status,
            error: self.error,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|error| StoreError::Corrupt(format!("bad timestamp '{raw}': {error}")))
}

fn parse_json(raw: &str) -> Result<Value, StoreError> {
    serde_json::from_str(raw)
        .map_err(|error| StoreError::Corrupt(format!("bad json payload: {error}")))
}
