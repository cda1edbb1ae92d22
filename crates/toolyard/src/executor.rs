//! Execution pipeline: record, run, finalize.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{RegistryError, RegistryResult};
use crate::model::{Execution, ExecutionStatus, Tool};
use crate::store::{StoreError, ToolStore};

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The JSON value produced by the invocation.
    pub output: Value,
    /// Resource accounting reported by the runner, when available.
    pub resource_usage: Option<Value>,
}

/// Capability that carries out one tool invocation.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, tool: &Tool, input: &Value) -> RegistryResult<RunOutcome>;
}

/// Default runner: validates the input shape and acknowledges the
/// invocation without dispatching anywhere. Container-backed execution is
/// not part of this service.
pub struct AcknowledgingRunner;

#[async_trait]
impl ToolRunner for AcknowledgingRunner {
    async fn run(&self, tool: &Tool, input: &Value) -> RegistryResult<RunOutcome> {
        let object = input.as_object().ok_or_else(|| {
            RegistryError::InvalidInput("execution input must be a JSON object".to_string())
        })?;
        let input_keys: Vec<&str> = object.keys().map(String::as_str).collect();
        Ok(RunOutcome {
            output: json!({
                "acknowledged": true,
                "tool": tool.name,
                "version": tool.version,
                "input_keys": input_keys,
            }),
            resource_usage: None,
        })
    }
}

/// Run one invocation end to end, moving the persisted execution row
/// through pending, running, and completed/error.
///
/// A runner failure is terminal for the invocation but not for the request:
/// the row is finalized with status `error` and returned to the caller.
pub(crate) async fn run_execution(
    store: &dyn ToolStore,
    runner: &dyn ToolRunner,
    tool: &Tool,
    agent_id: &str,
    session_id: Option<String>,
    input: Value,
) -> Result<Execution, StoreError> {
    let started_at = Utc::now();
    let mut execution = Execution {
        id: Uuid::new_v4().to_string(),
        tool_id: tool.id.clone(),
        session_id,
        agent_id: agent_id.to_string(),
        input,
        output: None,
        status: ExecutionStatus::Pending,
        error: None,
        started_at,
        finished_at: None,
        duration_ms: None,
        resource_usage: None,
    };
    store.insert_execution(&execution).await?;

    execution.status = ExecutionStatus::Running;
    store.update_execution(&execution).await?;

    let outcome = runner.run(tool, &execution.input).await;

    let finished_at = Utc::now();
    execution.finished_at = Some(finished_at);
    execution.duration_ms = Some((finished_at - started_at).num_milliseconds().max(0) as u64);
    match outcome {
        Ok(outcome) => {
            execution.status = ExecutionStatus::Completed;
            execution.output = Some(outcome.output);
            execution.resource_usage = outcome.resource_usage;
        }
        Err(error) => {
            tracing::warn!(tool_id = %tool.id, %error, "tool run failed");
            execution.status = ExecutionStatus::Error;
            execution.error = Some(error.to_string());
        }
    }
    store.update_execution(&execution).await?;
    Ok(execution)
}
