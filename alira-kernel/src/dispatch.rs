//! Dispatch Executor: runs the tool calls a model requested.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use alira_adapters::traits::{ChatMessage, ToolCallRequest};
use alira_primitives::{ToolCallId, UserId};
use alira_tools::credential::USER_ID_PARAM;
use alira_tools::registry::{ToolDefinition, ToolError, ToolRegistry};
use futures::{StreamExt, stream};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

/// Payload returned to the model for a call naming an unknown tool.
pub const TOOL_NOT_FOUND: &str = "tool not found";

/// Result of one tool invocation, as a value.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// The tool returned a JSON result.
    Success(Value),
    /// Resolution, argument decoding or execution failed.
    Failure(ToolError),
}

/// Outcome of one requested call, keyed by the call's id.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExecutionResult {
    tool_call_id: ToolCallId,
    function_name: String,
    outcome: ToolOutcome,
}

impl ToolExecutionResult {
    /// Returns the id of the call this result answers.
    #[must_use]
    pub fn tool_call_id(&self) -> &ToolCallId {
        &self.tool_call_id
    }

    /// Returns the function name the model requested.
    #[must_use]
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Returns the invocation outcome.
    #[must_use]
    pub fn outcome(&self) -> &ToolOutcome {
        &self.outcome
    }

    /// Returns `true` when the tool succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success(_))
    }

    /// Returns the JSON payload handed back to the model.
    #[must_use]
    pub fn payload(&self) -> Value {
        match &self.outcome {
            ToolOutcome::Success(value) => value.clone(),
            ToolOutcome::Failure(ToolError::NotFound { .. }) => json!({ "error": TOOL_NOT_FOUND }),
            ToolOutcome::Failure(err) => {
                let reason = match err {
                    ToolError::Execution { reason } => reason.clone(),
                    other => other.to_string(),
                };
                json!({
                    "error": format!("error executing `{}`: {reason}", self.function_name)
                })
            }
        }
    }

    /// Converts the result into a `tool` conversation message.
    #[must_use]
    pub fn into_message(self) -> ChatMessage {
        let content = self.payload().to_string();
        ChatMessage::tool(self.tool_call_id, content)
    }
}

/// Resolves and executes tool calls against a fixed tool set, one at a time.
///
/// Per turn the set is the tools advertised to the model, so a registered
/// tool that failed schema preparation resolves as not found.
#[derive(Clone, Default)]
pub struct DispatchExecutor {
    tools: HashMap<String, Arc<ToolDefinition>>,
}

impl fmt::Debug for DispatchExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchExecutor")
            .field("tools", &self.tools.len())
            .finish()
    }
}

impl DispatchExecutor {
    /// Creates an executor over `tools`, keyed by name.
    #[must_use]
    pub fn new(tools: impl IntoIterator<Item = Arc<ToolDefinition>>) -> Self {
        let tools = tools
            .into_iter()
            .map(|tool| (tool.name().to_owned(), tool))
            .collect();
        Self { tools }
    }

    /// Creates an executor over every registered tool.
    #[must_use]
    pub fn from_registry(registry: &ToolRegistry) -> Self {
        Self::new(registry.list())
    }

    /// Executes `calls` in order and returns exactly one result per call.
    ///
    /// Failures never abort the batch; they become error payloads.
    pub async fn dispatch(
        &self,
        calls: &[ToolCallRequest],
        user: Option<&UserId>,
    ) -> Vec<ToolExecutionResult> {
        stream::iter(calls)
            .then(move |call| self.execute_one(call, user))
            .collect()
            .await
    }

    async fn execute_one(&self, call: &ToolCallRequest, user: Option<&UserId>) -> ToolExecutionResult {
        let name = call.function_name();
        debug!(tool = name, call_id = %call.id(), "dispatching tool call");

        let outcome = match self.invoke(call, user).await {
            Ok(value) => ToolOutcome::Success(value),
            Err(err) => {
                warn!(tool = name, call_id = %call.id(), error = %err, "tool call failed");
                ToolOutcome::Failure(err)
            }
        };

        ToolExecutionResult {
            tool_call_id: call.id().clone(),
            function_name: name.to_owned(),
            outcome,
        }
    }

    async fn invoke(&self, call: &ToolCallRequest, user: Option<&UserId>) -> Result<Value, ToolError> {
        let name = call.function_name();
        let tool = self.tools.get(name).ok_or_else(|| ToolError::NotFound {
            name: name.to_owned(),
        })?;

        let mut arguments = parse_arguments(call.arguments())?;
        if tool.requires_identity() {
            scope_identity(&mut arguments, user)?;
        }

        tool.execute(arguments).await
    }
}

fn parse_arguments(raw: &str) -> Result<Value, ToolError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_str(raw)
        .map_err(|err| ToolError::execution(format!("invalid JSON arguments: {err}")))
}

/// Replaces any model-supplied `userId` with the caller's, or drops it when
/// the turn has no caller.
fn scope_identity(arguments: &mut Value, user: Option<&UserId>) -> Result<(), ToolError> {
    match (arguments, user) {
        (Value::Object(fields), user) => {
            if fields.remove(USER_ID_PARAM).is_some() {
                debug!("discarded model-supplied caller identity");
            }
            if let Some(user) = user {
                fields.insert(USER_ID_PARAM.to_owned(), Value::String(user.to_string()));
            }
            Ok(())
        }
        (_, Some(_)) => Err(ToolError::execution(
            "arguments must be a JSON object to carry the caller identity",
        )),
        (_, None) => Ok(()),
    }
}
