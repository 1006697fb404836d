//! Runtime registry for tool definitions and execution.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

/// Result alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Boxed future produced by function-pointer tool bindings.
pub type ToolFuture = Pin<Box<dyn Future<Output = ToolResult<Value>> + Send>>;

/// Trait implemented by tool executors.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Executes the tool with the given JSON parameters, returning JSON output.
    async fn execute(&self, parameters: Value) -> ToolResult<Value>;
}

#[async_trait]
impl<F, Fut> Tool for F
where
    F: Send + Sync + Fn(Value) -> Fut,
    Fut: Future<Output = ToolResult<Value>> + Send,
{
    async fn execute(&self, parameters: Value) -> ToolResult<Value> {
        (self)(parameters).await
    }
}

/// A named, schema-described capability the model may invoke.
///
/// Definitions are assembled with [`ToolDefinition::builder`] without any
/// checks; the contract is validated once, when the definition is handed to
/// [`ToolRegistry::register`].
#[derive(Clone)]
pub struct ToolDefinition {
    name: String,
    description: String,
    instructions: Option<String>,
    schema: Value,
    requires_identity: bool,
    executor: Option<Arc<dyn Tool>>,
}

impl ToolDefinition {
    /// Starts building a definition for the supplied tool name.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ToolDefinitionBuilder {
        ToolDefinitionBuilder {
            definition: Self {
                name: name.into(),
                description: String::new(),
                instructions: None,
                schema: Value::Null,
                requires_identity: false,
                executor: None,
            },
        }
    }

    /// Returns the unique tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description shown to the model.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns operator guidance. Never sent to the model.
    #[must_use]
    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    /// Returns the JSON schema describing invocation parameters.
    #[must_use]
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Returns `true` when the caller's `userId` must be injected into the
    /// parameters before execution.
    #[must_use]
    pub const fn requires_identity(&self) -> bool {
        self.requires_identity
    }

    /// Executes the tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Execution`] when no executor is attached or
    /// propagates the failure raised by the implementation.
    pub async fn execute(&self, parameters: Value) -> ToolResult<Value> {
        let Some(executor) = &self.executor else {
            return Err(ToolError::execution(format!(
                "tool `{}` has no executor",
                self.name
            )));
        };
        executor.execute(parameters).await
    }

    fn validate(&self) -> ToolResult<()> {
        let reject = |reason: &str| {
            Err(ToolError::Registration {
                name: if self.name.trim().is_empty() {
                    "<unnamed>".to_owned()
                } else {
                    self.name.clone()
                },
                reason: reason.to_owned(),
            })
        };

        if self.name.trim().is_empty() {
            return reject("tool must have a name");
        }
        if self.description.trim().is_empty() {
            return reject("tool must have a description");
        }
        if self.executor.is_none() {
            return reject("tool must have an execute capability");
        }
        let Value::Object(schema) = &self.schema else {
            return reject("tool must have an object schema");
        };
        if schema.get("type").and_then(Value::as_str) != Some("object") {
            return reject("schema root type must be \"object\"");
        }

        Ok(())
    }
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("requires_identity", &self.requires_identity)
            .field("has_executor", &self.executor.is_some())
            .finish_non_exhaustive()
    }
}

impl PartialEq for ToolDefinition {
    fn eq(&self, other: &Self) -> bool {
        let same_executor = match (&self.executor, &other.executor) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };

        same_executor
            && self.name == other.name
            && self.description == other.description
            && self.instructions == other.instructions
            && self.schema == other.schema
            && self.requires_identity == other.requires_identity
    }
}

/// Builder for [`ToolDefinition`].
#[derive(Debug)]
pub struct ToolDefinitionBuilder {
    definition: ToolDefinition,
}

impl ToolDefinitionBuilder {
    /// Sets the description shown to the model.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.definition.description = description.into();
        self
    }

    /// Sets operator-facing guidance.
    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.definition.instructions = Some(instructions.into());
        self
    }

    /// Sets the parameter schema.
    #[must_use]
    pub fn schema(mut self, schema: Value) -> Self {
        self.definition.schema = schema;
        self
    }

    /// Declares that the tool acts on behalf of the calling user.
    #[must_use]
    pub fn requires_identity(mut self, requires_identity: bool) -> Self {
        self.definition.requires_identity = requires_identity;
        self
    }

    /// Attaches the executor.
    #[must_use]
    pub fn executor<T>(self, tool: T) -> Self
    where
        T: Tool + 'static,
    {
        self.shared_executor(Arc::new(tool))
    }

    /// Attaches an already shared executor.
    #[must_use]
    pub fn shared_executor(mut self, tool: Arc<dyn Tool>) -> Self {
        self.definition.executor = Some(tool);
        self
    }

    /// Attaches a plain function executor.
    #[must_use]
    pub fn binding(self, executor: fn(Value) -> ToolFuture) -> Self {
        self.executor(executor)
    }

    /// Finishes the definition. Validation happens at registration.
    #[must_use]
    pub fn build(self) -> ToolDefinition {
        self.definition
    }
}

/// Registry of tool definitions keyed by name.
///
/// The registry is populated during startup and then shared read-only
/// behind an [`Arc`]; concurrent turns read it without synchronisation.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<ToolDefinition>>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("registered", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stores a tool definition.
    ///
    /// Registering a name that already exists replaces the previous
    /// definition.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Registration`] if the name, description, schema,
    /// or executor is missing, or the schema root type is not `"object"`.
    /// The registry is left unchanged on error.
    pub fn register(&mut self, definition: ToolDefinition) -> ToolResult<()> {
        definition.validate()?;

        let name = definition.name.clone();
        if self
            .tools
            .insert(name.clone(), Arc::new(definition))
            .is_some()
        {
            debug!(tool = %name, "replaced existing tool registration");
        } else {
            info!(tool = %name, "tool registered");
        }

        Ok(())
    }

    /// Returns the definition registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<ToolDefinition>> {
        self.tools.get(name).cloned()
    }

    /// Returns whether a tool named `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Lists every registered definition, ordered by name.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<ToolDefinition>> {
        self.tools.values().cloned().collect()
    }

    /// Lists registered tool names, ordered.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Errors produced by tool registration, projection, and execution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    /// Tool definition failed structural validation.
    #[error("cannot register tool `{name}`: {reason}")]
    Registration {
        /// Name of the rejected tool.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Tool failed re-validation while building function specs.
    #[error("tool `{name}` has an invalid schema: {reason}")]
    Schema {
        /// Name of the excluded tool.
        name: String,
        /// Human-readable reason for exclusion.
        reason: String,
    },

    /// The model requested a tool that is not registered.
    #[error("tool `{name}` is not registered")]
    NotFound {
        /// Name of the missing tool.
        name: String,
    },

    /// Tool execution failed, including argument decoding.
    #[error("tool execution failed: {reason}")]
    Execution {
        /// Human-readable error returned by the tool implementation.
        reason: String,
    },

    /// A discovery source could not be loaded.
    #[error("tool source `{source_name}` failed to load: {reason}")]
    Source {
        /// Name of the failing source.
        source_name: String,
        /// Human-readable reason for the failure.
        reason: String,
    },
}

impl ToolError {
    /// Creates an execution error from the supplied reason.
    #[must_use]
    pub fn execution(reason: impl Into<String>) -> Self {
        Self::Execution {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn echo() -> ToolDefinition {
        ToolDefinition::builder("echo")
            .description("Echo incoming payload")
            .schema(json!({ "type": "object", "properties": {} }))
            .executor(|input: Value| async move { Ok(input) })
            .build()
    }

    #[test]
    fn register_then_get_returns_equal_definition() {
        let mut registry = ToolRegistry::new();
        let definition = echo();
        registry.register(definition.clone()).unwrap();

        let stored = registry.get("echo").expect("registered");
        assert_eq!(*stored, definition);
        assert!(registry.contains("echo"));
        assert!(registry.get("missing").is_none());
    }

    #[tokio::test]
    async fn registered_tool_executes() {
        let mut registry = ToolRegistry::new();
        registry.register(echo()).unwrap();

        let payload = json!({ "message": "hello" });
        let output = registry
            .get("echo")
            .unwrap()
            .execute(payload.clone())
            .await
            .unwrap();
        assert_eq!(output, payload);
    }

    #[tokio::test]
    async fn binding_executor_runs() {
        fn shout(input: Value) -> ToolFuture {
            Box::pin(async move {
                let text = input["text"].as_str().unwrap_or_default().to_uppercase();
                Ok(json!({ "text": text }))
            })
        }

        let definition = ToolDefinition::builder("shout")
            .description("Uppercases text")
            .schema(json!({ "type": "object" }))
            .binding(shout)
            .build();

        let output = definition.execute(json!({ "text": "hi" })).await.unwrap();
        assert_eq!(output, json!({ "text": "HI" }));
    }

    #[test]
    fn missing_fields_are_rejected_without_side_effects() {
        let mut registry = ToolRegistry::new();
        registry.register(echo()).unwrap();

        let cases = [
            ToolDefinition::builder("")
                .description("d")
                .schema(json!({ "type": "object" }))
                .executor(|v: Value| async move { Ok(v) })
                .build(),
            ToolDefinition::builder("no_description")
                .schema(json!({ "type": "object" }))
                .executor(|v: Value| async move { Ok(v) })
                .build(),
            ToolDefinition::builder("no_schema")
                .description("d")
                .executor(|v: Value| async move { Ok(v) })
                .build(),
            ToolDefinition::builder("no_executor")
                .description("d")
                .schema(json!({ "type": "object" }))
                .build(),
            ToolDefinition::builder("array_schema")
                .description("d")
                .schema(json!({ "type": "array" }))
                .executor(|v: Value| async move { Ok(v) })
                .build(),
        ];

        for definition in cases {
            let err = registry
                .register(definition)
                .expect_err("definition should be rejected");
            assert!(matches!(err, ToolError::Registration { .. }), "{err}");
        }

        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn re_registration_overwrites() {
        let mut registry = ToolRegistry::new();
        registry.register(echo()).unwrap();

        let replacement = ToolDefinition::builder("echo")
            .description("Second version")
            .schema(json!({ "type": "object" }))
            .executor(|v: Value| async move { Ok(v) })
            .build();
        registry.register(replacement).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("echo").unwrap().description(), "Second version");
    }

    #[test]
    fn list_is_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry
                .register(
                    ToolDefinition::builder(name)
                        .description("d")
                        .schema(json!({ "type": "object" }))
                        .executor(|v: Value| async move { Ok(v) })
                        .build(),
                )
                .unwrap();
        }

        let names: Vec<_> = registry.list().iter().map(|d| d.name().to_owned()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn executing_without_executor_fails() {
        let definition = ToolDefinition::builder("bare")
            .description("d")
            .schema(json!({ "type": "object" }))
            .build();
        let err = definition.execute(Value::Null).await.unwrap_err();
        assert!(matches!(err, ToolError::Execution { .. }));
    }
}
