//! Projection of registered tools into provider function specs.

use std::sync::Arc;

use alira_primitives::FunctionSpec;
use serde_json::Value;
use tracing::{debug, warn};

use crate::registry::{ToolDefinition, ToolError, ToolRegistry};

/// Tools prepared for one turn.
///
/// `specs` and `tools` are index-consistent: `specs[i]` is the projection of
/// `tools[i]`.
#[derive(Debug, Default)]
pub struct PreparedTools {
    specs: Vec<FunctionSpec>,
    tools: Vec<Arc<ToolDefinition>>,
    rejected: Vec<ToolError>,
}

impl PreparedTools {
    /// Returns the function specs to advertise to the model.
    #[must_use]
    pub fn specs(&self) -> &[FunctionSpec] {
        &self.specs
    }

    /// Returns the definitions backing each spec.
    #[must_use]
    pub fn tools(&self) -> &[Arc<ToolDefinition>] {
        &self.tools
    }

    /// Returns the tools excluded during re-validation.
    #[must_use]
    pub fn rejected(&self) -> &[ToolError] {
        &self.rejected
    }

    /// Returns `true` when no tool survived re-validation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Returns the names of the advertised tools.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(FunctionSpec::name).collect()
    }

    /// Consumes the set, returning the specs and definitions.
    #[must_use]
    pub fn into_parts(self) -> (Vec<FunctionSpec>, Vec<Arc<ToolDefinition>>) {
        (self.specs, self.tools)
    }
}

/// Builds function specs for every registered tool that re-validates.
///
/// Tools failing re-validation are logged and reported through
/// [`PreparedTools::rejected`]; they never fail the batch.
#[must_use]
pub fn prepare_tools(registry: &ToolRegistry) -> PreparedTools {
    let mut prepared = PreparedTools::default();

    for tool in registry.list() {
        match project(&tool) {
            Ok(spec) => {
                debug!(tool = spec.name(), "tool spec prepared");
                prepared.specs.push(spec);
                prepared.tools.push(tool);
            }
            Err(err) => {
                warn!(tool = tool.name(), error = %err, "tool excluded from function specs");
                prepared.rejected.push(err);
            }
        }
    }

    prepared
}

/// Projects a single definition into a function spec.
///
/// # Errors
///
/// Returns [`ToolError::Schema`] when the definition lacks a name,
/// description, or object-typed parameter schema.
pub fn project(tool: &ToolDefinition) -> Result<FunctionSpec, ToolError> {
    let reject = |reason: &str| ToolError::Schema {
        name: tool.name().to_owned(),
        reason: reason.to_owned(),
    };

    if tool.name().trim().is_empty() {
        return Err(reject("missing name"));
    }
    if tool.description().trim().is_empty() {
        return Err(reject("missing description"));
    }

    let schema = tool.schema();
    let Value::Object(fields) = schema else {
        return Err(reject("parameters must be a JSON object"));
    };
    if fields.get("type").and_then(Value::as_str) != Some("object") {
        return Err(reject("parameters root type must be \"object\""));
    }

    Ok(FunctionSpec::new(
        tool.name(),
        tool.description(),
        schema.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn tool(name: &str) -> ToolDefinition {
        ToolDefinition::builder(name)
            .description(format!("{name} tool"))
            .schema(json!({
                "type": "object",
                "properties": { "q": { "type": "string" } },
                "required": ["q"]
            }))
            .executor(|v: Value| async move { Ok(v) })
            .build()
    }

    #[test]
    fn empty_registry_yields_no_specs() {
        let prepared = prepare_tools(&ToolRegistry::new());
        assert!(prepared.is_empty());
        assert!(prepared.rejected().is_empty());
    }

    #[test]
    fn specs_and_tools_stay_index_consistent() {
        let mut registry = ToolRegistry::new();
        registry.register(tool("search")).unwrap();
        registry.register(tool("calendar")).unwrap();

        let prepared = prepare_tools(&registry);
        assert!(prepared.specs().len() <= registry.len());
        for (spec, definition) in prepared.specs().iter().zip(prepared.tools()) {
            assert_eq!(spec.name(), definition.name());
            assert!(registry.contains(spec.name()));
            assert_eq!(spec.parameters(), definition.schema());
        }
        assert_eq!(prepared.names(), vec!["calendar", "search"]);
    }

    #[test]
    fn projection_rejects_non_object_parameters() {
        let definition = ToolDefinition::builder("broken")
            .description("broken tool")
            .schema(json!({ "type": "string" }))
            .build();
        let err = project(&definition).unwrap_err();
        assert!(matches!(err, ToolError::Schema { name, .. } if name == "broken"));

        let definition = ToolDefinition::builder("broken")
            .description("broken tool")
            .schema(json!("object"))
            .build();
        assert!(project(&definition).is_err());
    }

    #[test]
    fn projection_requires_description() {
        let definition = ToolDefinition::builder("quiet")
            .schema(json!({ "type": "object" }))
            .build();
        assert!(matches!(
            project(&definition),
            Err(ToolError::Schema { .. })
        ));
    }
}
