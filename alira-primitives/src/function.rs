//! Provider-facing function descriptors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Function-calling descriptor advertised to a language model.
///
/// This is the `{name, description, parameters}` projection of a registered
/// tool. It is regenerated for every turn and never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    name: String,
    description: String,
    parameters: Value,
}

impl FunctionSpec {
    /// Creates a function descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Returns the function name the model uses to call it.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description shown to the model.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the JSON schema of the invocation parameters.
    #[must_use]
    pub fn parameters(&self) -> &Value {
        &self.parameters
    }
}
