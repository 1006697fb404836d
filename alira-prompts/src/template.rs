//! `{{variable}}` prompt templates.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Result alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors raised while building or rendering templates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// A required variable had no value at render time.
    #[error("missing required variable: {name}")]
    MissingVariable {
        /// Name of the missing variable.
        name: String,
    },

    /// The template text is malformed.
    #[error("malformed template: {reason}")]
    Malformed {
        /// Description of the defect.
        reason: String,
    },
}

/// Text with `{{name}}` placeholders.
///
/// Placeholders without a value render as the empty string unless declared
/// required.
///
/// ```
/// use alira_prompts::template::PromptTemplate;
///
/// let template = PromptTemplate::builder("Available tools: {{tools}}")
///     .with_required_variable("tools")
///     .build()
///     .unwrap();
///
/// let mut vars = std::collections::BTreeMap::new();
/// vars.insert("tools".to_owned(), "getWeather".to_owned());
/// assert_eq!(template.render_with(&vars).unwrap(), "Available tools: getWeather");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    template: String,
    defaults: BTreeMap<String, String>,
    required: BTreeSet<String>,
}

impl PromptTemplate {
    /// Returns a builder for the supplied template text.
    #[must_use]
    pub fn builder(template: impl Into<String>) -> TemplateBuilder {
        TemplateBuilder::new(template)
    }

    /// Sets a default value for a variable.
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.defaults.insert(name.into(), value.into());
    }

    /// Returns the default value of a variable, if set.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.defaults.get(name).map(String::as_str)
    }

    /// Renders the template using its default values only.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingVariable`] if a required variable has
    /// no value.
    pub fn render(&self) -> TemplateResult<String> {
        self.render_with(&BTreeMap::new())
    }

    /// Renders the template; `vars` take precedence over defaults.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingVariable`] if a required variable has
    /// no value.
    pub fn render_with(&self, vars: &BTreeMap<String, String>) -> TemplateResult<String> {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            // Checked at build time.
            let Some(end) = after.find("}}") else {
                out.push_str(&rest[start..]);
                return Ok(out);
            };
            let name = after[..end].trim();
            match vars.get(name).or_else(|| self.defaults.get(name)) {
                Some(value) => out.push_str(value),
                None if self.required.contains(name) => {
                    return Err(TemplateError::MissingVariable {
                        name: name.to_owned(),
                    });
                }
                None => {}
            }
            rest = &after[end + 2..];
        }

        out.push_str(rest);
        Ok(out)
    }

    /// Returns the raw template text.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Returns the placeholder names in order of first appearance.
    #[must_use]
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in placeholder_names(&self.template) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

/// Builder for [`PromptTemplate`].
#[derive(Debug)]
pub struct TemplateBuilder {
    template: String,
    defaults: BTreeMap<String, String>,
    required: BTreeSet<String>,
}

impl TemplateBuilder {
    /// Creates a builder with the supplied template text.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            defaults: BTreeMap::new(),
            required: BTreeSet::new(),
        }
    }

    /// Sets a default value.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    /// Declares a variable that must have a value at render time.
    #[must_use]
    pub fn with_required_variable(mut self, name: impl Into<String>) -> Self {
        self.required.insert(name.into());
        self
    }

    /// Builds the template.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Malformed`] for an unclosed or empty
    /// placeholder, or a required variable that never appears in the text.
    pub fn build(self) -> TemplateResult<PromptTemplate> {
        let mut rest = self.template.as_str();
        while let Some(start) = rest.find("{{") {
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| TemplateError::Malformed {
                reason: "unclosed `{{` placeholder".to_owned(),
            })?;
            if after[..end].trim().is_empty() {
                return Err(TemplateError::Malformed {
                    reason: "empty placeholder".to_owned(),
                });
            }
            rest = &after[end + 2..];
        }

        let names: BTreeSet<&str> = placeholder_names(&self.template).collect();
        if let Some(unused) = self.required.iter().find(|name| !names.contains(name.as_str())) {
            return Err(TemplateError::Malformed {
                reason: format!("required variable `{unused}` is not referenced"),
            });
        }

        Ok(PromptTemplate {
            template: self.template,
            defaults: self.defaults,
            required: self.required,
        })
    }
}

fn placeholder_names(template: &str) -> impl Iterator<Item = &str> {
    template.split("{{").skip(1).filter_map(|chunk| {
        let (name, _) = chunk.split_once("}}")?;
        Some(name.trim())
    })
}
