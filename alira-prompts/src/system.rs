//! System instructions that open a turn's conversation.

use std::collections::BTreeMap;

use alira_primitives::UserId;

use crate::template::{PromptTemplate, TemplateResult};

/// Instruction used when no tool is available.
pub const FALLBACK_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Provide clear, accurate, and helpful responses.";

const TOOL_AWARE_PROMPT: &str = "You are a helpful AI assistant with access to various tools and APIs.

IMPORTANT INSTRUCTIONS:
1. When a user asks you to perform an action (create event, send email, etc.), USE THE AVAILABLE TOOLS immediately
2. DO NOT ask for information that you can reasonably infer or use defaults for
3. If userId is available in the context, use it automatically for identity-scoped tools
4. For missing optional parameters, use sensible defaults
5. Only ask for clarification if absolutely critical information is missing
6. Be proactive and action-oriented - prefer doing over asking

Available tools: {{tools}}

User ID for this session: {{user_id}}";

/// Rendered system instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInstruction {
    content: String,
}

impl SystemInstruction {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> SystemInstructionBuilder {
        SystemInstructionBuilder::default()
    }

    /// Instruction for the single-shot path without tools.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            content: FALLBACK_SYSTEM_PROMPT.to_owned(),
        }
    }

    /// Returns the textual content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Consumes the instruction, returning its text.
    #[must_use]
    pub fn into_content(self) -> String {
        self.content
    }
}

/// Builder for the tool-aware [`SystemInstruction`].
#[derive(Debug, Default)]
pub struct SystemInstructionBuilder {
    template: Option<String>,
    tools: Vec<String>,
    user: Option<UserId>,
}

impl SystemInstructionBuilder {
    /// Replaces the default template. It may reference `{{tools}}` and
    /// `{{user_id}}`.
    #[must_use]
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Adds a tool name to the advertised list.
    #[must_use]
    pub fn tool(mut self, name: impl Into<String>) -> Self {
        self.tools.push(name.into());
        self
    }

    /// Adds several tool names to the advertised list.
    #[must_use]
    pub fn tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools.extend(names.into_iter().map(Into::into));
        self
    }

    /// Sets the caller identity; absent renders as "not provided".
    #[must_use]
    pub fn user(mut self, user: Option<UserId>) -> Self {
        self.user = user;
        self
    }

    /// Renders the instruction.
    ///
    /// # Errors
    ///
    /// Returns a template error when a custom template is malformed.
    pub fn build(self) -> TemplateResult<SystemInstruction> {
        let template = PromptTemplate::builder(
            self.template.unwrap_or_else(|| TOOL_AWARE_PROMPT.to_owned()),
        )
        .build()?;

        let mut vars = BTreeMap::new();
        vars.insert("tools".to_owned(), self.tools.join(", "));
        vars.insert(
            "user_id".to_owned(),
            self.user
                .as_ref()
                .map_or_else(|| "not provided".to_owned(), ToString::to_string),
        );

        Ok(SystemInstruction {
            content: template.render_with(&vars)?,
        })
    }
}
