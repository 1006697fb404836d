//! Operator-facing digest of per-tool usage guidance.
//!
//! Tools may carry prose instructions next to their schema. The guide
//! collects them for people operating the runtime; turns never send it to the
//! model.

use std::collections::BTreeMap;

/// Preamble every rendered guide starts with.
pub const GUIDE_PREAMBLE: &str = "Alira answers questions and acts on the user's behalf through tools.

Principles:
- pick the most specific tool for the task
- explain what a tool did when it changes something
- ask for clarification only when a required detail is missing
- treat user data as private";

/// Instructions gathered per tool, ordered by tool name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolGuide {
    entries: BTreeMap<String, String>,
}

impl ToolGuide {
    /// Creates an empty guide.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name`'s instructions. Tools without guidance are skipped.
    #[must_use]
    pub fn with_tool(mut self, name: impl Into<String>, instructions: Option<&str>) -> Self {
        if let Some(text) = instructions.map(str::trim).filter(|text| !text.is_empty()) {
            self.entries.insert(name.into(), text.to_owned());
        }
        self
    }

    /// Returns the instructions recorded for `name`.
    #[must_use]
    pub fn for_tool(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Returns the tool names that carry instructions.
    pub fn tools(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns `true` when no tool contributed instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the preamble followed by every tool's instructions.
    #[must_use]
    pub fn render(&self) -> String {
        Self::render_sections(self.entries.iter())
    }

    /// Renders the preamble followed by the instructions of `names` only,
    /// in the order given. Unknown names are ignored.
    #[must_use]
    pub fn render_for<'a, I>(&self, names: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::render_sections(
            names
                .into_iter()
                .filter_map(|name| self.entries.get_key_value(name)),
        )
    }

    fn render_sections<'a>(sections: impl Iterator<Item = (&'a String, &'a String)>) -> String {
        let mut out = GUIDE_PREAMBLE.to_owned();
        for (name, text) in sections {
            out.push_str("\n\n");
            out.push_str(name);
            out.push_str(":\n");
            out.push_str(text);
        }
        out
    }
}
