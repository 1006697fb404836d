//! Prompt construction for Alira turns.
//!
//! [`template`] provides `{{variable}}` substitution; [`system`] builds the
//! system instruction that opens every conversation. [`guide`] collects
//! per-tool instructions for operators.

#![warn(missing_docs, clippy::pedantic)]

pub mod guide;
pub mod system;
pub mod template;

pub use guide::{GUIDE_PREAMBLE, ToolGuide};
pub use system::{FALLBACK_SYSTEM_PROMPT, SystemInstruction, SystemInstructionBuilder};
pub use template::{PromptTemplate, TemplateBuilder, TemplateError, TemplateResult};
