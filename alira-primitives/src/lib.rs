//! Core shared types for the Alira tool orchestration runtime.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod function;
mod ids;

/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Provider-facing projection of a tool definition.
pub use function::FunctionSpec;
/// Identifiers for callers and model-issued tool calls.
pub use ids::{ToolCallId, UserId};
