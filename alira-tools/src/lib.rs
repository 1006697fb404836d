//! Tool registration, discovery, and projection into function specs.
//!
//! Tools are validated once when they enter the [`ToolRegistry`]. Each turn
//! projects the registry into provider-facing function specs via
//! [`prepare_tools`], and identity-scoped tools resolve caller credentials
//! through the [`credential`] contracts.

#![warn(missing_docs, clippy::pedantic)]

pub mod builtin;
pub mod credential;
pub mod discovery;
pub mod registry;
pub mod schema;

pub use discovery::{DiscoveryReport, StaticSource, ToolSource, discover};
pub use registry::{
    Tool, ToolDefinition, ToolDefinitionBuilder, ToolError, ToolFuture, ToolRegistry, ToolResult,
};
pub use schema::{PreparedTools, prepare_tools};
