//! Model adapters used by the Alira turn orchestrator.
//!
//! Providers implement the [`traits::ModelAdapter`] contract: one chat
//! completion per call, with optional function calling.

#![warn(missing_docs, clippy::pedantic)]

pub mod openai;
pub mod traits;

mod http_client;

pub use openai::{OpenAiAdapter, OpenAiConfig};
pub use traits::{
    AdapterError, AdapterMetadata, AdapterResult, ChatCompletion, ChatMessage, ChatRequest,
    MessageRole, ModelAdapter, ToolCallRequest, ToolChoice, Usage,
};
