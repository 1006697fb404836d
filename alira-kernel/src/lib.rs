//! Turn orchestration kernel.
//!
//! A turn takes one user message through the two-phase function-calling
//! protocol: advertise the registered tools, let the model pick calls,
//! dispatch them sequentially, then ask the model for the final answer with
//! tools disabled. When no tool is usable the turn degrades to a single
//! completion.

#![warn(missing_docs, clippy::pedantic)]

pub mod dispatch;
pub mod orchestrator;
pub mod outcome;
pub mod request;
pub mod sink;
pub mod state;

pub use dispatch::{DispatchExecutor, TOOL_NOT_FOUND, ToolExecutionResult, ToolOutcome};
pub use orchestrator::{CallPhase, Orchestrator, TurnError, TurnResult};
pub use outcome::{FailureInfo, OrchestrationOutcome, PROCESSING_ERROR_MESSAGE, TurnData};
pub use request::{FieldError, MAX_MESSAGE_CHARS, MessageRequest, RequestError};
pub use sink::{CollectingSink, TracingTurnSink, TurnRecord, TurnSink};
pub use state::{StateError, StateResult, TurnEvent, TurnMachine, TurnState};
