//! Structured turn results returned to the boundary.

use alira_adapters::traits::{ChatMessage, Usage};
use chrono::{DateTime, SecondsFormat, Utc};
use http::StatusCode;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::orchestrator::TurnError;

/// Message reported for every processing failure.
pub const PROCESSING_ERROR_MESSAGE: &str = "An error occurred while processing the message";

/// Data produced by a successful turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnData {
    response: Option<String>,
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<Usage>,
    function_call_count: usize,
    conversation: Vec<ChatMessage>,
    #[serde(serialize_with = "rfc3339")]
    timestamp: DateTime<Utc>,
}

impl TurnData {
    pub(crate) fn new(
        response: Option<String>,
        model: impl Into<String>,
        usage: Option<Usage>,
        function_call_count: usize,
        conversation: Vec<ChatMessage>,
    ) -> Self {
        Self {
            response,
            model: model.into(),
            usage,
            function_call_count,
            conversation,
            timestamp: Utc::now(),
        }
    }

    /// Returns the final answer text, if the model produced one.
    #[must_use]
    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }

    /// Returns the model the turn ran against.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns usage from the call that produced the answer.
    #[must_use]
    pub const fn usage(&self) -> Option<Usage> {
        self.usage
    }

    /// Returns the number of tool calls dispatched.
    #[must_use]
    pub const fn function_call_count(&self) -> usize {
        self.function_call_count
    }

    /// Returns the full ordered conversation.
    #[must_use]
    pub fn conversation(&self) -> &[ChatMessage] {
        &self.conversation
    }

    /// Returns when the turn completed.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Failure description surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureInfo {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl FailureInfo {
    /// Returns the caller-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns diagnostic details, if any.
    #[must_use]
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }
}

impl From<&TurnError> for FailureInfo {
    fn from(err: &TurnError) -> Self {
        Self {
            message: PROCESSING_ERROR_MESSAGE.to_owned(),
            details: Some(err.to_string()),
        }
    }
}

/// Result of one turn: `{success, data}` or `{success, error}` on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestrationOutcome {
    /// The turn produced an answer.
    Success(TurnData),
    /// The turn failed.
    Failure(FailureInfo),
}

impl OrchestrationOutcome {
    /// Returns `true` for a successful turn.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the turn data of a successful turn.
    #[must_use]
    pub const fn data(&self) -> Option<&TurnData> {
        match self {
            Self::Success(data) => Some(data),
            Self::Failure(_) => None,
        }
    }

    /// Returns the failure of an unsuccessful turn.
    #[must_use]
    pub const fn error(&self) -> Option<&FailureInfo> {
        match self {
            Self::Success(_) => None,
            Self::Failure(info) => Some(info),
        }
    }

    /// HTTP status the boundary answers with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Success(_) => StatusCode::OK,
            Self::Failure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Result<TurnData, TurnError>> for OrchestrationOutcome {
    fn from(result: Result<TurnData, TurnError>) -> Self {
        match result {
            Ok(data) => Self::Success(data),
            Err(err) => Self::Failure(FailureInfo::from(&err)),
        }
    }
}

impl Serialize for OrchestrationOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("OrchestrationOutcome", 2)?;
        match self {
            Self::Success(data) => {
                state.serialize_field("success", &true)?;
                state.serialize_field("data", data)?;
            }
            Self::Failure(info) => {
                state.serialize_field("success", &false)?;
                state.serialize_field("error", info)?;
            }
        }
        state.end()
    }
}

fn rfc3339<S: Serializer>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
}
