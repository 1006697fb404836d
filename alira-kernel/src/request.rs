//! Inbound `message-llm` request validation.

use alira_primitives::UserId;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use uuid::Uuid;

/// Maximum message length in characters.
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// A validated turn request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRequest {
    message: String,
    user_id: UserId,
    model: Option<String>,
}

/// One rejected request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Offending field, as named on the wire.
    pub field: String,
    /// Human-readable message.
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_owned(),
            message: message.into(),
        }
    }
}

/// Boundary validation failure. Never reaches the orchestrator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    /// The body is not a JSON object.
    #[error("request body is malformed: {reason}")]
    Malformed {
        /// Decoder message.
        reason: String,
    },

    /// One or more fields failed validation.
    #[error("invalid request data ({} field errors)", .details.len())]
    Invalid {
        /// Per-field failures.
        details: Vec<FieldError>,
    },
}

impl RequestError {
    /// HTTP status the boundary answers with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    /// Response body describing the failure.
    #[must_use]
    pub fn to_body(&self) -> Value {
        let details = match self {
            Self::Malformed { reason } => vec![FieldError::new("body", reason.clone())],
            Self::Invalid { details } => details.clone(),
        };
        json!({
            "error": "Validation Error",
            "message": "Invalid request data",
            "details": details,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    message: Option<Value>,
    user_id: Option<Value>,
    model: Option<Value>,
}

impl MessageRequest {
    /// Validates a request built in code.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Invalid`] when the message is empty or longer
    /// than [`MAX_MESSAGE_CHARS`].
    pub fn new(message: impl Into<String>, user_id: UserId) -> Result<Self, RequestError> {
        let message = message.into();
        if let Some(problem) = message_problem(&message) {
            return Err(RequestError::Invalid {
                details: vec![FieldError::new("message", problem)],
            });
        }

        Ok(Self {
            message,
            user_id,
            model: None,
        })
    }

    /// Requests a specific model instead of the configured default.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Decodes and validates a JSON body `{message, userId, model?}`.
    ///
    /// All field problems are reported together.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Malformed`] when the body is not a JSON object
    /// and [`RequestError::Invalid`] when any field fails validation.
    pub fn from_json(body: &[u8]) -> Result<Self, RequestError> {
        let wire: WireRequest =
            serde_json::from_slice(body).map_err(|err| RequestError::Malformed {
                reason: err.to_string(),
            })?;

        let mut details = Vec::new();

        let message = match wire.message {
            Some(Value::String(message)) => match message_problem(&message) {
                Some(problem) => {
                    details.push(FieldError::new("message", problem));
                    None
                }
                None => Some(message),
            },
            Some(_) => {
                details.push(FieldError::new("message", "Message must be a string"));
                None
            }
            None => {
                details.push(FieldError::new("message", "Message is required"));
                None
            }
        };

        let user_id = match wire.user_id {
            Some(Value::String(raw)) if is_accepted_user_id(&raw) => UserId::new(raw).ok(),
            Some(Value::String(_)) => {
                details.push(FieldError::new(
                    "userId",
                    "User ID must be a valid UUID or MongoDB ObjectId",
                ));
                None
            }
            Some(_) => {
                details.push(FieldError::new("userId", "User ID must be a string"));
                None
            }
            None => {
                details.push(FieldError::new("userId", "User ID is required"));
                None
            }
        };

        let model = match wire.model {
            None | Some(Value::Null) => None,
            Some(Value::String(model)) if !model.trim().is_empty() => Some(model),
            Some(_) => {
                details.push(FieldError::new("model", "Model must be a non-empty string"));
                None
            }
        };

        match (message, user_id) {
            (Some(message), Some(user_id)) if details.is_empty() => Ok(Self {
                message,
                user_id,
                model,
            }),
            _ => Err(RequestError::Invalid { details }),
        }
    }

    /// Returns the user message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the caller identity.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns the requested model, if any.
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

const OBJECT_ID_LEN: usize = 24;

/// Boundary identity format: a hyphenated UUID or a 24 digit hex object id.
fn is_accepted_user_id(value: &str) -> bool {
    let is_uuid = value.len() == 36 && Uuid::parse_str(value).is_ok();
    let is_object_id =
        value.len() == OBJECT_ID_LEN && value.chars().all(|c| c.is_ascii_hexdigit());
    is_uuid || is_object_id
}

fn message_problem(message: &str) -> Option<&'static str> {
    if message.trim().is_empty() {
        return Some("Message is required");
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Some("Message cannot exceed 1000 characters");
    }
    None
}
