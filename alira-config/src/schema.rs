//! Strongly typed configuration schemas.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default model used when a request does not name one.
pub const DEFAULT_MODEL: &str = "gpt-5-nano";

/// Default per-turn deadline in seconds.
pub const DEFAULT_TURN_TIMEOUT_SECS: u64 = 120;

/// Default tracing filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Top-level runtime configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AliraConfig {
    /// Orchestration settings.
    pub turn: TurnSettings,
    /// `OpenAI` provider settings.
    pub openai: OpenAiSettings,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for AliraConfig {
    fn default() -> Self {
        Self {
            turn: TurnSettings::default(),
            openai: OpenAiSettings::default(),
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
        }
    }
}

/// Sampling parameters fixed for one model call site.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CallSiteParams {
    /// Output token cap; provider default when absent.
    pub max_output_tokens: Option<u32>,
    /// Sampling temperature; provider default when absent.
    pub temperature: Option<f32>,
}

impl CallSiteParams {
    /// Parameters left entirely to the provider.
    #[must_use]
    pub const fn provider_defaults() -> Self {
        Self {
            max_output_tokens: None,
            temperature: None,
        }
    }
}

/// Settings governing one orchestration turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TurnSettings {
    /// Model used when the request omits one.
    pub default_model: String,
    /// Deadline for the whole turn; `turn_timeout_secs` on the wire, where
    /// fractional seconds are accepted.
    #[serde(rename = "turn_timeout_secs", with = "seconds")]
    pub turn_timeout: Duration,
    /// Single-shot call used when no tool is usable.
    pub fallback: CallSiteParams,
    /// First call of the tool path (tool choice `auto`).
    pub tool_selection: CallSiteParams,
    /// Second call of the tool path (tool choice `none`).
    pub synthesis: CallSiteParams,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_owned(),
            turn_timeout: Duration::from_secs(DEFAULT_TURN_TIMEOUT_SECS),
            fallback: CallSiteParams {
                max_output_tokens: Some(1000),
                temperature: Some(0.7),
            },
            tool_selection: CallSiteParams::provider_defaults(),
            synthesis: CallSiteParams::provider_defaults(),
        }
    }
}

impl TurnSettings {
    /// Returns the turn deadline.
    #[must_use]
    pub const fn turn_timeout(&self) -> Duration {
        self.turn_timeout
    }

    /// Sets the turn deadline. Sub-second precision is kept.
    #[must_use]
    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }

    /// Sets the default model.
    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }
}

/// Connection settings for the `OpenAI` adapter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpenAiSettings {
    /// API root, e.g. `https://api.openai.com/`.
    pub base_url: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_secs: u64,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/".to_owned(),
            timeout_secs: 60,
            api_key_env: "OPENAI_API_KEY".to_owned(),
        }
    }
}

impl OpenAiSettings {
    /// Returns the per-request HTTP timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

mod seconds {
    use std::time::Duration;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        if value.subsec_nanos() == 0 {
            serializer.serialize_u64(value.as_secs())
        } else {
            serializer.serialize_f64(value.as_secs_f64())
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
