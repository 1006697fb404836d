//! `OpenAI` chat-completions adapter with function calling.

use std::{env, fmt, time::Duration};

use alira_primitives::FunctionSpec;
use async_trait::async_trait;
use hyper::body::to_bytes;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, RETRY_AFTER};
use hyper::{Body, Request, StatusCode, Uri};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::http_client::{HyperClient, endpoint, https_client};
use crate::traits::{
    AdapterError, AdapterMetadata, AdapterResult, ChatCompletion, ChatMessage, ChatRequest,
    ModelAdapter, ToolCallRequest, ToolChoice, Usage,
};

/// Environment variable used when loading configuration automatically.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/";

const CHAT_COMPLETIONS_PATH: &str = "v1/chat/completions";
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Configuration for the `OpenAI` adapter.
#[derive(Clone)]
pub struct OpenAiConfig {
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("has_api_key", &self.api_key.is_some())
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiConfig {
    /// Creates a configuration using the supplied default model identifier.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            api_key: None,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Loads the API key from the `OPENAI_API_KEY` environment variable.
    #[must_use]
    pub fn from_env(model: impl Into<String>) -> Self {
        Self::from_env_var(model, OPENAI_API_KEY_ENV)
    }

    /// Loads the API key from the named environment variable.
    #[must_use]
    pub fn from_env_var(model: impl Into<String>, var: &str) -> Self {
        let mut cfg = Self::new(model);
        cfg.api_key = env::var(var).ok().filter(|key| !key.trim().is_empty());
        cfg
    }

    /// Overrides the base URL used for API calls.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the supplied URL is invalid.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> AdapterResult<Self> {
        self.base_url = sanitize_base_url(base_url.as_ref())?;
        Ok(self)
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Supplies an explicit API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// `OpenAI` adapter that calls the chat-completions API over HTTPS.
pub struct OpenAiAdapter {
    client: HyperClient,
    endpoint: Uri,
    metadata: AdapterMetadata,
    api_key: String,
    timeout: Duration,
}

impl fmt::Debug for OpenAiAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiAdapter")
            .field("model", &self.metadata.model())
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl OpenAiAdapter {
    /// Constructs a new adapter with the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the API key is missing or
    /// the endpoint cannot be parsed.
    pub fn new(config: OpenAiConfig) -> AdapterResult<Self> {
        let api_key = config
            .api_key
            .ok_or_else(|| AdapterError::configuration("OpenAI adapter requires an API key"))?;

        let metadata = AdapterMetadata::new("openai", config.model);
        let endpoint = endpoint(&config.base_url, CHAT_COMPLETIONS_PATH)?;

        Ok(Self {
            client: https_client(POOL_IDLE_TIMEOUT),
            endpoint,
            metadata,
            api_key,
            timeout: config.timeout,
        })
    }

    fn build_request<'a>(&'a self, request: &'a ChatRequest) -> CompletionPayload<'a> {
        CompletionPayload {
            model: request.model().unwrap_or_else(|| self.metadata.model()),
            messages: request.messages(),
            tools: request.tools().iter().map(FunctionTool::new).collect(),
            tool_choice: request.tool_choice(),
            max_tokens: request.max_output_tokens(),
            temperature: request.temperature(),
        }
    }
}

#[async_trait]
impl ModelAdapter for OpenAiAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn complete(&self, request: ChatRequest) -> AdapterResult<ChatCompletion> {
        let payload = self.build_request(&request);
        let body = serde_json::to_vec(&payload).map_err(|err| {
            AdapterError::invalid_request(format!("failed to encode OpenAI request: {err}"))
        })?;
        debug!(
            model = payload.model,
            messages = payload.messages.len(),
            tools = payload.tools.len(),
            "sending chat completion"
        );

        let http_request = Request::post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .body(Body::from(body))
            .map_err(|err| {
                AdapterError::transport(format!("failed to build OpenAI request: {err}"))
            })?;

        let response = timeout(self.timeout, self.client.request(http_request))
            .await
            .map_err(|_| AdapterError::transport("OpenAI request timed out"))?
            .map_err(|err| AdapterError::transport(format!("OpenAI request failed: {err}")))?;

        let status = response.status();
        let retry_after = retry_after(response.headers());
        let bytes = to_bytes(response.into_body()).await.map_err(|err| {
            AdapterError::transport(format!("failed to read OpenAI response: {err}"))
        })?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(?retry_after, "OpenAI rate limited the request");
            return Err(AdapterError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let reason = String::from_utf8_lossy(&bytes);
            return Err(AdapterError::response(format!(
                "OpenAI returned {status}: {reason}"
            )));
        }

        decode_completion(&bytes)
    }
}

#[derive(Serialize)]
struct CompletionPayload<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<FunctionTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct FunctionTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a FunctionSpec,
}

impl<'a> FunctionTool<'a> {
    const fn new(function: &'a FunctionSpec) -> Self {
        Self {
            kind: "function",
            function,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallRequest>>,
}

fn decode_completion(bytes: &[u8]) -> AdapterResult<ChatCompletion> {
    let response: CompletionResponse = serde_json::from_slice(bytes).map_err(|err| {
        AdapterError::response(format!("failed to decode OpenAI response: {err}"))
    })?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AdapterError::response("OpenAI response contained no choices"))?;

    let message = ChatMessage::assistant_tool_calls(
        choice.message.content,
        choice.message.tool_calls.unwrap_or_default(),
    );
    let completion = ChatCompletion::new(message, response.model)?;
    Ok(match response.usage {
        Some(usage) => completion.with_usage(usage),
        None => completion,
    })
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn sanitize_base_url(input: &str) -> AdapterResult<String> {
    let mut base = input.trim().to_owned();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(AdapterError::configuration(
            "OpenAI base URL must start with http:// or https://",
        ));
    }
    if !base.ends_with('/') {
        base.push('/');
    }
    base.parse::<Uri>()
        .map_err(|err| AdapterError::configuration(format!("invalid OpenAI base URL: {err}")))?;
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    use alira_primitives::ToolCallId;
    use hyper::header::HeaderValue;
    use serde_json::{Value, json};

    fn adapter() -> OpenAiAdapter {
        OpenAiAdapter::new(OpenAiConfig::new("gpt-5-nano").with_api_key("test_key"))
            .expect("adapter")
    }

    #[test]
    fn base_url_requires_scheme() {
        let err = OpenAiConfig::new("gpt-5-nano")
            .with_base_url("api.openai.com")
            .expect_err("missing scheme should error");

        assert!(matches!(err, AdapterError::Configuration { .. }));
    }

    #[test]
    fn sanitize_appends_trailing_slash() {
        let cfg = OpenAiConfig::new("gpt-5-nano")
            .with_base_url("https://example.com/openai")
            .expect("valid URL");
        assert_eq!(cfg.base_url, "https://example.com/openai/");
    }

    #[test]
    fn missing_api_key_is_configuration_error() {
        let err = OpenAiAdapter::new(OpenAiConfig::new("gpt-5-nano")).unwrap_err();
        assert!(matches!(err, AdapterError::Configuration { .. }));
    }

    #[test]
    fn payload_carries_tools_and_choice() {
        let adapter = adapter();
        let spec = FunctionSpec::new(
            "getWeather",
            "Get weather",
            json!({ "type": "object", "properties": {} }),
        );
        let request = ChatRequest::new(vec![
            ChatMessage::system("system"),
            ChatMessage::user("hello"),
        ])
        .unwrap()
        .with_tools(vec![spec], ToolChoice::Auto);

        let payload = serde_json::to_value(adapter.build_request(&request)).unwrap();
        assert_eq!(payload["model"], "gpt-5-nano");
        assert_eq!(payload["messages"][1], json!({ "role": "user", "content": "hello" }));
        assert_eq!(payload["tools"][0]["type"], "function");
        assert_eq!(payload["tools"][0]["function"]["name"], "getWeather");
        assert_eq!(payload["tool_choice"], "auto");
        assert_eq!(payload.get("temperature"), None);
    }

    #[test]
    fn payload_uses_request_model_and_sampling() {
        let adapter = adapter();
        let request = ChatRequest::new(vec![ChatMessage::user("hello")])
            .unwrap()
            .with_model("gpt-4o-mini")
            .with_max_output_tokens(1000)
            .with_temperature(0.5);

        let payload = serde_json::to_value(adapter.build_request(&request)).unwrap();
        assert_eq!(payload["model"], "gpt-4o-mini");
        assert_eq!(payload["max_tokens"], 1000);
        assert_eq!(payload["temperature"], 0.5);
        assert_eq!(payload.get("tools"), None);
        assert_eq!(payload.get("tool_choice"), None);
    }

    #[test]
    fn decodes_tool_calls_and_usage() {
        let body = json!({
            "model": "gpt-5-nano-2025",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": { "name": "getWeather", "arguments": "{\"location\":\"Paris\"}" }
                    }]
                }
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19 }
        });

        let completion = decode_completion(body.to_string().as_bytes()).unwrap();
        assert_eq!(completion.model(), "gpt-5-nano-2025");
        assert_eq!(completion.usage().map(|u| u.total_tokens), Some(19));
        let calls = completion.message().tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id(), &ToolCallId::new("call_abc").unwrap());
        assert_eq!(calls[0].function_name(), "getWeather");
        let args: Value = serde_json::from_str(calls[0].arguments()).unwrap();
        assert_eq!(args["location"], "Paris");
    }

    #[test]
    fn decodes_plain_text() {
        let body = r#"{ "choices": [ { "message": { "content": "hi" } } ] }"#;
        let completion = decode_completion(body.as_bytes()).unwrap();
        assert_eq!(completion.message().content(), Some("hi"));
        assert!(completion.message().tool_calls().is_empty());
        assert!(completion.usage().is_none());
    }

    #[test]
    fn null_tool_calls_mean_none() {
        let body = r#"{ "choices": [ { "message": { "content": "hi", "tool_calls": null } } ] }"#;
        let completion = decode_completion(body.as_bytes()).unwrap();
        assert_eq!(completion.message().content(), Some("hi"));
        assert!(completion.message().tool_calls().is_empty());
    }

    #[test]
    fn empty_choices_is_response_error() {
        let err = decode_completion(br#"{ "choices": [] }"#).unwrap_err();
        assert!(matches!(err, AdapterError::Response { .. }));
    }

    #[test]
    fn parses_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(12)));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(retry_after(&headers), None);
    }
}
