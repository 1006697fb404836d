use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alira_adapters::traits::{
    AdapterError, AdapterMetadata, AdapterResult, ChatCompletion, ChatMessage, ChatRequest,
    MessageRole, ModelAdapter, ToolCallRequest, ToolChoice, Usage,
};
use alira_config::TurnSettings;
use alira_kernel::{
    CallPhase, CollectingSink, MessageRequest, Orchestrator, PROCESSING_ERROR_MESSAGE, TurnError,
};
use alira_primitives::{ToolCallId, UserId};
use alira_tools::builtin::{WEATHER_TOOL, general_tools};
use alira_tools::credential::{CredentialProvider, StaticCredentials, injected_user_id};
use alira_tools::registry::{ToolDefinition, ToolError, ToolRegistry};
use alira_tools::{ToolSource, discover};
use async_trait::async_trait;
use serde_json::{Value, json};

enum Step {
    Reply(ChatCompletion),
    Fail(AdapterError),
    Slow(Duration, ChatCompletion),
    Hang,
}

struct ScriptedAdapter {
    metadata: AdapterMetadata,
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedAdapter {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            metadata: AdapterMetadata::new("scripted", "scripted-model"),
            script: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelAdapter for ScriptedAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn complete(&self, request: ChatRequest) -> AdapterResult<ChatCompletion> {
        self.requests.lock().unwrap().push(request);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("adapter called more often than scripted");
        match step {
            Step::Reply(completion) => Ok(completion),
            Step::Fail(err) => Err(err),
            Step::Slow(delay, completion) => {
                tokio::time::sleep(delay).await;
                Ok(completion)
            }
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(AdapterError::transport("unreachable"))
            }
        }
    }
}

fn text(content: &str) -> Step {
    Step::Reply(
        ChatCompletion::new(ChatMessage::assistant(content), "scripted-model")
            .unwrap()
            .with_usage(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
    )
}

fn tool_calls(calls: &[(&str, &str, Value)]) -> Step {
    let calls = calls
        .iter()
        .map(|(id, name, args)| {
            ToolCallRequest::new(ToolCallId::new(*id).unwrap(), *name, args.to_string())
        })
        .collect();
    Step::Reply(
        ChatCompletion::new(
            ChatMessage::assistant_tool_calls(None, calls),
            "scripted-model",
        )
        .unwrap(),
    )
}

fn builtin_registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    let source = general_tools();
    let report = discover(&mut registry, [&source as &dyn ToolSource]);
    assert!(report.rejected().is_empty());
    Arc::new(registry)
}

fn calendar_tool(credentials: Arc<StaticCredentials>) -> ToolDefinition {
    ToolDefinition::builder("googleCalendar")
        .description("Manage Google Calendar events")
        .schema(json!({
            "type": "object",
            "properties": { "operation": { "type": "string" } },
            "required": ["operation"]
        }))
        .requires_identity(true)
        .executor(move |args: Value| {
            let credentials = Arc::clone(&credentials);
            async move {
                let user = injected_user_id(&args)?;
                let credential = credentials
                    .credential(&user, "google_calendar")
                    .await?
                    .ok_or_else(|| ToolError::execution("no valid tokens for google_calendar"))?;
                Ok::<_, ToolError>(json!({ "events": [], "token": credential.access_token() }))
            }
        })
        .build()
}

fn orchestrator(adapter: Arc<ScriptedAdapter>, tools: Arc<ToolRegistry>) -> Orchestrator {
    Orchestrator::new(adapter, tools, TurnSettings::default()).unwrap()
}

#[tokio::test]
async fn empty_registry_answers_directly() {
    let adapter = ScriptedAdapter::new(vec![text("Hello there.")]);
    let data = orchestrator(adapter.clone(), Arc::new(ToolRegistry::new()))
        .run("hi", None, None)
        .await
        .unwrap();

    assert_eq!(data.response(), Some("Hello there."));
    assert_eq!(data.function_call_count(), 0);
    assert_eq!(data.model(), "gpt-5-nano");

    let requests = adapter.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert!(request.tools().is_empty());
    assert_eq!(request.tool_choice(), None);
    assert_eq!(request.max_output_tokens(), Some(1000));
    assert_eq!(request.temperature(), Some(0.7));
    assert_eq!(
        request.messages()[0].content(),
        Some("You are a helpful AI assistant. Provide clear, accurate, and helpful responses.")
    );
    assert_eq!(request.messages()[1], ChatMessage::user("hi"));
}

#[tokio::test]
async fn opaque_caller_id_reaches_the_core() {
    let user = UserId::new("u1").unwrap();
    let adapter = ScriptedAdapter::new(vec![text("Hi! How can I help?")]);
    let request = MessageRequest::new("Hello", user).unwrap();
    let outcome = orchestrator(adapter.clone(), Arc::new(ToolRegistry::new()))
        .handle(&request)
        .await;

    let data = outcome.data().unwrap();
    assert_eq!(data.function_call_count(), 0);
    assert_eq!(data.response(), Some("Hi! How can I help?"));
    assert_eq!(adapter.requests().len(), 1);
}

#[tokio::test]
async fn reply_without_tool_calls_finishes_after_one_call() {
    let adapter = ScriptedAdapter::new(vec![text("Nothing to look up.")]);
    let data = orchestrator(adapter.clone(), builtin_registry())
        .run("tell me a joke", Some("gpt-4o-mini"), None)
        .await
        .unwrap();

    assert_eq!(data.response(), Some("Nothing to look up."));
    assert_eq!(data.function_call_count(), 0);
    assert_eq!(data.model(), "gpt-4o-mini");
    assert_eq!(data.usage().map(|u| u.total_tokens), Some(15));

    let requests = adapter.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model(), Some("gpt-4o-mini"));
    assert_eq!(requests[0].tool_choice(), Some(ToolChoice::Auto));
    let system = requests[0].messages()[0].content().unwrap();
    assert!(system.contains("Available tools: getWeather, get_horoscope"));
    assert!(system.ends_with("User ID for this session: not provided"));
}

#[tokio::test]
async fn weather_call_round_trip() {
    let adapter = ScriptedAdapter::new(vec![
        tool_calls(&[("call_1", WEATHER_TOOL, json!({ "location": "Paris" }))]),
        text("It is 22°C and partly cloudy in Paris."),
    ]);
    let data = orchestrator(adapter.clone(), builtin_registry())
        .run("What's the weather in Paris?", None, None)
        .await
        .unwrap();

    assert_eq!(data.function_call_count(), 1);
    assert_eq!(data.response(), Some("It is 22°C and partly cloudy in Paris."));

    let roles: Vec<MessageRole> = data.conversation().iter().map(ChatMessage::role).collect();
    assert_eq!(
        roles,
        [
            MessageRole::System,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::Tool,
            MessageRole::Assistant,
        ]
    );
    let ChatMessage::Tool {
        tool_call_id,
        content,
    } = &data.conversation()[3]
    else {
        panic!("expected tool message");
    };
    assert_eq!(tool_call_id.as_str(), "call_1");
    let payload: Value = serde_json::from_str(content).unwrap();
    assert_eq!(payload["location"], "Paris");
    assert_eq!(payload["weather"]["temperature"], "22°C");

    let requests = adapter.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].tool_choice(), Some(ToolChoice::None));
    assert_eq!(requests[1].tools().len(), 2);
    assert_eq!(requests[1].messages(), &data.conversation()[..4]);
}

#[tokio::test]
async fn unknown_tool_becomes_error_payload() {
    let adapter = ScriptedAdapter::new(vec![
        tool_calls(&[("call_x", "doesNotExist", json!({}))]),
        text("Sorry, I could not do that."),
    ]);
    let data = orchestrator(adapter.clone(), builtin_registry())
        .run("do the impossible", None, None)
        .await
        .unwrap();

    assert_eq!(data.function_call_count(), 1);
    assert_eq!(data.response(), Some("Sorry, I could not do that."));
    let payload: Value =
        serde_json::from_str(data.conversation()[3].content().unwrap()).unwrap();
    assert_eq!(payload, json!({ "error": "tool not found" }));
    assert_eq!(adapter.requests().len(), 2);
}

#[tokio::test]
async fn identity_tool_without_user_reports_missing_tokens() {
    let credentials = Arc::new(StaticCredentials::new());
    let mut registry = ToolRegistry::new();
    registry
        .register(calendar_tool(Arc::clone(&credentials)))
        .unwrap();

    let adapter = ScriptedAdapter::new(vec![
        tool_calls(&[("call_cal", "googleCalendar", json!({ "operation": "list" }))]),
        text("Please connect your calendar first."),
    ]);
    let data = orchestrator(adapter, Arc::new(registry))
        .run("what's on my calendar?", None, None)
        .await
        .unwrap();

    let payload: Value =
        serde_json::from_str(data.conversation()[3].content().unwrap()).unwrap();
    let error = payload["error"].as_str().unwrap();
    assert!(error.starts_with("error executing `googleCalendar`"));
    assert!(error.contains("no valid tokens"));
    assert_eq!(data.function_call_count(), 1);
}

#[tokio::test]
async fn model_cannot_choose_the_caller_identity() {
    let victim = UserId::new("victim").unwrap();
    let credentials = Arc::new(StaticCredentials::new());
    credentials.insert(
        victim.clone(),
        "google_calendar",
        alira_tools::credential::Credential::new("victim-token"),
    );
    let mut registry = ToolRegistry::new();
    registry.register(calendar_tool(credentials)).unwrap();
    let registry = Arc::new(registry);

    let forged = json!({ "operation": "list", "userId": victim.as_str() });
    let adapter = ScriptedAdapter::new(vec![
        tool_calls(&[("call_cal", "googleCalendar", forged.clone())]),
        text("Please connect your calendar first."),
    ]);
    let data = orchestrator(adapter, Arc::clone(&registry))
        .run("list", None, None)
        .await
        .unwrap();
    let payload: Value =
        serde_json::from_str(data.conversation()[3].content().unwrap()).unwrap();
    assert!(payload.get("token").is_none());
    assert!(payload["error"].as_str().unwrap().contains("no valid tokens"));

    let caller = UserId::new("u1").unwrap();
    let adapter = ScriptedAdapter::new(vec![
        tool_calls(&[("call_cal", "googleCalendar", forged)]),
        text("Please connect your calendar first."),
    ]);
    let data = orchestrator(adapter, registry)
        .run("list", None, Some(&caller))
        .await
        .unwrap();
    let payload: Value =
        serde_json::from_str(data.conversation()[3].content().unwrap()).unwrap();
    assert!(payload.get("token").is_none());
    assert!(payload["error"].as_str().unwrap().contains("no valid tokens"));
}

#[tokio::test]
async fn identity_tool_receives_caller() {
    let user = UserId::random();
    let credentials = Arc::new(StaticCredentials::new());
    credentials.insert(
        user.clone(),
        "google_calendar",
        alira_tools::credential::Credential::new("token-123"),
    );
    let mut registry = ToolRegistry::new();
    registry.register(calendar_tool(credentials)).unwrap();

    let adapter = ScriptedAdapter::new(vec![
        tool_calls(&[("call_cal", "googleCalendar", json!({ "operation": "list" }))]),
        text("Your calendar is empty."),
    ]);
    let request = MessageRequest::new("what's on my calendar?", user.clone()).unwrap();
    let sink = CollectingSink::new();
    let outcome = orchestrator(adapter.clone(), Arc::new(registry))
        .with_sink(sink.clone())
        .handle(&request)
        .await;

    assert!(outcome.is_success());
    let data = outcome.data().unwrap();
    let payload: Value =
        serde_json::from_str(data.conversation()[3].content().unwrap()).unwrap();
    assert_eq!(payload["token"], "token-123");

    let system = adapter.requests()[0].messages()[0].content().unwrap().to_owned();
    assert!(system.ends_with(&format!("User ID for this session: {user}")));

    let records = sink.drain();
    assert_eq!(records.len(), 1);
    assert!(records[0].outcome.is_success());
}

#[tokio::test]
async fn first_call_failure_fails_turn() {
    let adapter = ScriptedAdapter::new(vec![Step::Fail(AdapterError::transport(
        "connection reset",
    ))]);
    let orchestrator = orchestrator(adapter.clone(), builtin_registry());

    let err = orchestrator
        .run("weather in Paris?", None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TurnError::ModelCall {
            phase: CallPhase::ToolSelection,
            source: AdapterError::Transport { .. },
        }
    ));
    assert_eq!(adapter.requests().len(), 1);
}

#[tokio::test]
async fn second_call_failure_fails_turn() {
    let adapter = ScriptedAdapter::new(vec![
        tool_calls(&[("call_1", WEATHER_TOOL, json!({ "location": "Paris" }))]),
        Step::Fail(AdapterError::transport("connection reset")),
    ]);
    let orchestrator = orchestrator(adapter.clone(), builtin_registry());

    let err = orchestrator
        .run("weather in Paris?", None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TurnError::ModelCall {
            phase: CallPhase::Synthesis,
            source: AdapterError::Transport { .. },
        }
    ));
    assert_eq!(adapter.requests().len(), 2);
}

#[tokio::test]
async fn second_call_failure_surfaces_without_partial_answer() {
    let adapter = ScriptedAdapter::new(vec![
        tool_calls(&[("call_1", WEATHER_TOOL, json!({ "location": "Paris" }))]),
        Step::Fail(AdapterError::response("upstream returned 502")),
    ]);
    let request = MessageRequest::new("weather in Paris?", UserId::random()).unwrap();
    let outcome = orchestrator(adapter.clone(), builtin_registry())
        .handle(&request)
        .await;

    assert!(!outcome.is_success());
    assert!(outcome.data().is_none());
    let body = serde_json::to_value(&outcome).unwrap();
    assert_eq!(body["success"], false);
    assert!(body.get("data").is_none());
    assert!(body["error"]["details"].as_str().unwrap().contains("synthesis call"));
    assert_eq!(adapter.requests().len(), 2);
}

#[tokio::test]
async fn failed_turn_maps_to_processing_error() {
    let adapter = ScriptedAdapter::new(vec![Step::Fail(AdapterError::RateLimited {
        retry_after: Some(Duration::from_secs(3)),
    })]);
    let sink = CollectingSink::new();
    let request = MessageRequest::new("hello", UserId::random()).unwrap();
    let outcome = orchestrator(adapter.clone(), builtin_registry())
        .with_sink(sink.clone())
        .handle(&request)
        .await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
    let error = outcome.error().unwrap();
    assert_eq!(error.message(), PROCESSING_ERROR_MESSAGE);
    assert!(error.details().unwrap().contains("rate limited"));

    let body = serde_json::to_value(&outcome).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(adapter.requests().len(), 1);
    assert_eq!(sink.drain().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn turn_deadline_cancels_model_call() {
    let adapter = ScriptedAdapter::new(vec![Step::Hang]);
    let settings = TurnSettings::default().with_turn_timeout(Duration::from_secs(5));
    let orchestrator = Orchestrator::new(adapter.clone(), builtin_registry(), settings).unwrap();

    let err = orchestrator.run("slow", None, None).await.unwrap_err();
    assert!(matches!(err, TurnError::Timeout { limit } if limit == Duration::from_secs(5)));
    assert_eq!(adapter.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn sub_second_deadline_allows_fast_calls() {
    let completion = ChatCompletion::new(ChatMessage::assistant("quick"), "scripted-model").unwrap();
    let adapter = ScriptedAdapter::new(vec![Step::Slow(Duration::from_millis(10), completion)]);
    let settings = TurnSettings::default().with_turn_timeout(Duration::from_millis(500));
    let orchestrator =
        Orchestrator::new(adapter, Arc::new(ToolRegistry::new()), settings).unwrap();

    let data = orchestrator.run("fast", None, None).await.unwrap();
    assert_eq!(data.response(), Some("quick"));
}

#[test]
fn zero_deadline_is_rejected_up_front() {
    let adapter = ScriptedAdapter::new(Vec::new());
    let settings = TurnSettings::default().with_turn_timeout(Duration::ZERO);
    let err = Orchestrator::new(adapter, builtin_registry(), settings).unwrap_err();
    assert!(matches!(err, TurnError::Settings { .. }));
}

#[tokio::test]
async fn tool_guidance_stays_out_of_the_conversation() {
    let adapter = ScriptedAdapter::new(vec![text("Sure.")]);
    let orchestrator = orchestrator(adapter.clone(), builtin_registry());

    let guide = orchestrator.tool_guide();
    let weather = guide.for_tool(WEATHER_TOOL).unwrap().to_owned();
    assert!(guide.render().contains(&weather));

    orchestrator.run("hello", None, None).await.unwrap();
    let requests = adapter.requests();
    assert!(
        requests[0]
            .messages()
            .iter()
            .filter_map(ChatMessage::content)
            .all(|content| !content.contains(&weather))
    );
}
