//! Conversation Orchestrator: the two-phase model/tool protocol for one turn.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use alira_adapters::traits::{
    AdapterError, ChatCompletion, ChatMessage, ChatRequest, ModelAdapter, ToolChoice,
};
use alira_config::{CallSiteParams, TurnSettings};
use alira_primitives::{FunctionSpec, UserId};
use alira_prompts::{SystemInstruction, TemplateError, ToolGuide};
use alira_tools::registry::ToolRegistry;
use alira_tools::schema::prepare_tools;
use thiserror::Error;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, warn};

use crate::dispatch::{DispatchExecutor, ToolExecutionResult};
use crate::outcome::{OrchestrationOutcome, TurnData};
use crate::request::MessageRequest;
use crate::sink::{TracingTurnSink, TurnRecord, TurnSink};
use crate::state::{StateError, TurnEvent, TurnMachine};

/// Result alias for turn execution.
pub type TurnResult<T> = Result<T, TurnError>;

/// Model call sites within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    /// Single call without tools.
    Fallback,
    /// First call of the tool path.
    ToolSelection,
    /// Second call of the tool path.
    Synthesis,
}

impl fmt::Display for CallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fallback => "fallback call",
            Self::ToolSelection => "tool selection call",
            Self::Synthesis => "synthesis call",
        })
    }
}

/// Fatal turn failures.
#[derive(Debug, Error)]
pub enum TurnError {
    /// A model call failed; the turn is not retried.
    #[error("model {phase} failed: {source}")]
    ModelCall {
        /// Call site that failed.
        phase: CallPhase,
        /// Adapter failure.
        #[source]
        source: AdapterError,
    },

    /// The turn ran past its deadline.
    #[error("turn exceeded its deadline of {limit:?}")]
    Timeout {
        /// Configured deadline.
        limit: Duration,
    },

    /// The system instruction could not be rendered.
    #[error("failed to render system instruction: {0}")]
    Prompt(#[from] TemplateError),

    /// Internal protocol violation.
    #[error(transparent)]
    State(#[from] StateError),

    /// The orchestrator was configured with unusable turn settings.
    #[error("invalid turn settings: {reason}")]
    Settings {
        /// Validation message.
        reason: String,
    },
}

/// Drives turns against a model adapter and the shared tool registry.
pub struct Orchestrator {
    adapter: Arc<dyn ModelAdapter>,
    tools: Arc<ToolRegistry>,
    settings: TurnSettings,
    sink: Arc<dyn TurnSink>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let metadata = self.adapter.metadata();
        f.debug_struct("Orchestrator")
            .field("provider", &metadata.provider())
            .field("tools", &self.tools.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator that logs outcomes through `tracing`.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::Settings`] when `settings` has an empty default
    /// model or a zero turn timeout.
    pub fn new(
        adapter: Arc<dyn ModelAdapter>,
        tools: Arc<ToolRegistry>,
        settings: TurnSettings,
    ) -> TurnResult<Self> {
        settings.validate().map_err(|err| TurnError::Settings {
            reason: err.to_string(),
        })?;

        Ok(Self {
            adapter,
            tools,
            settings,
            sink: Arc::new(TracingTurnSink),
        })
    }

    /// Replaces the outcome sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn TurnSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the turn settings.
    #[must_use]
    pub fn settings(&self) -> &TurnSettings {
        &self.settings
    }

    /// Collects the registered tools' instructions for operators. The guide
    /// is not part of any conversation.
    #[must_use]
    pub fn tool_guide(&self) -> ToolGuide {
        self.tools
            .list()
            .iter()
            .fold(ToolGuide::new(), |guide, tool| {
                guide.with_tool(tool.name(), tool.instructions())
            })
    }

    /// Runs a validated boundary request and reports the outcome to the sink.
    pub async fn handle(&self, request: &MessageRequest) -> OrchestrationOutcome {
        let started = Instant::now();
        let mut machine = TurnMachine::new();
        let result = self
            .run_turn(
                &mut machine,
                request.message(),
                request.model(),
                Some(request.user_id()),
            )
            .await;

        let record = TurnRecord {
            turn_id: machine.turn_id(),
            elapsed: started.elapsed(),
            outcome: OrchestrationOutcome::from(result),
        };
        self.sink.record(&record);
        record.outcome
    }

    /// Runs one turn. `model` falls back to the configured default; without
    /// `user` nothing is injected into identity-scoped tools.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::ModelCall`] when a model call fails and
    /// [`TurnError::Timeout`] when the turn exceeds its deadline.
    pub async fn run(
        &self,
        message: &str,
        model: Option<&str>,
        user: Option<&UserId>,
    ) -> TurnResult<TurnData> {
        let mut machine = TurnMachine::new();
        self.run_turn(&mut machine, message, model, user).await
    }

    async fn run_turn(
        &self,
        machine: &mut TurnMachine,
        message: &str,
        model: Option<&str>,
        user: Option<&UserId>,
    ) -> TurnResult<TurnData> {
        let model = model.unwrap_or(&self.settings.default_model);
        let limit = self.settings.turn_timeout();
        info!(turn_id = %machine.turn_id(), model, has_user = user.is_some(), "turn started");

        let result = match timeout(limit, self.drive(machine, message, model, user)).await {
            Ok(result) => result,
            Err(_) => Err(TurnError::Timeout { limit }),
        };

        if let Err(err) = &result {
            let state = machine.fail();
            warn!(turn_id = %machine.turn_id(), ?state, error = %err, "turn aborted");
        }
        result
    }

    async fn drive(
        &self,
        machine: &mut TurnMachine,
        message: &str,
        model: &str,
        user: Option<&UserId>,
    ) -> TurnResult<TurnData> {
        let prepared = prepare_tools(&self.tools);
        if prepared.is_empty() {
            machine.transition(TurnEvent::NoUsableTools)?;
            return self.single_shot(machine, message, model).await;
        }

        machine.transition(TurnEvent::ToolsPrepared)?;
        let (specs, tools) = prepared.into_parts();
        let system = SystemInstruction::builder()
            .tools(specs.iter().map(FunctionSpec::name))
            .user(user.cloned())
            .build()?;
        let mut conversation = vec![
            ChatMessage::system(system.into_content()),
            ChatMessage::user(message),
        ];

        machine.transition(TurnEvent::FirstCallSent)?;
        let first = self
            .complete(
                CallPhase::ToolSelection,
                &conversation,
                model,
                self.settings.tool_selection,
                Some((specs.as_slice(), ToolChoice::Auto)),
            )
            .await?;

        let usage = first.usage();
        let reply = first.into_message();
        let calls = reply.tool_calls().to_vec();
        conversation.push(reply);

        if calls.is_empty() {
            machine.transition(TurnEvent::ReplyWithoutTools)?;
            let response = conversation
                .last()
                .and_then(ChatMessage::content)
                .map(str::to_owned);
            machine.transition(TurnEvent::Completed)?;
            return Ok(TurnData::new(response, model, usage, 0, conversation));
        }

        machine.transition(TurnEvent::ReplyWithTools)?;
        debug!(turn_id = %machine.turn_id(), calls = calls.len(), "model requested tools");

        machine.transition(TurnEvent::DispatchStarted)?;
        let results = DispatchExecutor::new(tools).dispatch(&calls, user).await;
        conversation.extend(results.into_iter().map(ToolExecutionResult::into_message));

        machine.transition(TurnEvent::SecondCallSent)?;
        let second = self
            .complete(
                CallPhase::Synthesis,
                &conversation,
                model,
                self.settings.synthesis,
                Some((specs.as_slice(), ToolChoice::None)),
            )
            .await?;

        let usage = second.usage();
        let reply = second.into_message();
        let response = reply.content().map(str::to_owned);
        conversation.push(reply);
        machine.transition(TurnEvent::Completed)?;

        Ok(TurnData::new(
            response,
            model,
            usage,
            calls.len(),
            conversation,
        ))
    }

    async fn single_shot(
        &self,
        machine: &mut TurnMachine,
        message: &str,
        model: &str,
    ) -> TurnResult<TurnData> {
        debug!(turn_id = %machine.turn_id(), "no usable tools; answering directly");
        let mut conversation = vec![
            ChatMessage::system(SystemInstruction::fallback().into_content()),
            ChatMessage::user(message),
        ];

        let completion = self
            .complete(
                CallPhase::Fallback,
                &conversation,
                model,
                self.settings.fallback,
                None,
            )
            .await?;

        let usage = completion.usage();
        let reply = completion.into_message();
        let response = reply.content().map(str::to_owned);
        conversation.push(reply);
        machine.transition(TurnEvent::Completed)?;

        Ok(TurnData::new(response, model, usage, 0, conversation))
    }

    async fn complete(
        &self,
        phase: CallPhase,
        conversation: &[ChatMessage],
        model: &str,
        params: CallSiteParams,
        tools: Option<(&[FunctionSpec], ToolChoice)>,
    ) -> TurnResult<ChatCompletion> {
        let model_call = |source| TurnError::ModelCall { phase, source };

        let mut request = ChatRequest::new(conversation.to_vec())
            .map_err(model_call)?
            .with_model(model);
        if let Some((specs, choice)) = tools {
            request = request.with_tools(specs.to_vec(), choice);
        }
        if let Some(tokens) = params.max_output_tokens {
            request = request.with_max_output_tokens(tokens);
        }
        if let Some(temperature) = params.temperature {
            request = request.with_temperature(temperature);
        }

        debug!(%phase, messages = conversation.len(), "calling model");
        self.adapter.complete(request).await.map_err(model_call)
    }
}
