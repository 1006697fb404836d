//! Per-turn state machine.

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// States a turn occupies while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Turn created; tools not yet projected.
    Init,
    /// At least one function spec is available.
    ToolsPrepared,
    /// First model call in flight (tool choice `auto`).
    ModelCall1,
    /// The first reply answered without requesting tools.
    NoToolsRequested,
    /// The first reply requested tool invocations.
    ToolsRequested,
    /// Requested tools are being executed.
    Dispatch,
    /// Second model call in flight (tool choice `none`).
    ModelCall2,
    /// Single model call without tools.
    FallbackSingleCall,
    /// Turn produced an answer.
    Done,
    /// Turn aborted by a model failure or the deadline.
    Failed,
}

impl TurnState {
    /// Returns `true` once the turn can no longer change state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Events that drive [`TurnState`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    /// Function specs were built and at least one survived.
    ToolsPrepared,
    /// No tool is usable for this turn.
    NoUsableTools,
    /// The first model call was issued.
    FirstCallSent,
    /// The first reply carried no tool calls.
    ReplyWithoutTools,
    /// The first reply carried tool calls.
    ReplyWithTools,
    /// Tool dispatch began.
    DispatchStarted,
    /// The second model call was issued.
    SecondCallSent,
    /// The final answer is available.
    Completed,
    /// The turn failed.
    Fail,
}

/// Errors emitted by the turn state machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    /// Transition was not permitted from the current state.
    #[error("invalid turn transition from {from:?} via {event:?} in turn {turn_id}")]
    InvalidTransition {
        /// Turn whose transition failed.
        turn_id: Uuid,
        /// State prior to the attempted transition.
        from: TurnState,
        /// Event that triggered the failure.
        event: TurnEvent,
    },
}

/// Result alias used for state machine operations.
pub type StateResult<T> = Result<T, StateError>;

/// Tracks the state of a single turn.
#[derive(Debug, Clone, Copy)]
pub struct TurnMachine {
    turn_id: Uuid,
    state: TurnState,
}

impl Default for TurnMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnMachine {
    /// Starts a machine in [`TurnState::Init`] with a fresh turn id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            state: TurnState::Init,
        }
    }

    /// Returns the identifier used to correlate this turn's logs.
    #[must_use]
    pub const fn turn_id(&self) -> Uuid {
        self.turn_id
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> TurnState {
        self.state
    }

    /// Applies an event, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidTransition`] when the event is not allowed
    /// from the current state.
    pub fn transition(&mut self, event: TurnEvent) -> StateResult<TurnState> {
        use TurnEvent as E;
        use TurnState as S;

        let next = match (self.state, event) {
            (S::Init, E::ToolsPrepared) => Some(S::ToolsPrepared),
            (S::Init, E::NoUsableTools) => Some(S::FallbackSingleCall),
            (S::ToolsPrepared, E::FirstCallSent) => Some(S::ModelCall1),
            (S::ModelCall1, E::ReplyWithoutTools) => Some(S::NoToolsRequested),
            (S::ModelCall1, E::ReplyWithTools) => Some(S::ToolsRequested),
            (S::ToolsRequested, E::DispatchStarted) => Some(S::Dispatch),
            (S::Dispatch, E::SecondCallSent) => Some(S::ModelCall2),
            (S::NoToolsRequested | S::ModelCall2 | S::FallbackSingleCall, E::Completed) => {
                Some(S::Done)
            }
            (state, E::Fail) if !state.is_terminal() => Some(S::Failed),
            _ => None,
        };

        let Some(next_state) = next else {
            return Err(StateError::InvalidTransition {
                turn_id: self.turn_id,
                from: self.state,
                event,
            });
        };

        debug!(
            turn_id = %self.turn_id,
            from = ?self.state,
            to = ?next_state,
            ?event,
            "turn transition"
        );
        self.state = next_state;
        Ok(next_state)
    }

    /// Moves a live turn to [`TurnState::Failed`]; terminal turns are left
    /// untouched.
    pub fn fail(&mut self) -> TurnState {
        if !self.state.is_terminal() {
            self.state = TurnState::Failed;
            debug!(turn_id = %self.turn_id, "turn failed");
        }
        self.state
    }
}
