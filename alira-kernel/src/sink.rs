//! Observers notified when a turn finishes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::outcome::OrchestrationOutcome;

/// Summary handed to sinks once a turn is over.
#[derive(Debug, Clone)]
pub struct TurnRecord {
    /// Turn correlation id.
    pub turn_id: Uuid,
    /// How long the turn ran.
    pub elapsed: Duration,
    /// Result returned to the caller.
    pub outcome: OrchestrationOutcome,
}

/// Observer trait used to capture turn outcomes (logging, metrics, tests).
pub trait TurnSink: Send + Sync {
    /// Records a finished turn.
    fn record(&self, record: &TurnRecord);
}

/// Sink that logs through `tracing`.
#[derive(Debug, Default)]
pub struct TracingTurnSink;

impl TurnSink for TracingTurnSink {
    fn record(&self, record: &TurnRecord) {
        let elapsed_ms = u64::try_from(record.elapsed.as_millis()).unwrap_or(u64::MAX);
        match &record.outcome {
            OrchestrationOutcome::Success(data) => info!(
                turn_id = %record.turn_id,
                elapsed_ms,
                model = data.model(),
                function_calls = data.function_call_count(),
                total_tokens = data.usage().map(|usage| usage.total_tokens),
                "turn completed"
            ),
            OrchestrationOutcome::Failure(info) => warn!(
                turn_id = %record.turn_id,
                elapsed_ms,
                details = info.details().unwrap_or_default(),
                "turn failed"
            ),
        }
    }
}

/// Sink used during testing to capture records.
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Mutex<Vec<TurnRecord>>,
}

impl CollectingSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Removes and returns the collected records.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex has been poisoned by a previous panic.
    #[must_use]
    pub fn drain(&self) -> Vec<TurnRecord> {
        let mut records = self.records.lock().expect("collecting sink poisoned");
        records.drain(..).collect()
    }
}

impl TurnSink for CollectingSink {
    fn record(&self, record: &TurnRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}
