//! The combat orchestrator: sequences one encounter run and emits an
//! ordered event stream.
//!
//! One run owns one encounter record. The run executes in its own task
//! and always finishes server-side, even if the consumer walks away:
//! the transcript must be persisted exactly once, and a reconnecting
//! client re-fetches it instead of re-triggering a run.

use crate::encounter::{EncounterId, EncounterStatus, EncounterStore, StoreError};
use crate::narrator::{AgentItem, NarrativeAgent};
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;

/// Errors raised before a run stream is opened. None of these have
/// side effects.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Encounter not found")]
    NotFound,

    #[error("Encounter belongs to another user")]
    Forbidden,

    #[error("Encounter has already been run")]
    AlreadyRun,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// One wire event, tagged with its run-scoped sequence id.
///
/// Ids are monotonically increasing from 0 and owned by the run, so
/// concurrent runs never interleave counters.
#[derive(Debug, Clone, Serialize)]
pub struct RunEvent {
    pub id: u64,
    #[serde(flatten)]
    pub data: RunEventData,
}

/// Payload of one wire event.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RunEventData {
    Status { status: EncounterStatus },
    Chunk { text: String },
    ToolResult {
        #[serde(rename = "toolName")]
        tool_name: String,
        result: Value,
    },
    Error { error: String },
}

impl RunEventData {
    /// SSE event name for this payload.
    pub fn event_name(&self) -> &'static str {
        match self {
            RunEventData::Status { .. } => "status",
            RunEventData::Chunk { .. } => "chunk",
            RunEventData::ToolResult { .. } => "tool-result",
            RunEventData::Error { .. } => "error",
        }
    }
}

/// Ordered stream of events from one run.
pub type RunStream = Pin<Box<dyn Stream<Item = RunEvent> + Send>>;

/// Drives the narrative agent through encounters and republishes its
/// output.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn EncounterStore>,
    agent: Arc<dyn NarrativeAgent>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn EncounterStore>, agent: Arc<dyn NarrativeAgent>) -> Self {
        Self { store, agent }
    }

    /// Start a run for an encounter.
    ///
    /// Preconditions, all checked before any side effect:
    /// - the encounter exists (`NotFound`),
    /// - `requester`, when supplied, matches the creator (`Forbidden`),
    /// - no transcript has been persisted yet (`AlreadyRun`); this is
    ///   the authoritative once-per-encounter guard.
    pub async fn start_run(
        &self,
        encounter_id: EncounterId,
        requester: Option<&str>,
    ) -> Result<RunStream, RunError> {
        let encounter = self
            .store
            .get(encounter_id)
            .await?
            .ok_or(RunError::NotFound)?;

        if let Some(requester) = requester {
            if requester != encounter.created_by {
                return Err(RunError::Forbidden);
            }
        }

        if self.store.transcript(encounter_id).await?.is_some() {
            return Err(RunError::AlreadyRun);
        }

        let (tx, rx) = mpsc::channel(64);
        let store = Arc::clone(&self.store);
        let agent = Arc::clone(&self.agent);
        let directive = format!("Encounter: {}\n\n{}", encounter.name, encounter.description);
        tokio::spawn(run_encounter(store, agent, encounter_id, directive, tx));

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Emits events with a run-scoped sequence counter. Send failures are
/// ignored: the consumer disconnecting must not stop the run.
struct Emitter {
    tx: mpsc::Sender<RunEvent>,
    next_id: u64,
}

impl Emitter {
    async fn emit(&mut self, data: RunEventData) {
        let event = RunEvent {
            id: self.next_id,
            data,
        };
        self.next_id += 1;
        let _ = self.tx.send(event).await;
    }
}

async fn run_encounter(
    store: Arc<dyn EncounterStore>,
    agent: Arc<dyn NarrativeAgent>,
    encounter_id: EncounterId,
    directive: String,
    tx: mpsc::Sender<RunEvent>,
) {
    let mut emitter = Emitter { tx, next_id: 0 };

    tracing::info!(encounter = %encounter_id, "starting encounter run");

    if let Err(e) = store.set_status(encounter_id, EncounterStatus::Active).await {
        fail(&store, &mut emitter, encounter_id, e.to_string()).await;
        return;
    }
    emitter
        .emit(RunEventData::Status {
            status: EncounterStatus::Active,
        })
        .await;

    let mut items = agent.run(directive);
    let mut transcript = String::new();

    while let Some(item) = items.next().await {
        match item {
            Ok(AgentItem::TextDelta { text }) => {
                transcript.push_str(&text);
                emitter.emit(RunEventData::Chunk { text }).await;
            }
            Ok(AgentItem::ToolResult { tool_name, payload }) => {
                emitter
                    .emit(RunEventData::ToolResult {
                        tool_name,
                        result: payload,
                    })
                    .await;
            }
            Err(e) => {
                // All-or-nothing: the partial transcript the client saw
                // is discarded and the encounter becomes retryable.
                fail(&store, &mut emitter, encounter_id, e.to_string()).await;
                return;
            }
        }
    }

    if let Err(e) = store.insert_transcript(encounter_id, transcript).await {
        fail(&store, &mut emitter, encounter_id, e.to_string()).await;
        return;
    }
    // The transcript is already durable at this point. A failed status
    // write here would strand the encounter as active-with-transcript,
    // where a retry hits AlreadyRun, so the write gets a second
    // attempt before the run reports failure.
    let mut status_result = store
        .set_status(encounter_id, EncounterStatus::Completed)
        .await;
    if let Err(ref e) = status_result {
        tracing::warn!(encounter = %encounter_id, error = %e, "completed status write failed, retrying");
        status_result = store
            .set_status(encounter_id, EncounterStatus::Completed)
            .await;
    }
    if let Err(e) = status_result {
        tracing::error!(encounter = %encounter_id, error = %e, "transcript persisted but status update failed");
        emitter
            .emit(RunEventData::Error {
                error: e.to_string(),
            })
            .await;
        return;
    }

    emitter
        .emit(RunEventData::Status {
            status: EncounterStatus::Completed,
        })
        .await;
    tracing::info!(encounter = %encounter_id, "encounter run completed");
}

/// Terminal failure path: exactly one `error` event, then the status
/// reverts to `Setup` so the run can be retried. Never a dead-end
/// failure state.
async fn fail(
    store: &Arc<dyn EncounterStore>,
    emitter: &mut Emitter,
    encounter_id: EncounterId,
    message: String,
) {
    tracing::warn!(encounter = %encounter_id, error = %message, "encounter run failed");
    emitter
        .emit(RunEventData::Error { error: message })
        .await;
    if let Err(e) = store.set_status(encounter_id, EncounterStatus::Setup).await {
        tracing::error!(encounter = %encounter_id, error = %e, "failed to revert encounter to setup");
    }
}
