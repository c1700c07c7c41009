//! Encounter records and the durable-store port.
//!
//! The orchestrator treats storage as a simple keyed record store;
//! anything relational lives behind [`EncounterStore`]. An in-memory
//! implementation is bundled for tests and single-process serving.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Opaque encounter identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncounterId(Uuid);

impl EncounterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for EncounterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EncounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encounter lifecycle.
///
/// There is no terminal failure state: a failed run reverts to
/// `Setup` so it can be retried. Failure is only visible as a
/// transient `error` event on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncounterStatus {
    Setup,
    Active,
    Completed,
}

/// A combat encounter record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encounter {
    pub id: EncounterId,
    pub name: String,
    pub description: String,
    pub status: EncounterStatus,
    pub created_by: String,
}

impl Encounter {
    /// Create a new encounter in `Setup`.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            id: EncounterId::new(),
            name: name.into(),
            description: description.into(),
            status: EncounterStatus::Setup,
            created_by: created_by.into(),
        }
    }
}

/// Errors from the durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Encounter not found: {0}")]
    NotFound(EncounterId),

    #[error("Encounter {0} already has a transcript")]
    TranscriptExists(EncounterId),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Keyed record store for encounters and their transcripts.
///
/// Exactly one transcript may ever be stored per encounter; it is the
/// durable evidence that a run completed.
#[async_trait]
pub trait EncounterStore: Send + Sync {
    async fn create(&self, encounter: Encounter) -> Result<(), StoreError>;

    async fn get(&self, id: EncounterId) -> Result<Option<Encounter>, StoreError>;

    async fn set_status(&self, id: EncounterId, status: EncounterStatus) -> Result<(), StoreError>;

    /// Persist the completed transcript. Fails with
    /// [`StoreError::TranscriptExists`] if one is already stored.
    async fn insert_transcript(&self, id: EncounterId, text: String) -> Result<(), StoreError>;

    async fn transcript(&self, id: EncounterId) -> Result<Option<String>, StoreError>;
}

/// In-memory store backed by `tokio::sync::RwLock` maps.
#[derive(Default)]
pub struct InMemoryStore {
    encounters: RwLock<HashMap<EncounterId, Encounter>>,
    transcripts: RwLock<HashMap<EncounterId, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EncounterStore for InMemoryStore {
    async fn create(&self, encounter: Encounter) -> Result<(), StoreError> {
        self.encounters
            .write()
            .await
            .insert(encounter.id, encounter);
        Ok(())
    }

    async fn get(&self, id: EncounterId) -> Result<Option<Encounter>, StoreError> {
        Ok(self.encounters.read().await.get(&id).cloned())
    }

    async fn set_status(&self, id: EncounterId, status: EncounterStatus) -> Result<(), StoreError> {
        let mut encounters = self.encounters.write().await;
        let encounter = encounters.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        encounter.status = status;
        Ok(())
    }

    async fn insert_transcript(&self, id: EncounterId, text: String) -> Result<(), StoreError> {
        if !self.encounters.read().await.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        let mut transcripts = self.transcripts.write().await;
        if transcripts.contains_key(&id) {
            return Err(StoreError::TranscriptExists(id));
        }
        transcripts.insert(id, text);
        Ok(())
    }

    async fn transcript(&self, id: EncounterId) -> Result<Option<String>, StoreError> {
        Ok(self.transcripts.read().await.get(&id).cloned())
    }
}
