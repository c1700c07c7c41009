//! Core engine for an AI-narrated tabletop combat simulator.
//!
//! The crate layers up from pure dice mechanics to a streaming
//! orchestrator:
//!
//! - [`dice`]: dice notation parsing and evaluation with keep/drop
//!   selectors.
//! - [`statblock`]: challenge-rating scaled combatant generation.
//! - [`attack`]: d20 attack resolution with criticals and fumbles.
//! - [`encounter`]: encounter records, lifecycle, and the transcript
//!   store.
//! - [`narrator`]: the Claude-backed narrative agent and its combat
//!   tools.
//! - [`orchestrator`]: drives a run end to end and emits the ordered
//!   event stream.
//!
//! Everything below the orchestrator is deterministic when given a
//! seeded RNG, which is how the tests pin down behavior.

pub mod attack;
pub mod dice;
pub mod encounter;
pub mod narrator;
pub mod orchestrator;
pub mod statblock;
pub mod testing;

pub use attack::AttackOutcome;
pub use dice::{DiceError, DiceSpec, RollResult, Selection};
pub use encounter::{
    Encounter, EncounterId, EncounterStatus, EncounterStore, InMemoryStore, StoreError,
};
pub use narrator::{AgentError, AgentItem, ClaudeNarrator, NarratorConfig, NarrativeAgent};
pub use orchestrator::{Orchestrator, RunError, RunEvent, RunEventData, RunStream};
pub use statblock::{AbilityScores, AttackProfile, Combatant, CombatantKind};
