//! Shared application state.

use skirmish_core::encounter::EncounterStore;
use skirmish_core::narrator::NarrativeAgent;
use skirmish_core::orchestrator::Orchestrator;
use std::sync::Arc;

pub struct App {
    pub store: Arc<dyn EncounterStore>,
    pub orchestrator: Orchestrator,
}

impl App {
    pub fn new(store: Arc<dyn EncounterStore>, agent: Arc<dyn NarrativeAgent>) -> Self {
        let orchestrator = Orchestrator::new(store.clone(), agent);
        Self {
            store,
            orchestrator,
        }
    }
}
