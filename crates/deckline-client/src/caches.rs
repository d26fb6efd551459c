use std::collections::HashMap;

use parking_lot::Mutex;

/// Per-session memory of the last value sent for each state id, choice key
/// and connector identity. Senders consult these to suppress redundant
/// sends; a new session starts with empty caches.
#[derive(Default)]
pub struct OutboundCaches {
    states: Mutex<HashMap<String, String>>,
    choices: Mutex<HashMap<String, Vec<String>>>,
    connectors: Mutex<HashMap<String, u8>>,
}

impl OutboundCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state_matches(&self, state_id: &str, value: &str) -> bool {
        self.states
            .lock()
            .get(state_id)
            .is_some_and(|last| last == value)
    }

    pub fn record_state(&self, state_id: impl Into<String>, value: impl Into<String>) {
        self.states.lock().insert(state_id.into(), value.into());
    }

    pub fn forget_state(&self, state_id: &str) {
        self.states.lock().remove(state_id);
    }

    pub fn state_known(&self, state_id: &str) -> bool {
        self.states.lock().contains_key(state_id)
    }

    pub fn last_state(&self, state_id: &str) -> Option<String> {
        self.states.lock().get(state_id).cloned()
    }

    pub fn choice_matches(&self, choice_key: &str, values: &[String]) -> bool {
        self.choices
            .lock()
            .get(choice_key)
            .is_some_and(|last| last == values)
    }

    pub fn record_choice(&self, choice_key: impl Into<String>, values: Vec<String>) {
        self.choices.lock().insert(choice_key.into(), values);
    }

    pub fn connector_matches(&self, canonical_id: &str, value: u8) -> bool {
        self.connectors
            .lock()
            .get(canonical_id)
            .is_some_and(|last| *last == value)
    }

    /// Record the currently known position for a connector identity, from
    /// either direction of the protocol.
    pub fn record_connector(&self, canonical_id: impl Into<String>, value: u8) {
        self.connectors.lock().insert(canonical_id.into(), value);
    }
}
