use dashmap::DashMap;

use deckline_core::EntityId;

/// Hold status of one action entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeldState {
    HeldDown,
    HeldUp,
}

/// Tracks which actions are currently part of a press-and-hold gesture.
///
/// Absence of an entry means the last trigger was a plain press (or nothing
/// has fired yet); handlers rely on that tri-state to tell "pressed" from
/// "currently held" from "just released".
#[derive(Default)]
pub struct HeldActionTracker {
    states: DashMap<EntityId, HeldState>,
}

impl HeldActionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, entity_id: EntityId, state: HeldState) {
        self.states.insert(entity_id, state);
    }

    /// Remove the entry once a hold-up invocation completes.
    pub fn clear(&self, entity_id: &EntityId) {
        self.states.remove(entity_id);
    }

    /// `None` if no hold is in progress, `Some(true)` while held down,
    /// `Some(false)` once released but before the release handler finished.
    pub fn query(&self, entity_id: &EntityId) -> Option<bool> {
        self.states
            .get(entity_id)
            .map(|entry| *entry.value() == HeldState::HeldDown)
    }
}
