use std::collections::HashMap;

use crate::values::{coerce, CoerceError, TypedValue, ValueKind};

/// Last known plugin settings, hydrated from Info and Settings messages.
///
/// Backs two things: typed read access for the embedding application, and
/// the "must differ from the known value" check on outbound setting updates.
#[derive(Clone, Debug, Default)]
pub struct SettingsSnapshot {
    values: HashMap<String, String>,
    hydrated: bool,
}

impl SettingsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace known values with the given set. Called on every Info and
    /// Settings message.
    pub fn hydrate(&mut self, values: HashMap<String, String>) {
        self.values = values;
        self.hydrated = true;
    }

    /// Whether any Info/Settings message has arrived yet.
    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Read a setting through the data coercion table.
    pub fn get_typed(&self, name: &str, kind: ValueKind) -> Option<Result<TypedValue, CoerceError>> {
        self.values.get(name).map(|raw| coerce(kind, raw))
    }

    /// True when the setting is known and the candidate value differs from
    /// it. Outbound setting updates are only valid in that case.
    pub fn would_change(&self, name: &str, value: &str) -> bool {
        self.values.get(name).is_some_and(|known| known != value)
    }

    /// Record a value this process just pushed to the host.
    pub fn record(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
