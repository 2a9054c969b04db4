//! Session state carried by the agent runtime.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which user preferences are stored.
pub const PREFERENCES_KEY: &str = "preferences";

/// Opaque state blob attached to a session.
///
/// The runtime owns the meaning of the values; this repository only seeds
/// the initial state and reads it back for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionState {
    values: Map<String, Value>,
}

impl SessionState {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial state for a fresh conversation: an empty preferences object.
    #[must_use]
    pub fn initial() -> Self {
        let mut state = Self::new();
        state.set(PREFERENCES_KEY, Value::Object(Map::new()));
        state
    }

    /// Get a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Set a value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// The preferences object, if present.
    #[must_use]
    pub fn preferences(&self) -> Option<&Map<String, Value>> {
        self.get(PREFERENCES_KEY).and_then(Value::as_object)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
