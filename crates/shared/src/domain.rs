use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error mapping attached to a control by the validation suite.
///
/// The suite may store arbitrary entries; the wrapper only consumes the
/// string list kept under [`ValidationErrors::MESSAGES_KEY`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Value>);

impl ValidationErrors {
    pub const MESSAGES_KEY: &'static str = "errors";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = messages
            .into_iter()
            .map(|message| Value::String(message.into()))
            .collect();
        let mut entries = BTreeMap::new();
        entries.insert(Self::MESSAGES_KEY.to_string(), Value::Array(list));
        Self(entries)
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Messages stored under `"errors"`.
    ///
    /// Returns `None` when the key is absent or does not hold an array of
    /// strings; an empty array is returned as `Some(vec![])`.
    pub fn messages(&self) -> Option<Vec<String>> {
        let Value::Array(items) = self.0.get(Self::MESSAGES_KEY)? else {
            return None;
        };
        items
            .iter()
            .map(|item| item.as_str().map(str::to_owned))
            .collect()
    }
}

/// Readable state of a field or group at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlSnapshot {
    pub touched: bool,
    pub pending: bool,
    pub errors: Option<ValidationErrors>,
}

impl ControlSnapshot {
    pub fn messages(&self) -> Option<Vec<String>> {
        self.errors.as_ref().and_then(ValidationErrors::messages)
    }
}

/// Change notification emitted by a control's live event stream.
///
/// Payloads are informational only; consumers re-read the control state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlEvent {
    ValueChanged,
    StatusChanged,
    TouchedChanged,
    PristineChanged,
    Reset,
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOrigin {
    Field,
    Group,
}

/// One tick of the merged field/group stream, numbered in delivery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedEvent {
    pub seq: u64,
    pub origin: EventOrigin,
}
