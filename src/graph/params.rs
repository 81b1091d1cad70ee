use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters attached to a single graph node and handed to its codec,
/// selector or function graph.
///
/// Keys are small integers whose meaning is defined by the consumer.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalParams {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub int_params: BTreeMap<i32, i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub string_params: BTreeMap<i32, String>,
}

impl LocalParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_int(mut self, key: i32, value: i64) -> Self {
        self.int_params.insert(key, value);
        self
    }

    pub fn with_string(mut self, key: i32, value: impl Into<String>) -> Self {
        self.string_params.insert(key, value.into());
        self
    }

    pub fn int(&self, key: i32) -> Option<i64> {
        self.int_params.get(&key).copied()
    }

    pub fn string(&self, key: i32) -> Option<&str> {
        self.string_params.get(&key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.int_params.is_empty() && self.string_params.is_empty()
    }
}
