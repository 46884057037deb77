use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A contact as the record store keeps it.
///
/// Only `stage` and `updatedAt` are touched by the board; every other field
/// round-trips untouched through `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContactRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), stage: None, updated_at: None, extra: Map::new() }
    }

    #[must_use]
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Whether the stored stage already equals `key`.
    #[must_use]
    pub fn is_at(&self, key: &str) -> bool {
        self.stage.as_deref() == Some(key)
    }
}
