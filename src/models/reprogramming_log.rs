use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A record of a subtask being moved to another date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReprogrammingLog {
    pub id: i64,
    #[serde(default)]
    pub subtask: Option<i64>,
    #[serde(default)]
    pub previous_date: Option<String>,
    #[serde(default)]
    pub new_date: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReprogrammingLog {
    pub subtask: i64,
    pub previous_date: Option<String>,
    pub new_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReprogrammingLogPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
