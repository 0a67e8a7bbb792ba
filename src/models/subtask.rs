use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::dates;
use crate::models::ActivitySummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubtaskStatus {
    #[default]
    Pending,
    Done,
    Postponed,
    Waiting,
}

impl SubtaskStatus {
    pub fn is_done(self) -> bool {
        self == SubtaskStatus::Done
    }

    /// Status written by a completion checkbox.
    pub fn from_checked(checked: bool) -> Self {
        if checked { SubtaskStatus::Done } else { SubtaskStatus::Pending }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActivityRef {
    Id(i64),
    Embedded(ActivitySummary),
}

impl ActivityRef {
    pub fn id(&self) -> i64 {
        match self {
            ActivityRef::Id(id) => *id,
            ActivityRef::Embedded(summary) => summary.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: i64,
    #[serde(alias = "name")]
    pub title: String,
    #[serde(default)]
    pub activity: Option<ActivityRef>,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: SubtaskStatus,
    #[serde(default, deserialize_with = "lenient_hours")]
    pub estimated_hours: f64,
    #[serde(default)]
    pub target_date: Option<String>,
    #[serde(default, alias = "note")]
    pub execution_note: Option<String>,
}

impl Subtask {
    pub fn activity_id(&self) -> Option<i64> {
        self.activity.as_ref().map(ActivityRef::id)
    }

    /// Hours still to be worked: zero once the subtask is done.
    pub fn remaining_hours(&self) -> f64 {
        if self.status.is_done() { 0.0 } else { self.estimated_hours }
    }

    pub fn is_due_on(&self, day: &str) -> bool {
        self.target_date
            .as_deref()
            .is_some_and(|d| dates::date_portion(d) == day)
    }

    pub fn target_day(&self) -> Option<NaiveDate> {
        self.target_date.as_deref().and_then(dates::parse_day)
    }
}

/// Hours arrive as numbers, as decimal strings (`"2.50"`) or as null.
/// Anything unusable counts as zero.
fn lenient_hours<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(parse_hours).unwrap_or(0.0))
}

/// Statuses this client does not know (or null) read as pending, so one odd
/// row never drops the whole list.
fn lenient_status<'de, D>(deserializer: D) -> Result<SubtaskStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default())
}

pub fn parse_hours(value: &Value) -> f64 {
    let hours = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().trim_end_matches(['h', 'H']).trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };
    if hours.is_finite() && hours > 0.0 { hours } else { 0.0 }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubtaskRequest {
    pub title: String,
    pub estimated_hours: f64,
    pub target_date: Option<NaiveDate>,
    pub status: SubtaskStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SubtaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_note: Option<String>,
}

impl SubtaskPatch {
    pub fn status(status: SubtaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_backend_subtask_with_decimal_string_hours() {
        let json = r#"{
            "id": 7,
            "title": "Repasar derivadas",
            "activity": 3,
            "status": "DONE",
            "estimated_hours": "2.50",
            "target_date": "2025-05-02"
        }"#;
        let subtask: Subtask = serde_json::from_str(json).unwrap();

        assert_eq!(subtask.activity_id(), Some(3));
        assert_eq!(subtask.status, SubtaskStatus::Done);
        assert_eq!(subtask.estimated_hours, 2.5);
        assert_eq!(subtask.remaining_hours(), 0.0);
    }

    #[test]
    fn legacy_keys_and_embedded_activity() {
        let json = r#"{
            "id": 1,
            "name": "Outline",
            "activity": {"id": 5, "title": "Ensayo"},
            "status": "WAITING",
            "estimated_hours": null,
            "note": "pendiente de fuentes"
        }"#;
        let subtask: Subtask = serde_json::from_str(json).unwrap();

        assert_eq!(subtask.title, "Outline");
        assert_eq!(subtask.activity_id(), Some(5));
        assert_eq!(subtask.estimated_hours, 0.0);
        assert_eq!(subtask.execution_note.as_deref(), Some("pendiente de fuentes"));
    }

    #[test]
    fn unknown_status_reads_as_pending_without_dropping_the_list() {
        let json = r#"[
            {"id": 1, "title": "Leer", "status": "DONE", "estimated_hours": 1},
            {"id": 2, "title": "Resumir", "status": "IN_PROGRESS", "estimated_hours": 2},
            {"id": 3, "title": "Esquema", "status": null}
        ]"#;
        let subtasks: Vec<Subtask> = serde_json::from_str(json).unwrap();

        assert_eq!(subtasks.len(), 3);
        assert_eq!(subtasks[0].status, SubtaskStatus::Done);
        assert_eq!(subtasks[1].status, SubtaskStatus::Pending);
        assert_eq!(subtasks[1].remaining_hours(), 2.0);
        assert_eq!(subtasks[2].status, SubtaskStatus::Pending);
    }

    #[test]
    fn invalid_or_negative_hours_count_as_zero() {
        assert_eq!(parse_hours(&Value::String("abc".into())), 0.0);
        assert_eq!(parse_hours(&serde_json::json!(-3)), 0.0);
        assert_eq!(parse_hours(&Value::String("1.5h".into())), 1.5);
    }

    #[test]
    fn status_patch_only_carries_status() {
        let body = serde_json::to_value(SubtaskPatch::status(SubtaskStatus::Done)).unwrap();
        assert_eq!(body, serde_json::json!({ "status": "DONE" }));
    }
}
