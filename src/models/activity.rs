use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates;
use crate::models::{CourseRef, Subtask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Examen,
    Quiz,
    Taller,
    Proyecto,
    #[default]
    Otro,
}

impl ActivityType {
    pub fn label(self) -> &'static str {
        match self {
            ActivityType::Examen => "Examen",
            ActivityType::Quiz => "Quiz",
            ActivityType::Taller => "Taller",
            ActivityType::Proyecto => "Proyecto",
            ActivityType::Otro => "Otro",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub course: Option<CourseRef>,
    #[serde(rename = "type", default)]
    pub kind: ActivityType,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub event_datetime: Option<String>,
}

impl Activity {
    pub fn deadline_date(&self) -> Option<NaiveDate> {
        self.deadline.as_deref().and_then(dates::parse_day)
    }
}

/// Partial activity as embedded in some subtask payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub course: Option<CourseRef>,
}

/// An activity joined with the subtasks fetched from its nested endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityWithSubtasks {
    #[serde(flatten)]
    pub activity: Activity,
    pub subtasks: Vec<Subtask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewActivityRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub course: i64,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub deadline: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_datetime: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<i64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ActivityType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_datetime: Option<NaiveDate>,
}
