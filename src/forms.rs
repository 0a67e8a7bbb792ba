use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dates;
use crate::error::AppError;
use crate::gateway::Gateway;
use crate::models::{
    Activity, ActivityType, Course, NewActivityRequest, NewCourseRequest, NewSubtaskRequest,
    Subtask, SubtaskStatus,
};

pub const MSG_TITLE_REQUIRED: &str = "El título es obligatorio para crear una tarea.";
pub const MSG_COURSE_REQUIRED: &str = "El curso es obligatorio para crear una tarea.";
pub const MSG_KIND_REQUIRED: &str = "El tipo es obligatorio para crear una tarea.";
pub const MSG_DEADLINE_REQUIRED: &str = "La fecha de entrega es obligatoria para crear una tarea.";
pub const MSG_DEADLINE_INVALID: &str = "La fecha de entrega no es válida.";
pub const MSG_EVENT_DATE_INVALID: &str = "La fecha del evento no es válida.";
pub const MSG_SUBTASK_TITLE_REQUIRED: &str = "El nombre de la subtarea es obligatorio.";
pub const MSG_TARGET_DATE_REQUIRED: &str = "La fecha objetivo es obligatoria.";
pub const MSG_TARGET_DATE_INVALID: &str = "La fecha objetivo no es válida.";
pub const MSG_TARGET_AFTER_DEADLINE: &str =
    "La fecha objetivo no puede ser posterior a la fecha de entrega de la actividad.";
pub const MSG_HOURS_REQUIRED: &str = "Las horas estimadas son obligatorias y deben ser mayores a 0.";
pub const MSG_HOURS_INVALID: &str = "Las horas estimadas deben ser un número válido mayor a 0.";
pub const MSG_HOURS_STEP: &str = "Las horas deben ser múltiplos de 0.5 (ej: 1, 1.5, 2, 2.5, etc.).";
pub const MSG_COURSE_NAME_REQUIRED: &str = "El nombre del curso es requerido";
pub const MSG_COURSE_EXISTS: &str = "Es posible que ya exista un curso con ese nombre.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Course,
    Kind,
    Deadline,
    EventDate,
    Description,
    TargetDate,
    EstimatedHours,
    CourseName,
    General,
}

/// Per-field messages for a form, plus per-draft messages keyed by temp id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldErrors {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<Field, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub subtasks: BTreeMap<i64, BTreeMap<Field, String>>,
}

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.subtasks.is_empty()
    }

    /// Keeps the first message recorded for a field.
    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.fields.entry(field).or_insert_with(|| message.into());
    }

    pub fn insert_subtask(&mut self, temp_id: i64, field: Field, message: impl Into<String>) {
        self.subtasks
            .entry(temp_id)
            .or_default()
            .entry(field)
            .or_insert_with(|| message.into());
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn subtask(&self, temp_id: i64, field: Field) -> Option<&str> {
        self.subtasks
            .get(&temp_id)
            .and_then(|errs| errs.get(&field))
            .map(String::as_str)
    }

    pub fn first_message(&self) -> Option<&str> {
        self.fields
            .values()
            .chain(self.subtasks.values().flat_map(|errs| errs.values()))
            .map(String::as_str)
            .next()
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, FieldErrors> {
        if self.is_empty() { Ok(value()) } else { Err(self) }
    }
}

/// A subtask row of the creation form, before the backend has assigned an id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtaskDraft {
    pub temp_id: i64,
    pub title: String,
    pub target_date: String,
    pub hours: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityForm {
    pub title: String,
    pub course_id: Option<i64>,
    pub kind: Option<ActivityType>,
    pub deadline: String,
    pub event_date: String,
    pub description: String,
    pub subtasks: Vec<SubtaskDraft>,
}

#[derive(Debug, Clone)]
pub struct ValidActivity {
    pub activity: NewActivityRequest,
    pub subtasks: Vec<NewSubtaskRequest>,
}

impl ActivityForm {
    /// Appends an empty draft; its temp id is the current timestamp in
    /// milliseconds, bumped when needed so ids stay unique within the form.
    pub fn add_subtask(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let last = self.subtasks.iter().map(|s| s.temp_id).max().unwrap_or(i64::MIN);
        let temp_id = now.max(last.saturating_add(1));
        self.subtasks.push(SubtaskDraft {
            temp_id,
            ..Default::default()
        });
        temp_id
    }

    pub fn remove_subtask(&mut self, temp_id: i64) {
        self.subtasks.retain(|s| s.temp_id != temp_id);
    }

    pub fn subtask_mut(&mut self, temp_id: i64) -> Option<&mut SubtaskDraft> {
        self.subtasks.iter_mut().find(|s| s.temp_id == temp_id)
    }

    pub fn validate(&self) -> Result<ValidActivity, FieldErrors> {
        let mut errors = FieldErrors::default();

        let title = self.title.trim();
        if title.is_empty() {
            errors.insert(Field::Title, MSG_TITLE_REQUIRED);
        }
        if self.course_id.is_none() {
            errors.insert(Field::Course, MSG_COURSE_REQUIRED);
        }
        if self.kind.is_none() {
            errors.insert(Field::Kind, MSG_KIND_REQUIRED);
        }

        let deadline = if self.deadline.trim().is_empty() {
            errors.insert(Field::Deadline, MSG_DEADLINE_REQUIRED);
            None
        } else {
            let parsed = dates::parse_day(&self.deadline);
            if parsed.is_none() {
                errors.insert(Field::Deadline, MSG_DEADLINE_INVALID);
            }
            parsed
        };

        let event_date = if self.event_date.trim().is_empty() {
            None
        } else {
            let parsed = dates::parse_day(&self.event_date);
            if parsed.is_none() {
                errors.insert(Field::EventDate, MSG_EVENT_DATE_INVALID);
            }
            parsed
        };

        let mut subtasks = Vec::with_capacity(self.subtasks.len());
        for draft in &self.subtasks {
            let form = SubtaskForm {
                title: draft.title.clone(),
                target_date: draft.target_date.clone(),
                hours: draft.hours.clone(),
            };
            match form.validate(deadline) {
                Ok(req) => subtasks.push(req),
                Err(draft_errors) => {
                    for (field, message) in draft_errors.fields {
                        errors.insert_subtask(draft.temp_id, field, message);
                    }
                }
            }
        }

        let description = self.description.trim();
        errors.into_result(|| ValidActivity {
            activity: NewActivityRequest {
                title: title.to_string(),
                description: (!description.is_empty()).then(|| description.to_string()),
                course: self.course_id.unwrap_or_default(),
                kind: self.kind.unwrap_or_default(),
                deadline: deadline.unwrap_or(NaiveDate::MIN),
                event_datetime: event_date,
            },
            subtasks,
        })
    }
}

/// A single subtask added to an existing activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtaskForm {
    pub title: String,
    pub target_date: String,
    pub hours: String,
}

impl SubtaskForm {
    pub fn validate(&self, deadline: Option<NaiveDate>) -> Result<NewSubtaskRequest, FieldErrors> {
        let mut errors = FieldErrors::default();

        let title = self.title.trim();
        if title.is_empty() {
            errors.insert(Field::Title, MSG_SUBTASK_TITLE_REQUIRED);
        }

        let target = if self.target_date.trim().is_empty() {
            errors.insert(Field::TargetDate, MSG_TARGET_DATE_REQUIRED);
            None
        } else {
            match dates::parse_day(&self.target_date) {
                Some(day) if deadline.is_some_and(|d| day > d) => {
                    errors.insert(Field::TargetDate, MSG_TARGET_AFTER_DEADLINE);
                    None
                }
                Some(day) => Some(day),
                None => {
                    errors.insert(Field::TargetDate, MSG_TARGET_DATE_INVALID);
                    None
                }
            }
        };

        let hours = match parse_form_hours(&self.hours) {
            Ok(hours) => hours,
            Err(message) => {
                errors.insert(Field::EstimatedHours, message);
                0.0
            }
        };

        errors.into_result(|| NewSubtaskRequest {
            title: title.to_string(),
            estimated_hours: hours,
            target_date: target,
            status: SubtaskStatus::Pending,
        })
    }
}

/// Hours typed by the user: "2", "1.5", "3h". Must be positive and a
/// multiple of half an hour.
pub fn parse_form_hours(raw: &str) -> Result<f64, &'static str> {
    let cleaned = raw.trim().trim_end_matches(['h', 'H']).trim();
    if cleaned.is_empty() {
        return Err(MSG_HOURS_REQUIRED);
    }
    let hours: f64 = cleaned.parse().map_err(|_| MSG_HOURS_INVALID)?;
    if !hours.is_finite() || hours <= 0.0 {
        return Err(MSG_HOURS_INVALID);
    }
    if (hours * 2.0).fract() != 0.0 {
        return Err(MSG_HOURS_STEP);
    }
    Ok(hours)
}

pub fn validate_course_name(name: &str) -> Result<NewCourseRequest, FieldErrors> {
    let name = name.trim();
    let mut errors = FieldErrors::default();
    if name.is_empty() {
        errors.insert(Field::CourseName, MSG_COURSE_NAME_REQUIRED);
    }
    errors.into_result(|| NewCourseRequest {
        name: name.to_string(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedActivity {
    pub activity: Activity,
    pub subtasks: Vec<Subtask>,
}

/// Validates the form, creates the activity, then its subtasks in form order.
/// A failed subtask deletes the activity again so a retry starts clean.
pub async fn submit_activity(
    gateway: &dyn Gateway,
    form: &ActivityForm,
) -> Result<CreatedActivity, AppError> {
    let valid = form.validate().map_err(AppError::Validation)?;

    let activity = gateway.create_activity(&valid.activity).await?;
    info!("created activity {} ({})", activity.id, activity.title);

    let mut subtasks = Vec::with_capacity(valid.subtasks.len());
    for req in &valid.subtasks {
        match gateway.create_subtask(activity.id, req).await {
            Ok(subtask) => subtasks.push(subtask),
            Err(e) => {
                warn!(
                    "subtask '{}' of activity {} failed, rolling back: {}",
                    req.title, activity.id, e
                );
                // Subtasks go with their activity on the backend.
                if let Err(rollback) = gateway.delete_activity(activity.id).await {
                    warn!("rollback of activity {} failed: {}", activity.id, rollback);
                }
                return Err(e);
            }
        }
    }

    Ok(CreatedActivity { activity, subtasks })
}

pub async fn create_course(gateway: &dyn Gateway, name: &str) -> Result<Course, AppError> {
    let req = validate_course_name(name).map_err(AppError::Validation)?;

    match gateway.create_course(&req).await {
        Ok(course) => Ok(course),
        Err(AppError::Validation(mut fields)) => {
            let duplicate = fields
                .get(Field::CourseName)
                .is_some_and(|m| m.to_lowercase().contains("ya existe") || m.contains("already exists"));
            if duplicate {
                fields.fields.insert(Field::CourseName, MSG_COURSE_EXISTS.to_string());
            }
            Err(AppError::Validation(fields))
        }
        Err(e) => Err(e),
    }
}
