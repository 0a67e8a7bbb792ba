use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};

use crate::dates::DAY_FORMAT;
use crate::error::AppError;
use crate::gateway::Gateway;
use crate::models::{
    Activity, ActivityPatch, ActivityRef, ActivityType, Course, CoursePatch, CourseRef,
    NewActivityRequest, NewCourseRequest, NewReprogrammingLog, NewSubtaskRequest,
    ReprogrammingLog, ReprogrammingLogPatch, Subtask, SubtaskPatch, SubtaskStatus,
};

#[derive(Debug, Default)]
struct MemoryData {
    courses: Vec<Course>,
    activities: Vec<Activity>,
    subtasks: Vec<Subtask>,
    logs: Vec<ReprogrammingLog>,
    next_id: i64,
}

impl MemoryData {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn course_ref(&self, id: i64) -> CourseRef {
        self.courses
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .map(CourseRef::Embedded)
            .unwrap_or(CourseRef::Id(id))
    }

    fn activity_mut(&mut self, id: i64) -> Result<&mut Activity, AppError> {
        self.activities
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AppError::NotFound)
    }

    fn subtask_mut(&mut self, activity_id: i64, id: i64) -> Result<&mut Subtask, AppError> {
        self.subtasks
            .iter_mut()
            .find(|s| s.id == id && s.activity_id() == Some(activity_id))
            .ok_or(AppError::NotFound)
    }

    fn log_mut(&mut self, id: i64) -> Result<&mut ReprogrammingLog, AppError> {
        self.logs
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(AppError::NotFound)
    }

    fn ensure_activity(&self, id: i64) -> Result<(), AppError> {
        if self.activities.iter().any(|a| a.id == id) {
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }
}

/// Backend held in memory. Serves the demo mode and stands in for the
/// remote API in tests.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    data: Mutex<MemoryData>,
}

fn day(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

fn activity_from(req: &NewActivityRequest, id: i64, course: CourseRef) -> Activity {
    Activity {
        id,
        title: req.title.clone(),
        description: req.description.clone(),
        course: Some(course),
        kind: req.kind,
        deadline: Some(day(req.deadline)),
        event_datetime: req.event_datetime.map(day),
    }
}

fn subtask_from(req: &NewSubtaskRequest, id: i64, activity_id: i64) -> Subtask {
    Subtask {
        id,
        title: req.title.clone(),
        activity: Some(ActivityRef::Id(activity_id)),
        status: req.status,
        estimated_hours: req.estimated_hours.max(0.0),
        target_date: req.target_date.map(day),
        execution_note: None,
    }
}

fn log_from(req: &NewReprogrammingLog, id: i64) -> ReprogrammingLog {
    ReprogrammingLog {
        id,
        subtask: Some(req.subtask),
        previous_date: req.previous_date.clone(),
        new_date: Some(req.new_date.clone()),
        reason: req.reason.clone(),
        created_at: Some(chrono::Utc::now().to_rfc3339()),
        extra: Default::default(),
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Three courses, three activities and their study plans, dated
    /// relative to `today`. Today's pending work adds up to 7.5 hours.
    pub fn with_demo_data(today: NaiveDate) -> Self {
        let at = |offset: i64| Some(today + Duration::days(offset));
        let gateway = Self::new();
        {
            let mut data = gateway.lock();
            let seed: [(&str, &str, ActivityType, i64, &str, Vec<(&str, i64, f64, bool)>); 3] = [
                (
                    "Cálculo II",
                    "Examen de Cálculo",
                    ActivityType::Examen,
                    5,
                    "Parcial sobre límites, derivadas e integrales.",
                    vec![
                        ("Repasar límites y continuidad", -1, 2.0, true),
                        ("Practicar derivadas", 0, 3.0, false),
                        ("Resolver examen de 2022", 1, 4.0, false),
                        ("Repaso de integrales", 1, 3.0, false),
                    ],
                ),
                (
                    "Historia 301",
                    "Ensayo: Revolución Industrial",
                    ActivityType::Taller,
                    7,
                    "Ensayo de 2000 palabras sobre el impacto de la Revolución Industrial.",
                    vec![
                        ("Esquema de argumentos", 0, 1.5, false),
                        ("Buscar 3 fuentes primarias", 0, 1.0, false),
                        ("Escribir primer borrador", 3, 3.0, false),
                        ("Revisión y citas", 5, 1.5, false),
                    ],
                ),
                (
                    "Física 101",
                    "Informe de laboratorio: Movimiento",
                    ActivityType::Proyecto,
                    5,
                    "Analizar los datos del experimento y escribir conclusiones.",
                    vec![
                        ("Analizar tabla de datos", 0, 2.0, false),
                        ("Escribir conclusión", 1, 1.5, false),
                        ("Formato y entrega", 3, 1.0, false),
                    ],
                ),
            ];

            for (course_name, title, kind, deadline, description, plan) in seed {
                let course_id = data.next_id();
                data.courses.push(Course {
                    id: course_id,
                    name: course_name.to_string(),
                });

                let activity_id = data.next_id();
                let req = NewActivityRequest {
                    title: title.to_string(),
                    description: Some(description.to_string()),
                    course: course_id,
                    kind,
                    deadline: today + Duration::days(deadline),
                    event_datetime: None,
                };
                let course = data.course_ref(course_id);
                data.activities.push(activity_from(&req, activity_id, course));

                for (name, offset, hours, done) in plan {
                    let id = data.next_id();
                    let req = NewSubtaskRequest {
                        title: name.to_string(),
                        estimated_hours: hours,
                        target_date: at(offset),
                        status: SubtaskStatus::from_checked(done),
                    };
                    data.subtasks.push(subtask_from(&req, id, activity_id));
                }
            }
        }
        gateway
    }

    fn lock(&self) -> MutexGuard<'_, MemoryData> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Gateway for InMemoryGateway {
    async fn list_courses(&self) -> Result<Vec<Course>, AppError> {
        Ok(self.lock().courses.clone())
    }

    async fn get_course(&self, id: i64) -> Result<Course, AppError> {
        self.lock()
            .courses
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn create_course(&self, req: &NewCourseRequest) -> Result<Course, AppError> {
        let mut data = self.lock();
        let id = data.next_id();
        let course = Course {
            id,
            name: req.name.clone(),
        };
        data.courses.push(course.clone());
        Ok(course)
    }

    async fn update_course(&self, id: i64, req: &NewCourseRequest) -> Result<Course, AppError> {
        let mut data = self.lock();
        let course = data
            .courses
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(AppError::NotFound)?;
        course.name = req.name.clone();
        Ok(course.clone())
    }

    async fn patch_course(&self, id: i64, patch: &CoursePatch) -> Result<Course, AppError> {
        let mut data = self.lock();
        let course = data
            .courses
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(AppError::NotFound)?;
        if let Some(name) = &patch.name {
            course.name = name.clone();
        }
        Ok(course.clone())
    }

    async fn delete_course(&self, id: i64) -> Result<(), AppError> {
        let mut data = self.lock();
        let before = data.courses.len();
        data.courses.retain(|c| c.id != id);
        if data.courses.len() == before {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn list_activities(&self) -> Result<Vec<Activity>, AppError> {
        Ok(self.lock().activities.clone())
    }

    async fn get_activity(&self, id: i64) -> Result<Activity, AppError> {
        self.lock()
            .activities
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn create_activity(&self, req: &NewActivityRequest) -> Result<Activity, AppError> {
        let mut data = self.lock();
        let id = data.next_id();
        let course = data.course_ref(req.course);
        let activity = activity_from(req, id, course);
        data.activities.push(activity.clone());
        Ok(activity)
    }

    async fn update_activity(&self, id: i64, req: &NewActivityRequest) -> Result<Activity, AppError> {
        let mut data = self.lock();
        let course = data.course_ref(req.course);
        let activity = data.activity_mut(id)?;
        *activity = activity_from(req, id, course);
        Ok(activity.clone())
    }

    async fn patch_activity(&self, id: i64, patch: &ActivityPatch) -> Result<Activity, AppError> {
        let mut data = self.lock();
        let course = patch.course.map(|c| data.course_ref(c));
        let activity = data.activity_mut(id)?;
        if let Some(title) = &patch.title {
            activity.title = title.clone();
        }
        if let Some(description) = &patch.description {
            activity.description = Some(description.clone());
        }
        if course.is_some() {
            activity.course = course;
        }
        if let Some(kind) = patch.kind {
            activity.kind = kind;
        }
        if let Some(deadline) = patch.deadline {
            activity.deadline = Some(day(deadline));
        }
        if let Some(event) = patch.event_datetime {
            activity.event_datetime = Some(day(event));
        }
        Ok(activity.clone())
    }

    async fn delete_activity(&self, id: i64) -> Result<(), AppError> {
        let mut data = self.lock();
        data.ensure_activity(id)?;
        data.activities.retain(|a| a.id != id);
        data.subtasks.retain(|s| s.activity_id() != Some(id));
        Ok(())
    }

    async fn list_subtasks(&self, activity_id: i64) -> Result<Vec<Subtask>, AppError> {
        let data = self.lock();
        data.ensure_activity(activity_id)?;
        Ok(data
            .subtasks
            .iter()
            .filter(|s| s.activity_id() == Some(activity_id))
            .cloned()
            .collect())
    }

    async fn get_subtask(&self, activity_id: i64, id: i64) -> Result<Subtask, AppError> {
        let mut data = self.lock();
        data.subtask_mut(activity_id, id).map(|s| s.clone())
    }

    async fn create_subtask(&self, activity_id: i64, req: &NewSubtaskRequest) -> Result<Subtask, AppError> {
        let mut data = self.lock();
        data.ensure_activity(activity_id)?;
        let id = data.next_id();
        let subtask = subtask_from(req, id, activity_id);
        data.subtasks.push(subtask.clone());
        Ok(subtask)
    }

    async fn update_subtask(&self, activity_id: i64, id: i64, req: &NewSubtaskRequest) -> Result<Subtask, AppError> {
        let mut data = self.lock();
        let subtask = data.subtask_mut(activity_id, id)?;
        let note = subtask.execution_note.take();
        *subtask = subtask_from(req, id, activity_id);
        subtask.execution_note = note;
        Ok(subtask.clone())
    }

    async fn patch_subtask(&self, activity_id: i64, id: i64, patch: &SubtaskPatch) -> Result<Subtask, AppError> {
        let mut data = self.lock();
        let subtask = data.subtask_mut(activity_id, id)?;
        if let Some(title) = &patch.title {
            subtask.title = title.clone();
        }
        if let Some(status) = patch.status {
            subtask.status = status;
        }
        if let Some(hours) = patch.estimated_hours {
            subtask.estimated_hours = hours.max(0.0);
        }
        if let Some(target) = patch.target_date {
            subtask.target_date = Some(day(target));
        }
        if let Some(note) = &patch.execution_note {
            subtask.execution_note = Some(note.clone());
        }
        Ok(subtask.clone())
    }

    async fn delete_subtask(&self, activity_id: i64, id: i64) -> Result<(), AppError> {
        let mut data = self.lock();
        data.subtask_mut(activity_id, id)?;
        data.subtasks.retain(|s| s.id != id);
        Ok(())
    }

    async fn list_logs(&self) -> Result<Vec<ReprogrammingLog>, AppError> {
        Ok(self.lock().logs.clone())
    }

    async fn get_log(&self, id: i64) -> Result<ReprogrammingLog, AppError> {
        let mut data = self.lock();
        data.log_mut(id).map(|l| l.clone())
    }

    async fn create_log(&self, req: &NewReprogrammingLog) -> Result<ReprogrammingLog, AppError> {
        let mut data = self.lock();
        let id = data.next_id();
        let log = log_from(req, id);
        data.logs.push(log.clone());
        Ok(log)
    }

    async fn update_log(&self, id: i64, req: &NewReprogrammingLog) -> Result<ReprogrammingLog, AppError> {
        let mut data = self.lock();
        let log = data.log_mut(id)?;
        *log = log_from(req, id);
        Ok(log.clone())
    }

    async fn patch_log(&self, id: i64, patch: &ReprogrammingLogPatch) -> Result<ReprogrammingLog, AppError> {
        let mut data = self.lock();
        let log = data.log_mut(id)?;
        if let Some(new_date) = &patch.new_date {
            log.new_date = Some(new_date.clone());
        }
        if let Some(reason) = &patch.reason {
            log.reason = Some(reason.clone());
        }
        Ok(log.clone())
    }

    async fn delete_log(&self, id: i64) -> Result<(), AppError> {
        let mut data = self.lock();
        data.log_mut(id)?;
        data.logs.retain(|l| l.id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 14).unwrap()
    }

    #[tokio::test]
    async fn demo_data_is_nested_per_activity() {
        let gateway = InMemoryGateway::with_demo_data(today());
        let activities = gateway.list_activities().await.unwrap();
        assert_eq!(activities.len(), 3);

        let subtasks = gateway.list_subtasks(activities[0].id).await.unwrap();
        assert_eq!(subtasks.len(), 4);
        assert!(subtasks.iter().all(|s| s.activity_id() == Some(activities[0].id)));
        assert_eq!(subtasks[0].status, SubtaskStatus::Done);
    }

    #[tokio::test]
    async fn deleting_an_activity_drops_its_subtasks() {
        let gateway = InMemoryGateway::with_demo_data(today());
        let activity = gateway.list_activities().await.unwrap()[0].clone();
        let subtask = gateway.list_subtasks(activity.id).await.unwrap()[0].clone();

        gateway.delete_activity(activity.id).await.unwrap();

        assert!(matches!(gateway.list_subtasks(activity.id).await, Err(AppError::NotFound)));
        assert!(matches!(
            gateway.get_subtask(activity.id, subtask.id).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn patch_touches_only_given_fields() {
        let gateway = InMemoryGateway::with_demo_data(today());
        let activity = gateway.list_activities().await.unwrap()[1].clone();
        let before = gateway.list_subtasks(activity.id).await.unwrap()[0].clone();

        let after = gateway
            .patch_subtask(activity.id, before.id, &SubtaskPatch::status(SubtaskStatus::Done))
            .await
            .unwrap();

        assert_eq!(after.status, SubtaskStatus::Done);
        assert_eq!(after.title, before.title);
        assert_eq!(after.estimated_hours, before.estimated_hours);
    }
}
