use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::gateway::Gateway;
use crate::models::{Activity, ActivityRef, ActivityWithSubtasks, Course, ReprogrammingLog, Subtask};

/// Everything the planner pages need, fetched in one go.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlannerSnapshot {
    pub courses: Vec<Course>,
    pub activities: Vec<Activity>,
    pub subtasks: Vec<Subtask>,
    pub logs: Vec<ReprogrammingLog>,
}

pub async fn load_snapshot(gateway: &Arc<dyn Gateway>) -> Result<PlannerSnapshot, AppError> {
    info!("Loading planner snapshot");
    let (courses, activities, logs) = tokio::try_join!(
        gateway.list_courses(),
        gateway.list_activities(),
        gateway.list_logs(),
    )?;

    let subtasks = fetch_all_subtasks(gateway, &activities)
        .await
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();

    info!(
        "Loaded {} courses, {} activities, {} subtasks, {} logs",
        courses.len(),
        activities.len(),
        subtasks.len(),
        logs.len()
    );

    Ok(PlannerSnapshot {
        courses,
        activities,
        subtasks,
        logs,
    })
}

/// Progress page variant: activities joined with their subtasks.
pub async fn load_activities_with_subtasks(
    gateway: &Arc<dyn Gateway>,
) -> Result<Vec<ActivityWithSubtasks>, AppError> {
    let activities = gateway.list_activities().await?;
    let subtasks = fetch_all_subtasks(gateway, &activities).await;

    Ok(activities
        .into_iter()
        .zip(subtasks)
        .map(|(activity, subtasks)| ActivityWithSubtasks { activity, subtasks })
        .collect())
}

/// One nested fetch per activity, all in parallel. The result lines up with
/// `activities`; a failed fetch yields an empty list for that activity.
pub async fn fetch_all_subtasks(gateway: &Arc<dyn Gateway>, activities: &[Activity]) -> Vec<Vec<Subtask>> {
    let handles: Vec<_> = activities
        .iter()
        .map(|activity| {
            let gateway = gateway.clone();
            let activity_id = activity.id;
            tokio::spawn(async move { (activity_id, gateway.list_subtasks(activity_id).await) })
        })
        .collect();

    let mut all = Vec::with_capacity(handles.len());
    for handle in handles {
        let subtasks = match handle.await {
            Ok((activity_id, Ok(subtasks))) => {
                debug!("Fetched {} subtasks for activity {}", subtasks.len(), activity_id);
                with_parent(activity_id, subtasks)
            }
            Ok((activity_id, Err(e))) => {
                warn!("Failed to fetch subtasks for activity {}: {}", activity_id, e);
                Vec::new()
            }
            Err(e) => {
                warn!("Subtask fetch task aborted: {}", e);
                Vec::new()
            }
        };
        all.push(subtasks);
    }
    all
}

/// The nested endpoint does not always echo the parent back.
pub fn with_parent(activity_id: i64, subtasks: Vec<Subtask>) -> Vec<Subtask> {
    subtasks
        .into_iter()
        .map(|mut subtask| {
            if subtask.activity.is_none() {
                subtask.activity = Some(ActivityRef::Id(activity_id));
            }
            subtask
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::*;
    use crate::gateway::InMemoryGateway;
    use crate::models::*;

    fn demo() -> Arc<dyn Gateway> {
        let today = NaiveDate::from_ymd_opt(2025, 5, 2).unwrap();
        Arc::new(InMemoryGateway::with_demo_data(today))
    }

    #[tokio::test]
    async fn snapshot_joins_all_resources() {
        let snapshot = load_snapshot(&demo()).await.unwrap();

        assert_eq!(snapshot.courses.len(), 3);
        assert_eq!(snapshot.activities.len(), 3);
        assert_eq!(snapshot.subtasks.len(), 11);
        assert!(snapshot.subtasks.iter().all(|s| s.activity_id().is_some()));
    }

    #[tokio::test]
    async fn activities_line_up_with_their_subtasks() {
        let joined = load_activities_with_subtasks(&demo()).await.unwrap();

        assert_eq!(joined.len(), 3);
        for item in &joined {
            assert!(item.subtasks.iter().all(|s| s.activity_id() == Some(item.activity.id)));
        }
    }

    /// Wraps the demo gateway and fails the nested fetch of one activity.
    struct FlakySubtasks {
        inner: InMemoryGateway,
        broken: i64,
    }

    #[async_trait]
    impl Gateway for FlakySubtasks {
        async fn list_courses(&self) -> Result<Vec<Course>, AppError> {
            self.inner.list_courses().await
        }
        async fn get_course(&self, id: i64) -> Result<Course, AppError> {
            self.inner.get_course(id).await
        }
        async fn create_course(&self, req: &NewCourseRequest) -> Result<Course, AppError> {
            self.inner.create_course(req).await
        }
        async fn update_course(&self, id: i64, req: &NewCourseRequest) -> Result<Course, AppError> {
            self.inner.update_course(id, req).await
        }
        async fn patch_course(&self, id: i64, patch: &CoursePatch) -> Result<Course, AppError> {
            self.inner.patch_course(id, patch).await
        }
        async fn delete_course(&self, id: i64) -> Result<(), AppError> {
            self.inner.delete_course(id).await
        }
        async fn list_activities(&self) -> Result<Vec<Activity>, AppError> {
            self.inner.list_activities().await
        }
        async fn get_activity(&self, id: i64) -> Result<Activity, AppError> {
            self.inner.get_activity(id).await
        }
        async fn create_activity(&self, req: &NewActivityRequest) -> Result<Activity, AppError> {
            self.inner.create_activity(req).await
        }
        async fn update_activity(&self, id: i64, req: &NewActivityRequest) -> Result<Activity, AppError> {
            self.inner.update_activity(id, req).await
        }
        async fn patch_activity(&self, id: i64, patch: &ActivityPatch) -> Result<Activity, AppError> {
            self.inner.patch_activity(id, patch).await
        }
        async fn delete_activity(&self, id: i64) -> Result<(), AppError> {
            self.inner.delete_activity(id).await
        }
        async fn list_subtasks(&self, activity_id: i64) -> Result<Vec<Subtask>, AppError> {
            if activity_id == self.broken {
                return Err(AppError::Transport("connection reset".to_string()));
            }
            self.inner.list_subtasks(activity_id).await
        }
        async fn get_subtask(&self, activity_id: i64, id: i64) -> Result<Subtask, AppError> {
            self.inner.get_subtask(activity_id, id).await
        }
        async fn create_subtask(&self, activity_id: i64, req: &NewSubtaskRequest) -> Result<Subtask, AppError> {
            self.inner.create_subtask(activity_id, req).await
        }
        async fn update_subtask(&self, activity_id: i64, id: i64, req: &NewSubtaskRequest) -> Result<Subtask, AppError> {
            self.inner.update_subtask(activity_id, id, req).await
        }
        async fn patch_subtask(&self, activity_id: i64, id: i64, patch: &SubtaskPatch) -> Result<Subtask, AppError> {
            self.inner.patch_subtask(activity_id, id, patch).await
        }
        async fn delete_subtask(&self, activity_id: i64, id: i64) -> Result<(), AppError> {
            self.inner.delete_subtask(activity_id, id).await
        }
        async fn list_logs(&self) -> Result<Vec<ReprogrammingLog>, AppError> {
            self.inner.list_logs().await
        }
        async fn get_log(&self, id: i64) -> Result<ReprogrammingLog, AppError> {
            self.inner.get_log(id).await
        }
        async fn create_log(&self, req: &NewReprogrammingLog) -> Result<ReprogrammingLog, AppError> {
            self.inner.create_log(req).await
        }
        async fn update_log(&self, id: i64, req: &NewReprogrammingLog) -> Result<ReprogrammingLog, AppError> {
            self.inner.update_log(id, req).await
        }
        async fn patch_log(&self, id: i64, patch: &ReprogrammingLogPatch) -> Result<ReprogrammingLog, AppError> {
            self.inner.patch_log(id, patch).await
        }
        async fn delete_log(&self, id: i64) -> Result<(), AppError> {
            self.inner.delete_log(id).await
        }
    }

    #[tokio::test]
    async fn one_failed_nested_fetch_degrades_to_empty() {
        let today = NaiveDate::from_ymd_opt(2025, 5, 2).unwrap();
        let inner = InMemoryGateway::with_demo_data(today);
        let activities = inner.list_activities().await.unwrap();
        let broken = activities[1].id;
        let gateway: Arc<dyn Gateway> = Arc::new(FlakySubtasks { inner, broken });

        let per_activity = fetch_all_subtasks(&gateway, &activities).await;

        assert_eq!(per_activity.len(), 3);
        assert!(per_activity[1].is_empty());
        assert!(!per_activity[0].is_empty());
        assert!(!per_activity[2].is_empty());

        let snapshot = load_snapshot(&gateway).await.unwrap();
        assert_eq!(snapshot.activities.len(), 3);
        assert!(snapshot.subtasks.iter().all(|s| s.activity_id() != Some(broken)));
    }

    #[test]
    fn missing_parent_is_filled_in() {
        let subtask = Subtask {
            id: 1,
            title: "Leer capítulo 3".to_string(),
            activity: None,
            status: SubtaskStatus::Pending,
            estimated_hours: 1.0,
            target_date: None,
            execution_note: None,
        };

        let filled = with_parent(9, vec![subtask]);
        assert_eq!(filled[0].activity_id(), Some(9));
    }
}
