use std::sync::Arc;

use chrono::Duration;
use study_planner::{
    config::AppConfig,
    dates,
    error::AppError,
    gateway::{Gateway, HttpGateway},
    models::{ActivityType, NewActivityRequest, NewCourseRequest, NewSubtaskRequest, SubtaskPatch, SubtaskStatus},
    services::load_snapshot,
};

fn live_gateway() -> Arc<dyn Gateway> {
    dotenvy::dotenv().ok();
    let config = AppConfig::new_from_env().expect("Failed to load planner config");
    println!("Using backend at {}", config.api_base_url);
    Arc::new(HttpGateway::new(&config).expect("Failed to create http gateway"))
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored --test-threads=1
async fn test_load_snapshot_from_backend() {
    let gateway = live_gateway();

    let snapshot = load_snapshot(&gateway).await.expect("Failed to load snapshot");
    println!(
        "Loaded {} courses, {} activities, {} subtasks",
        snapshot.courses.len(),
        snapshot.activities.len(),
        snapshot.subtasks.len()
    );

    for subtask in &snapshot.subtasks {
        assert!(subtask.activity_id().is_some(), "Subtask {} has no parent", subtask.id);
        assert!(subtask.estimated_hours >= 0.0, "Negative hours on subtask {}", subtask.id);
    }
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored --test-threads=1
async fn test_activity_lifecycle_roundtrip() {
    let gateway = live_gateway();
    let stamp = chrono::Utc::now().timestamp();
    let today = dates::local_today();

    let course = gateway
        .create_course(&NewCourseRequest {
            name: format!("Integration Course - {}", stamp),
        })
        .await
        .expect("Failed to create course");

    let activity = gateway
        .create_activity(&NewActivityRequest {
            title: format!("Integration Activity - {}", stamp),
            description: None,
            course: course.id,
            kind: ActivityType::Taller,
            deadline: today + Duration::days(3),
            event_datetime: None,
        })
        .await
        .expect("Failed to create activity");

    let subtask = gateway
        .create_subtask(
            activity.id,
            &NewSubtaskRequest {
                title: "Leer enunciado".to_string(),
                estimated_hours: 1.5,
                target_date: Some(today),
                status: SubtaskStatus::Pending,
            },
        )
        .await
        .expect("Failed to create subtask");
    assert_eq!(subtask.estimated_hours, 1.5);

    let patched = gateway
        .patch_subtask(activity.id, subtask.id, &SubtaskPatch::status(SubtaskStatus::Done))
        .await
        .expect("Failed to patch subtask");
    assert_eq!(patched.status, SubtaskStatus::Done);

    let listed = gateway.list_subtasks(activity.id).await.expect("Failed to list subtasks");
    assert!(listed.iter().any(|s| s.id == subtask.id && s.status.is_done()));

    gateway.delete_activity(activity.id).await.expect("Failed to delete activity");
    gateway.delete_course(course.id).await.expect("Failed to delete course");

    let err = gateway.get_activity(activity.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound), "Expected 404, got {:?}", err);
    println!("✓ Activity lifecycle verified against the backend");
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored --test-threads=1
async fn test_missing_title_is_a_field_error() {
    let gateway = live_gateway();
    let courses = gateway.list_courses().await.expect("Failed to list courses");
    let Some(course) = courses.first() else {
        println!("No courses on the backend, skipping");
        return;
    };

    let err = gateway
        .create_activity(&NewActivityRequest {
            title: String::new(),
            description: None,
            course: course.id,
            kind: ActivityType::Otro,
            deadline: dates::local_today(),
            event_datetime: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)), "Expected validation error, got {:?}", err);
}
