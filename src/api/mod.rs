use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::{patch, post};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::color::CoursePalette;
use crate::dates;
use crate::error::AppError;
use crate::forms::{self, ActivityForm, CreatedActivity, SubtaskForm};
use crate::models::*;
use crate::progress::{self, ActivityProgress, ProgressFilter, ProgressSummary};
use crate::services::loader::{load_snapshot, with_parent};
use crate::services::RefreshStats;
use crate::state::AppState;
use crate::sync::SyncPhase;
use crate::today::{TodayInput, TodayView, build_today_view};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/today", get(today))
        .route("/progress", get(progress_summary))
        .route("/activities", post(create_activity))
        .route("/activities/{id}", get(activity_detail).delete(delete_activity))
        .route("/activities/{id}/subtasks", post(create_subtask))
        .route("/activities/{id}/subtasks/{subtask_id}/status", patch(toggle_status))
        .route("/courses", post(create_course))
        .route("/refresh", post(refresh))
        .with_state(state)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    loaded: bool,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        loaded: state.store.get_state().loaded,
    })
}

#[derive(Deserialize)]
struct TodayQuery {
    /// Overrides the local calendar day, `YYYY-MM-DD`.
    date: Option<String>,
}

async fn today(
    State(state): State<AppState>,
    Query(params): Query<TodayQuery>,
) -> Result<Json<TodayView>, AppError> {
    let day = match params.date {
        Some(raw) => dates::parse_day(&raw)
            .ok_or_else(|| AppError::BadRequest(format!("invalid date '{}'", raw)))?
            .format(dates::DAY_FORMAT)
            .to_string(),
        None => dates::local_today_string(),
    };

    let snapshot = state.store.get_state();
    let view = build_today_view(&TodayInput {
        activities: &snapshot.activities,
        subtasks: &snapshot.subtasks,
        courses: &snapshot.courses,
        today: &day,
        daily_limit: snapshot.user.daily_limit,
    });
    Ok(Json(view))
}

#[derive(Deserialize)]
struct ProgressQuery {
    course: Option<String>,
}

async fn progress_summary(
    State(state): State<AppState>,
    Query(params): Query<ProgressQuery>,
) -> Json<ProgressSummary> {
    let snapshot = state.store.get_state();
    let filter = ProgressFilter::from_query(params.course.as_deref());
    Json(progress::build_progress(
        &snapshot.activities_with_subtasks(),
        &snapshot.courses,
        dates::local_today(),
        &filter,
    ))
}

#[derive(Serialize)]
struct ActivityDetail {
    activity: Activity,
    subtasks: Vec<Subtask>,
    progress: ActivityProgress,
}

/// Refetches the activity and its subtasks; subtasks with a pending local
/// change keep their displayed status.
async fn activity_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ActivityDetail>, AppError> {
    let (activity, subtasks) = tokio::try_join!(state.gateway.get_activity(id), state.gateway.list_subtasks(id))?;

    state.store.update(|s| match s.activities.iter().position(|a| a.id == id) {
        Some(idx) => s.activities[idx] = activity.clone(),
        None => s.activities.push(activity.clone()),
    });
    state.sync.apply_refresh(id, with_parent(id, subtasks));

    let snapshot = state.store.get_state();
    let item = ActivityWithSubtasks {
        activity,
        subtasks: snapshot.subtasks_of(id),
    };
    let palette = CoursePalette::new(&snapshot.courses);
    let progress = progress::activity_progress(&item, &palette, dates::local_today());

    Ok(Json(ActivityDetail {
        activity: item.activity,
        subtasks: item.subtasks,
        progress,
    }))
}

async fn create_activity(
    State(state): State<AppState>,
    Json(form): Json<ActivityForm>,
) -> Result<(StatusCode, Json<CreatedActivity>), AppError> {
    let created = forms::submit_activity(state.gateway.as_ref(), &form).await?;

    let activity_id = created.activity.id;
    let subtasks = with_parent(activity_id, created.subtasks.clone());
    state.store.update(|s| {
        s.activities.push(created.activity.clone());
        s.subtasks.extend(subtasks);
    });

    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete_activity(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.gateway.delete_activity(id).await?;
    state.store.update(|s| s.remove_activity(id));
    info!("deleted activity {}", id);
    Ok(StatusCode::NO_CONTENT)
}

async fn create_subtask(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(form): Json<SubtaskForm>,
) -> Result<(StatusCode, Json<Subtask>), AppError> {
    let cached = state.store.get_state().activity(id).cloned();
    let activity = match cached {
        Some(activity) => activity,
        None => state.gateway.get_activity(id).await?,
    };

    let req = form
        .validate(activity.deadline_date())
        .map_err(AppError::Validation)?;
    let created = state.gateway.create_subtask(id, &req).await?;

    let mut stored = with_parent(id, vec![created.clone()]);
    state.store.update(|s| s.subtasks.append(&mut stored));

    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Deserialize)]
struct ToggleRequest {
    checked: bool,
    /// Activity-detail behavior: refetch after the reconcile delay.
    #[serde(default)]
    reconcile: bool,
}

#[derive(Serialize)]
struct ToggleResponse {
    activity_id: i64,
    subtask_id: i64,
    status: SubtaskStatus,
    phase: SyncPhase,
}

/// The optimistic status is visible to other readers while the backend
/// request runs; the response waits for the backend answer.
async fn toggle_status(
    State(state): State<AppState>,
    Path((activity_id, subtask_id)): Path<(i64, i64)>,
    Json(req): Json<ToggleRequest>,
) -> Result<Json<ToggleResponse>, AppError> {
    let pending = if req.reconcile {
        state.sync.toggle_and_reconcile(activity_id, subtask_id, req.checked)?
    } else {
        state.sync.toggle_status(activity_id, subtask_id, req.checked)?
    };
    let status = pending.displayed;
    pending.outcome().await?;

    Ok(Json(ToggleResponse {
        activity_id,
        subtask_id,
        status,
        phase: state.sync.phase(activity_id, subtask_id),
    }))
}

#[derive(Deserialize)]
struct NewCourseBody {
    name: String,
}

async fn create_course(
    State(state): State<AppState>,
    Json(body): Json<NewCourseBody>,
) -> Result<(StatusCode, Json<Course>), AppError> {
    let course = forms::create_course(state.gateway.as_ref(), &body.name).await?;
    state.store.update(|s| s.courses.push(course.clone()));
    Ok((StatusCode::CREATED, Json(course)))
}

async fn refresh(State(state): State<AppState>) -> Result<Json<RefreshStats>, AppError> {
    let snapshot = load_snapshot(&state.gateway).await?;
    let stats = state.sync.apply_snapshot(snapshot);
    Ok(Json(stats))
}
