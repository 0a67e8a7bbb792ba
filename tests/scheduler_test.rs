use std::sync::Arc;
use std::time::Duration;

use study_planner::config::AppConfig;
use study_planner::dates;
use study_planner::gateway::{Gateway, InMemoryGateway};
use study_planner::models::{SubtaskPatch, SubtaskStatus};
use study_planner::services::RefreshScheduler;
use study_planner::state::AppState;

fn demo_state() -> AppState {
    let gateway: Arc<dyn Gateway> = Arc::new(InMemoryGateway::with_demo_data(dates::local_today()));
    AppState::new(gateway, AppConfig::default())
}

#[tokio::test(start_paused = true)]
async fn scheduler_loads_on_each_tick() {
    let state = demo_state();
    assert!(!state.store.get_state().loaded);

    let scheduler = RefreshScheduler::new(state.gateway.clone(), state.sync.clone(), Duration::from_secs(30));
    let task = tokio::spawn(scheduler.start());

    tokio::time::sleep(Duration::from_secs(31)).await;
    let snapshot = state.store.get_state();
    assert!(snapshot.loaded);
    assert_eq!(snapshot.activities.len(), 3);
    assert_eq!(snapshot.subtasks.len(), 11);

    // A change made on the backend shows up after the next tick.
    let activity_id = snapshot.activities[0].id;
    let subtask_id = snapshot.subtasks_of(activity_id)[1].id;
    state
        .gateway
        .patch_subtask(activity_id, subtask_id, &SubtaskPatch::status(SubtaskStatus::Done))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(30)).await;
    let refreshed = state.store.get_state();
    assert_eq!(refreshed.subtask(activity_id, subtask_id).unwrap().status, SubtaskStatus::Done);

    state.sync.shutdown();
    tokio::time::timeout(Duration::from_secs(60), task)
        .await
        .expect("scheduler did not stop after shutdown")
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn scheduled_refresh_keeps_optimistic_status() {
    let state = demo_state();
    let scheduler = RefreshScheduler::new(state.gateway.clone(), state.sync.clone(), Duration::from_secs(30));
    scheduler.run_refresh().await.unwrap();

    let snapshot = state.store.get_state();
    let activity_id = snapshot.activities[0].id;
    let subtask_id = snapshot.subtasks_of(activity_id)[1].id;

    // Toggle is confirmed, then the backend loses the write before the next
    // reload comes in.
    state
        .sync
        .toggle_status(activity_id, subtask_id, true)
        .unwrap()
        .outcome()
        .await
        .unwrap();
    state
        .gateway
        .patch_subtask(activity_id, subtask_id, &SubtaskPatch::status(SubtaskStatus::Pending))
        .await
        .unwrap();

    let stats = scheduler.run_refresh().await.unwrap();

    assert_eq!(stats.suppressed, 1);
    assert_eq!(
        state.store.get_state().subtask(activity_id, subtask_id).unwrap().status,
        SubtaskStatus::Done
    );
}
