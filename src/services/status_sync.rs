use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::gateway::Gateway;
use crate::models::{Subtask, SubtaskPatch, SubtaskStatus};
use crate::services::loader::{PlannerSnapshot, with_parent};
use crate::store::{PlannerState, Store};
use crate::sync::{Observation, SyncPhase, ToggleState};

pub const MSG_TASK_COMPLETED: &str = "Tarea completada exitosamente";
pub const MSG_CHANGES_SAVED: &str = "Cambios guardados correctamente";
pub const MSG_TOGGLE_FAILED: &str =
    "No se pudo actualizar la tarea. Verifica tu conexión e intenta de nuevo.";

const EVENT_CAPACITY: usize = 64;

/// The two backend calls status sync needs.
#[async_trait]
pub trait StatusBackend: Send + Sync {
    async fn push_status(&self, activity_id: i64, subtask_id: i64, status: SubtaskStatus) -> Result<(), AppError>;
    async fn fetch_activity_subtasks(&self, activity_id: i64) -> Result<Vec<Subtask>, AppError>;
}

pub struct GatewayBackend(pub Arc<dyn Gateway>);

#[async_trait]
impl StatusBackend for GatewayBackend {
    async fn push_status(&self, activity_id: i64, subtask_id: i64, status: SubtaskStatus) -> Result<(), AppError> {
        self.0
            .patch_subtask(activity_id, subtask_id, &SubtaskPatch::status(status))
            .await
            .map(|_| ())
    }

    async fn fetch_activity_subtasks(&self, activity_id: i64) -> Result<Vec<Subtask>, AppError> {
        let subtasks = self.0.list_subtasks(activity_id).await?;
        Ok(with_parent(activity_id, subtasks))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncEvent {
    Optimistic {
        activity_id: i64,
        subtask_id: i64,
        status: SubtaskStatus,
    },
    Confirmed {
        activity_id: i64,
        subtask_id: i64,
        status: SubtaskStatus,
        message: String,
    },
    /// Grace window over; refreshes for this subtask are trusted again.
    Settled { activity_id: i64, subtask_id: i64 },
    RolledBack {
        activity_id: i64,
        subtask_id: i64,
        status: SubtaskStatus,
        message: String,
    },
    Reconciled {
        activity_id: i64,
        subtask_id: i64,
        adopted: bool,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStats {
    pub adopted: usize,
    pub suppressed: usize,
}

/// A toggle whose optimistic value is already applied.
pub struct PendingToggle {
    pub displayed: SubtaskStatus,
    pub generation: u64,
    task: JoinHandle<Result<(), AppError>>,
}

impl PendingToggle {
    /// Wait for the backend answer. On error the rollback has already been
    /// applied to the store.
    pub async fn outcome(self) -> Result<(), AppError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                warn!("Status update task aborted: {}", e);
                Err(AppError::InternalServerError)
            }
        }
    }
}

type SubtaskKey = (i64, i64);

struct Inner {
    backend: Arc<dyn StatusBackend>,
    store: Store<PlannerState>,
    toggles: Mutex<HashMap<SubtaskKey, ToggleState>>,
    events: broadcast::Sender<SyncEvent>,
    alive: AtomicBool,
    grace: Duration,
    reconcile_delay: Duration,
}

/// Optimistic completion toggles over the shared planner state.
#[derive(Clone)]
pub struct StatusSyncController {
    inner: Arc<Inner>,
}

impl StatusSyncController {
    pub fn new(
        backend: Arc<dyn StatusBackend>,
        store: Store<PlannerState>,
        grace: Duration,
        reconcile_delay: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                backend,
                store,
                toggles: Mutex::new(HashMap::new()),
                events,
                alive: AtomicBool::new(true),
                grace,
                reconcile_delay,
            }),
        }
    }

    pub fn from_config(gateway: Arc<dyn Gateway>, store: Store<PlannerState>, config: &AppConfig) -> Self {
        Self::new(
            Arc::new(GatewayBackend(gateway)),
            store,
            config.status_grace,
            config.reconcile_delay,
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    /// Stop applying results. Requests already sent still complete on the
    /// backend, but nothing they return touches the state anymore.
    pub fn shutdown(&self) {
        info!("Status sync shutting down");
        self.inner.alive.store(false, Ordering::SeqCst);
    }

    pub fn phase(&self, activity_id: i64, subtask_id: i64) -> SyncPhase {
        self.inner
            .toggles()
            .get(&(activity_id, subtask_id))
            .map(ToggleState::phase)
            .unwrap_or(SyncPhase::Synced)
    }

    pub fn toggle_status(&self, activity_id: i64, subtask_id: i64, checked: bool) -> Result<PendingToggle, AppError> {
        self.start_toggle(activity_id, subtask_id, checked, false)
    }

    /// Activity-detail variant: once the update is accepted, refetch the
    /// activity's subtasks after the reconcile delay.
    pub fn toggle_and_reconcile(
        &self,
        activity_id: i64,
        subtask_id: i64,
        checked: bool,
    ) -> Result<PendingToggle, AppError> {
        self.start_toggle(activity_id, subtask_id, checked, true)
    }

    fn start_toggle(
        &self,
        activity_id: i64,
        subtask_id: i64,
        checked: bool,
        reconcile: bool,
    ) -> Result<PendingToggle, AppError> {
        if !self.is_alive() {
            return Err(AppError::Conflict("status sync is shut down".to_string()));
        }

        let target = SubtaskStatus::from_checked(checked);
        let key = (activity_id, subtask_id);

        let generation = {
            let mut toggles = self.inner.toggles();
            let current = self
                .inner
                .store
                .get_state()
                .subtask(activity_id, subtask_id)
                .map(|s| s.status)
                .ok_or(AppError::NotFound)?;

            let entry = toggles.entry(key).or_insert_with(|| ToggleState::synced(current));
            if entry.phase() == SyncPhase::Synced {
                entry.observe(current);
            }
            let generation = entry.begin(target)?;

            self.inner
                .store
                .update(|state| state.set_subtask_status(activity_id, subtask_id, target));
            generation
        };

        debug!(
            "Optimistic status {:?} for subtask {} of activity {} (generation {})",
            target, subtask_id, activity_id, generation
        );
        self.inner.emit(SyncEvent::Optimistic {
            activity_id,
            subtask_id,
            status: target,
        });

        let controller = self.clone();
        let task = tokio::spawn(async move {
            controller
                .push_in_background(key, target, generation, reconcile)
                .await
        });

        Ok(PendingToggle {
            displayed: target,
            generation,
            task,
        })
    }

    async fn push_in_background(
        &self,
        key: SubtaskKey,
        target: SubtaskStatus,
        generation: u64,
        reconcile: bool,
    ) -> Result<(), AppError> {
        let (activity_id, subtask_id) = key;
        let result = self.inner.backend.push_status(activity_id, subtask_id, target).await;

        if !self.is_alive() {
            debug!("Dropping status result for subtask {}: shut down", subtask_id);
            return result;
        }

        match result {
            Ok(()) => {
                let confirmed = self
                    .inner
                    .toggles()
                    .get_mut(&key)
                    .is_some_and(|state| state.confirm(generation));
                if confirmed {
                    let message = if target.is_done() { MSG_TASK_COMPLETED } else { MSG_CHANGES_SAVED };
                    self.inner.emit(SyncEvent::Confirmed {
                        activity_id,
                        subtask_id,
                        status: target,
                        message: message.to_string(),
                    });
                    self.spawn_grace_timer(key, generation);
                    if reconcile {
                        self.spawn_reconcile(key, target);
                    }
                }
                Ok(())
            }
            Err(e) => {
                warn!(
                    "Status update for subtask {} of activity {} failed, rolling back: {}",
                    subtask_id, activity_id, e
                );
                let restored = {
                    let mut toggles = self.inner.toggles();
                    let restored = toggles.get_mut(&key).and_then(|state| state.fail(generation));
                    if let Some(status) = restored {
                        toggles.remove(&key);
                        self.inner
                            .store
                            .update(|state| state.set_subtask_status(activity_id, subtask_id, status));
                    }
                    restored
                };
                if let Some(restored) = restored {
                    self.inner.emit(SyncEvent::RolledBack {
                        activity_id,
                        subtask_id,
                        status: restored,
                        message: MSG_TOGGLE_FAILED.to_string(),
                    });
                }
                Err(e)
            }
        }
    }

    fn spawn_grace_timer(&self, key: SubtaskKey, generation: u64) {
        let controller = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(controller.inner.grace).await;
            if !controller.is_alive() {
                return;
            }
            let settled = {
                let mut toggles = controller.inner.toggles();
                let settled = toggles
                    .get_mut(&key)
                    .is_some_and(|state| state.grace_elapsed(generation));
                if settled {
                    toggles.remove(&key);
                }
                settled
            };
            if settled {
                debug!("Grace window over for subtask {}", key.1);
                controller.inner.emit(SyncEvent::Settled {
                    activity_id: key.0,
                    subtask_id: key.1,
                });
            }
        });
    }

    fn spawn_reconcile(&self, key: SubtaskKey, expected: SubtaskStatus) {
        let controller = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(controller.inner.reconcile_delay).await;
            if let Err(e) = controller.reconcile_activity(key.0, key.1, expected).await {
                warn!("Reconciling fetch for activity {} failed: {}", key.0, e);
            }
        });
    }

    /// Refetch one activity's subtasks and adopt them only if the backend
    /// already reports `expected` for the subtask that was just changed.
    /// Returns whether the refetched list was adopted.
    pub async fn reconcile_activity(
        &self,
        activity_id: i64,
        subtask_id: i64,
        expected: SubtaskStatus,
    ) -> Result<bool, AppError> {
        let fresh = self.inner.backend.fetch_activity_subtasks(activity_id).await?;
        if !self.is_alive() {
            return Ok(false);
        }

        let agrees = fresh
            .iter()
            .find(|s| s.id == subtask_id)
            .is_some_and(|s| s.status == expected);

        if agrees {
            self.apply_refresh(activity_id, fresh);
        } else {
            info!(
                "Backend has not caught up on subtask {} yet, keeping local state",
                subtask_id
            );
        }

        self.inner.emit(SyncEvent::Reconciled {
            activity_id,
            subtask_id,
            adopted: agrees,
        });
        Ok(agrees)
    }

    /// Install a freshly fetched subtask list for one activity. Subtasks with
    /// an unconfirmed local change keep their displayed status.
    pub fn apply_refresh(&self, activity_id: i64, mut fresh: Vec<Subtask>) -> RefreshStats {
        if !self.is_alive() {
            return RefreshStats::default();
        }
        let mut toggles = self.inner.toggles();
        let stats = merge_statuses(&mut toggles, &mut fresh);
        self.inner
            .store
            .update(|state| state.replace_subtasks_of(activity_id, fresh));
        stats
    }

    /// Install a full reload, with the same suppression rule per subtask.
    pub fn apply_snapshot(&self, snapshot: PlannerSnapshot) -> RefreshStats {
        if !self.is_alive() {
            return RefreshStats::default();
        }
        let PlannerSnapshot {
            courses,
            activities,
            mut subtasks,
            logs,
        } = snapshot;

        let mut toggles = self.inner.toggles();
        let stats = merge_statuses(&mut toggles, &mut subtasks);
        self.inner.store.update(|state| {
            state.courses = courses;
            state.activities = activities;
            state.subtasks = subtasks;
            state.logs = logs;
            state.loaded = true;
        });
        if stats.suppressed > 0 {
            info!("Refresh kept {} optimistic statuses", stats.suppressed);
        }
        stats
    }
}

impl Inner {
    fn toggles(&self) -> MutexGuard<'_, HashMap<SubtaskKey, ToggleState>> {
        self.toggles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn merge_statuses(toggles: &mut HashMap<SubtaskKey, ToggleState>, fresh: &mut [Subtask]) -> RefreshStats {
    let mut stats = RefreshStats::default();
    for subtask in fresh.iter_mut() {
        let Some(activity_id) = subtask.activity_id() else {
            stats.adopted += 1;
            continue;
        };
        let key = (activity_id, subtask.id);
        match toggles.get_mut(&key).map(|state| (state.observe(subtask.status), state.displayed())) {
            Some((Observation::Suppressed, displayed)) => {
                warn!(
                    "Skipping refreshed status of subtask {} (local change pending)",
                    subtask.id
                );
                subtask.status = displayed;
                stats.suppressed += 1;
            }
            Some((Observation::Settled, _)) => {
                toggles.remove(&key);
                stats.adopted += 1;
            }
            Some((Observation::Adopted, _)) | None => stats.adopted += 1,
        }
    }
    stats
}
