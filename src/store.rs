use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::models::{Activity, ActivityWithSubtasks, Course, ReprogrammingLog, Subtask, SubtaskStatus};

/// Snapshot-and-replace container. Readers get an `Arc` of the current
/// state; writers always install a new value, so a reader never observes a
/// half-applied update.
pub struct Store<S> {
    tx: Arc<watch::Sender<Arc<S>>>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<S: Clone> Store<S> {
    pub fn new(initial: S) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx: Arc::new(tx) }
    }

    pub fn get_state(&self) -> Arc<S> {
        self.tx.borrow().clone()
    }

    pub fn set_state<F>(&self, updater: F)
    where
        F: FnOnce(&S) -> S,
    {
        self.tx.send_modify(|current| *current = Arc::new(updater(current)));
    }

    /// Clone the current state, mutate the clone, install it.
    pub fn update<F, R>(&self, mutate: F) -> R
    where
        F: FnOnce(&mut S) -> R,
    {
        let mut out = None;
        self.tx.send_modify(|current| {
            let mut next = S::clone(current);
            out = Some(mutate(&mut next));
            *current = Arc::new(next);
        });
        match out {
            Some(value) => value,
            None => unreachable!("send_modify always runs its closure"),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<S>> {
        self.tx.subscribe()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub daily_limit: f64,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            id: 1,
            name: "Alex Johnson".to_string(),
            daily_limit: 6.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlannerState {
    pub user: UserProfile,
    pub courses: Vec<Course>,
    pub activities: Vec<Activity>,
    /// Subtasks of every activity, flattened in fetch order.
    pub subtasks: Vec<Subtask>,
    pub logs: Vec<ReprogrammingLog>,
    pub loaded: bool,
}

impl PlannerState {
    pub fn with_user(user: UserProfile) -> Self {
        Self {
            user,
            ..Default::default()
        }
    }

    pub fn activity(&self, id: i64) -> Option<&Activity> {
        self.activities.iter().find(|a| a.id == id)
    }

    pub fn subtask(&self, activity_id: i64, subtask_id: i64) -> Option<&Subtask> {
        self.subtasks
            .iter()
            .find(|s| s.id == subtask_id && s.activity_id() == Some(activity_id))
    }

    pub fn subtasks_of(&self, activity_id: i64) -> Vec<Subtask> {
        self.subtasks
            .iter()
            .filter(|s| s.activity_id() == Some(activity_id))
            .cloned()
            .collect()
    }

    /// Returns false when the subtask is not in the state.
    pub fn set_subtask_status(&mut self, activity_id: i64, subtask_id: i64, status: SubtaskStatus) -> bool {
        match self
            .subtasks
            .iter_mut()
            .find(|s| s.id == subtask_id && s.activity_id() == Some(activity_id))
        {
            Some(subtask) => {
                subtask.status = status;
                true
            }
            None => false,
        }
    }

    /// Swap in a freshly fetched subtask list for one activity, keeping the
    /// position of that activity's block in the flat list.
    pub fn replace_subtasks_of(&mut self, activity_id: i64, fresh: Vec<Subtask>) {
        let first = self
            .subtasks
            .iter()
            .position(|s| s.activity_id() == Some(activity_id))
            .unwrap_or(self.subtasks.len());
        self.subtasks.retain(|s| s.activity_id() != Some(activity_id));
        let at = first.min(self.subtasks.len());
        self.subtasks.splice(at..at, fresh);
    }

    pub fn push_subtask(&mut self, subtask: Subtask) {
        self.subtasks.push(subtask);
    }

    pub fn remove_activity(&mut self, activity_id: i64) {
        self.activities.retain(|a| a.id != activity_id);
        self.subtasks.retain(|s| s.activity_id() != Some(activity_id));
    }

    /// Activities joined with their subtasks, in activity order.
    pub fn activities_with_subtasks(&self) -> Vec<ActivityWithSubtasks> {
        let mut by_activity: HashMap<i64, Vec<Subtask>> = HashMap::new();
        for subtask in &self.subtasks {
            if let Some(id) = subtask.activity_id() {
                by_activity.entry(id).or_default().push(subtask.clone());
            }
        }

        self.activities
            .iter()
            .map(|activity| ActivityWithSubtasks {
                activity: activity.clone(),
                subtasks: by_activity.remove(&activity.id).unwrap_or_default(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityRef;

    fn subtask(id: i64, activity: i64) -> Subtask {
        Subtask {
            id,
            title: format!("st-{}", id),
            activity: Some(ActivityRef::Id(activity)),
            status: SubtaskStatus::Pending,
            estimated_hours: 1.0,
            target_date: None,
            execution_note: None,
        }
    }

    #[test]
    fn snapshots_are_not_mutated_by_later_writes() {
        let store = Store::new(PlannerState {
            subtasks: vec![subtask(1, 10)],
            ..Default::default()
        });
        let before = store.get_state();

        store.update(|s| s.set_subtask_status(10, 1, SubtaskStatus::Done));

        assert_eq!(before.subtasks[0].status, SubtaskStatus::Pending);
        assert_eq!(store.get_state().subtasks[0].status, SubtaskStatus::Done);
    }

    #[test]
    fn subscribers_see_new_state() {
        let store = Store::new(PlannerState::default());
        let mut rx = store.subscribe();

        store.set_state(|s| PlannerState {
            loaded: true,
            ..s.clone()
        });

        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().loaded);
    }

    #[test]
    fn replacing_one_activity_keeps_block_position() {
        let mut state = PlannerState {
            subtasks: vec![subtask(1, 10), subtask(2, 20), subtask(3, 20), subtask(4, 30)],
            ..Default::default()
        };

        state.replace_subtasks_of(20, vec![subtask(5, 20)]);

        let ids: Vec<i64> = state.subtasks.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 5, 4]);
    }

    #[test]
    fn status_update_targets_one_subtask() {
        let mut state = PlannerState {
            subtasks: vec![subtask(1, 10), subtask(1, 20)],
            ..Default::default()
        };

        assert!(state.set_subtask_status(20, 1, SubtaskStatus::Done));
        assert!(!state.set_subtask_status(99, 1, SubtaskStatus::Done));
        assert_eq!(state.subtasks[0].status, SubtaskStatus::Pending);
        assert_eq!(state.subtasks[1].status, SubtaskStatus::Done);
    }
}
