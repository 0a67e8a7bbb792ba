use serde::Serialize;

use crate::error::AppError;
use crate::models::SubtaskStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// Displayed value is backend truth; refreshes are adopted.
    Synced,
    /// Update request in flight.
    OptimisticPending,
    /// Backend accepted the update; still inside the grace window.
    OptimisticConfirming,
}

/// What happened to a value observed from a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Adopted,
    /// Backend caught up with the optimistic value; the entry is synced now.
    Settled,
    Suppressed,
}

/// Per-subtask optimistic update tracking.
///
/// Every toggle bumps `generation`; completions, failures and grace timers
/// carry the generation they were started with and are ignored once a newer
/// toggle has taken over.
#[derive(Debug, Clone, PartialEq)]
pub struct ToggleState {
    phase: SyncPhase,
    displayed: SubtaskStatus,
    previous: SubtaskStatus,
    generation: u64,
}

impl ToggleState {
    pub fn synced(status: SubtaskStatus) -> Self {
        Self {
            phase: SyncPhase::Synced,
            displayed: status,
            previous: status,
            generation: 0,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn displayed(&self) -> SubtaskStatus {
        self.displayed
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_in_flight(&self) -> bool {
        self.phase == SyncPhase::OptimisticPending
    }

    pub fn is_locally_changed(&self) -> bool {
        self.phase != SyncPhase::Synced
    }

    /// User toggle. Only one request per subtask may be in flight.
    pub fn begin(&mut self, target: SubtaskStatus) -> Result<u64, AppError> {
        if self.phase == SyncPhase::OptimisticPending {
            return Err(AppError::Conflict("status update already in progress".to_string()));
        }
        self.previous = self.displayed;
        self.displayed = target;
        self.phase = SyncPhase::OptimisticPending;
        self.generation += 1;
        Ok(self.generation)
    }

    pub fn confirm(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.phase != SyncPhase::OptimisticPending {
            return false;
        }
        self.phase = SyncPhase::OptimisticConfirming;
        true
    }

    /// Backend rejected the update. Returns the status to restore.
    pub fn fail(&mut self, generation: u64) -> Option<SubtaskStatus> {
        if generation != self.generation || self.phase != SyncPhase::OptimisticPending {
            return None;
        }
        self.displayed = self.previous;
        self.phase = SyncPhase::Synced;
        Some(self.displayed)
    }

    pub fn grace_elapsed(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.phase != SyncPhase::OptimisticConfirming {
            return false;
        }
        self.phase = SyncPhase::Synced;
        true
    }

    /// A refresh reported `backend` for this subtask.
    pub fn observe(&mut self, backend: SubtaskStatus) -> Observation {
        match self.phase {
            SyncPhase::Synced => {
                self.displayed = backend;
                Observation::Adopted
            }
            SyncPhase::OptimisticConfirming if backend == self.displayed => {
                self.phase = SyncPhase::Synced;
                Observation::Settled
            }
            _ => Observation::Suppressed,
        }
    }
}
