pub mod loader;
pub mod scheduler;
pub mod status_sync;

pub use loader::{PlannerSnapshot, load_activities_with_subtasks, load_snapshot};
pub use scheduler::RefreshScheduler;
pub use status_sync::{
    GatewayBackend, PendingToggle, RefreshStats, StatusBackend, StatusSyncController, SyncEvent,
};
