use std::sync::Arc;

use crate::config::AppConfig;
use crate::gateway::Gateway;
use crate::services::StatusSyncController;
use crate::store::{PlannerState, Store, UserProfile};

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn Gateway>,
    pub store: Store<PlannerState>,
    pub sync: StatusSyncController,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(gateway: Arc<dyn Gateway>, config: AppConfig) -> Self {
        let store = Store::new(PlannerState::with_user(UserProfile {
            id: config.user_id,
            name: config.user_name.clone(),
            daily_limit: config.daily_limit_hours,
        }));
        let sync = StatusSyncController::from_config(gateway.clone(), store.clone(), &config);
        Self {
            gateway,
            store,
            sync,
            config: Arc::new(config),
        }
    }
}
