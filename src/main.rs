use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use study_planner::api::router;
use study_planner::config::AppConfig;
use study_planner::dates;
use study_planner::gateway::{Gateway, HttpGateway, InMemoryGateway};
use study_planner::services::{RefreshScheduler, load_snapshot};
use study_planner::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "study_planner=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;

    let gateway: Arc<dyn Gateway> = if config.demo_mode {
        info!("Using in-memory demo backend");
        Arc::new(InMemoryGateway::with_demo_data(dates::local_today()))
    } else {
        let http = HttpGateway::new(&config)?;
        info!("Using backend at {}", http.base_url());
        Arc::new(http)
    };

    let state = AppState::new(gateway.clone(), config.clone());

    match load_snapshot(&gateway).await {
        Ok(snapshot) => {
            state.sync.apply_snapshot(snapshot);
        }
        Err(e) => warn!("Initial load failed, starting empty: {}", e),
    }

    if let Some(interval) = config.refresh_interval {
        let scheduler = RefreshScheduler::new(gateway.clone(), state.sync.clone(), interval);
        tokio::spawn(scheduler.start());
    }

    let sync = state.sync.clone();
    let app = router(state);

    info!("listening on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    sync.shutdown();
    Ok(())
}
