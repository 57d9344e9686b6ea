use std::sync::Arc;

use shipment_tracker::{
    config::ServiceConfig,
    db,
    routes::AppState,
    server,
    storage::{LocationStore, SqliteLocationStore},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServiceConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let pool = db::init_pool(&config.database_url).await?;
    let store: Arc<dyn LocationStore> =
        Arc::new(SqliteLocationStore::open(pool, &config.table_name).await?);

    tracing::info!(
        table = %config.table_name,
        max_locations = config.window(),
        "Storage ready"
    );

    let state = AppState::new(store, config.max_locations);
    server::run_server(&config.bind_addr(), state).await?;

    Ok(())
}
