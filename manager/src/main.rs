mod config;
mod routes;
mod store;

use config::ManagerConfig;
use routes::AppState;
use std::sync::Arc;
use store::Store;

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = ManagerConfig::load_or_default();

    let store = Arc::new(Store::open(&config.db_path)?);
    if store.seed(&config.seed)? {
        info!("Seeded empty database from config");
    }

    let app = routes::build_router(AppState {
        store,
        password: config.password.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!("Manager listening on http://{}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
