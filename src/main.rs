mod api;
mod command;
mod config;
mod fetcher;
mod hardware;
mod scheduler;

use api::HttpManagerApi;
use config::ClientConfig;
use fetcher::Fetcher;
use hardware::{Hardware, SimulatedHardware};
use scheduler::{Scheduler, SchedulerSettings};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = ClientConfig::load_or_default();

    info!("Pi client starting");
    info!("  manager: {}", config.manager_url);
    info!("  poll period: {}s", config.poll_period_secs);
    info!("  update period: {}s", config.update_period_secs);

    let hardware: Arc<SimulatedHardware> = Arc::new(SimulatedHardware::new(config.sim_config()));
    let api = Arc::new(HttpManagerApi::new(config.manager_url.clone()));

    let (scheduler_tx, scheduler_rx) = mpsc::channel(8);
    let token = CancellationToken::new();

    let scheduler = Scheduler::new(
        api.clone(),
        hardware.clone() as Arc<dyn Hardware>,
        SchedulerSettings {
            password: config.password.clone(),
            poll_period: config.poll_period(),
            do_nothing_dwell: config.do_nothing_dwell(),
            moisture_sensor_name: config.moisture_sensor_name.clone(),
            light_sensor_name: config.light_sensor_name.clone(),
        },
    );
    let fetcher = Fetcher::new(
        api,
        scheduler_tx,
        config.password.clone(),
        config.update_period(),
    );

    let scheduler_handle = tokio::spawn(scheduler.run(scheduler_rx, token.clone()));
    let fetcher_handle = tokio::spawn(fetcher.run(token.clone()));
    info!("Client started with scheduler and update fetcher workers");

    tokio::signal::ctrl_c().await?;

    info!("Stopping all workers...");
    token.cancel();
    let (scheduler_result, fetcher_result) = tokio::join!(scheduler_handle, fetcher_handle);
    if let Err(e) = scheduler_result {
        error!("Scheduler worker panicked: {}", e);
    }
    if let Err(e) = fetcher_result {
        error!("Update fetcher worker panicked: {}", e);
    }

    if let Err(e) = hardware.cleanup().await {
        error!("Hardware cleanup failed: {}", e);
    }
    info!("Done");
    Ok(())
}
