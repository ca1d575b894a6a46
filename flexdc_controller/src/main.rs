use crate::{
    config::{create_default_config, init_config},
    controllers::flexdc::{create_controller, poller::run_poller},
};

use flexdc::Axis;
use std::path::PathBuf;
use tracing::{error, info, warn};

pub mod command_executor;
pub mod config;
pub mod console;
pub mod controllers;
pub mod logging;

fn should_create_config() -> bool {
    std::env::var("CREATE_CONFIG")
        .map(|val| val == "1" || val.to_lowercase() == "true")
        .unwrap_or(false)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if should_create_config() {
        create_default_config(None::<PathBuf>)?;
    }

    let (_config_manager, config) = init_config().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Run with CREATE_CONFIG=1 to create a default configuration file.");
        e
    })?;

    let _log_guard = logging::init(&config.logging)?;

    let (executor, sender) = create_controller(&config.controller)?;
    let executor_handle = executor.spawn();

    let poller_handle = tokio::spawn(run_poller(
        sender.clone(),
        config.controller.moving_poll_period(),
        config.controller.idle_poll_period(),
    ));

    match sender.version().await {
        Ok(version) => info!(
            "FlexDC controller {} running firmware {}",
            config.controller.name, version
        ),
        Err(e) => warn!(
            "FlexDC controller {} not answering yet: {}",
            config.controller.name, e
        ),
    }

    tokio::select! {
        result = console::run_console(sender.clone()) => {
            if let Err(e) = result {
                error!("Console stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    info!("Shutting down");
    for axis in Axis::ALL {
        if let Err(e) = sender.stop(axis).await {
            warn!("Failed to stop axis {}: {}", axis, e);
        }
    }

    poller_handle.abort();
    let _ = poller_handle.await;
    drop(sender);

    executor_handle.await??;

    Ok(())
}
