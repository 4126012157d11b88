use color_eyre::{eyre::eyre, Result};
use drivestick::config::DriveConfig;
use drivestick::controller::ControllerCore;
use drivestick::{drive_loop, logging};
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // Optional first argument: path to the config file
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = DriveConfig::load_or_default(config_path.as_deref())
        .map_err(|e| eyre!("Failed to load configuration: {}", e))?;

    if !logging::init(&config.runtime.log_level) {
        eprintln!("A global tracing subscriber was already installed");
    }
    debug!("Effective configuration: {:?}", config);

    let mut controller = ControllerCore::new(
        config.controller_settings(),
        config.device_profile(),
        Box::new(config.device_opener()),
    );
    controller
        .start()
        .map_err(|e| eyre!("Failed to start controller: {}", e))?;

    info!(
        "Drive loop running at {} Hz, press Ctrl-C to quit",
        config.runtime.tick_hz
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let exit = drive_loop::run(&controller, config.tick_interval(), shutdown).await;
    debug!("Drive loop exited: {:?}", exit);

    // Stop may block for the grace period, keep it off the async workers
    tokio::task::block_in_place(|| controller.stop());
    info!("Drive loop finished");
    Ok(())
}
