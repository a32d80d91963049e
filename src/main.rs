use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info};
use tokio_util::sync::CancellationToken;
use tone_terminal_lib::config::AppConfig;
use tone_terminal_lib::core::{provider_for_os, BluestTransport};
use tone_terminal_lib::logging::ConsoleLogger;
use tone_terminal_lib::run_session;

async fn run(cancel: CancellationToken) -> anyhow::Result<()> {
    let config_path = AppConfig::config_path();
    let mut config = AppConfig::load_config(&config_path).await?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    ConsoleLogger::set_level_name(&config.log_level);
    info!("Looking for device '{}'", config.device.device_name);

    let volume = Arc::from(provider_for_os(
        std::env::consts::OS,
        config.volume.fallback_volume,
    ));
    let transport = BluestTransport::new().await?;

    run_session(transport, &config, volume, cancel).await?;
    Ok(())
}

fn main() -> ExitCode {
    ConsoleLogger::init_with_level_name("info");

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = rt.block_on(async {
        let cancel = CancellationToken::new();
        let cancel_on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down");
                cancel_on_signal.cancel();
            }
        });
        run(cancel).await
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
