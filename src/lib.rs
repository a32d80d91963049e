//! Tone Terminal library
//! Finds a Tone Equalizer over Bluetooth LE, sends it the host volume and
//! applies the volume changes it notifies.

// Module declarations
pub mod config;
pub mod core;
pub mod error;
pub mod logging;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::bluetooth::{
    BleTransport, ConnectionManager, NotificationHandler, SessionController, SessionSettings,
};
use crate::core::volume::VolumeProvider;
use crate::error::SessionError;

/// Builds a controller for `transport` from the configuration.
pub fn build_controller<T: BleTransport>(
    transport: T,
    config: &AppConfig,
    volume: Arc<dyn VolumeProvider>,
) -> SessionController<T> {
    SessionController::new(
        transport,
        SessionSettings::from(config),
        ConnectionManager::new(
            config.discovery.operation_timeout(),
            config.device.characteristic_roles,
        ),
        NotificationHandler::new(volume, config.volume.dispatch),
    )
}

/// Runs one session until it fails, the link drops or `cancel` fires.
pub async fn run_session<T: BleTransport>(
    transport: T,
    config: &AppConfig,
    volume: Arc<dyn VolumeProvider>,
    cancel: CancellationToken,
) -> Result<(), SessionError> {
    build_controller(transport, config, volume).run(cancel).await
}
