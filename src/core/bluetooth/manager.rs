//! Session controller for the Tone bridge
//! This module drives one discovery-to-disconnect session:
//! discover and claim, connect, resolve characteristics, write the current
//! volume, subscribe, then handle notifications until cancelled or the link drops.

use std::time::Duration;

use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::core::bluetooth::connection::{warn_on_uuid_mismatch, Connection, ConnectionManager};
use crate::core::bluetooth::device::DeviceMatcher;
use crate::core::bluetooth::discovery::{discover_until_found, RetryPolicy};
use crate::core::bluetooth::notification::{ListenStopReason, NotificationHandler};
use crate::core::bluetooth::scanner::BluetoothScanner;
use crate::core::bluetooth::transport::BleTransport;
use crate::core::bluetooth::types::SessionState;
use crate::error::SessionError;

/// Settings the controller needs, taken from [`AppConfig`]
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub device_name: String,
    pub scan_window: Duration,
    pub retry: RetryPolicy,
    pub service_uuid: Option<Uuid>,
    pub characteristic_uuid: Option<Uuid>,
    pub fallback_volume: u8,
}

impl From<&AppConfig> for SessionSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            device_name: config.device.device_name.clone(),
            scan_window: Duration::from_secs(config.discovery.scan_timeout_secs),
            retry: config.discovery.retry.clone(),
            service_uuid: config.device.service_uuid,
            characteristic_uuid: config.device.characteristic_uuid,
            fallback_volume: config.volume.fallback_volume,
        }
    }
}

/// Drives a single session against one transport
pub struct SessionController<T: BleTransport> {
    transport: T,
    settings: SessionSettings,
    connection_manager: ConnectionManager,
    notification_handler: NotificationHandler,
    state: SessionState,
}

impl<T: BleTransport> SessionController<T> {
    pub fn new(
        transport: T,
        settings: SessionSettings,
        connection_manager: ConnectionManager,
        notification_handler: NotificationHandler,
    ) -> Self {
        Self {
            transport,
            settings,
            connection_manager,
            notification_handler,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Runs one session to completion.
    ///
    /// Returns `Ok(())` when the session closes normally (cancellation or link loss)
    /// and an error when discovery gives up or the connection cannot be set up.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), SessionError> {
        self.transition(SessionState::Idle);

        // The claim lives exactly as long as this run
        let mut scanner = BluetoothScanner::new();
        let matcher = DeviceMatcher::new(&self.settings.device_name);
        info!(target: "ble", "Looking for '{}'", self.settings.device_name);

        let discovered = discover_until_found(
            &mut scanner,
            &self.transport,
            &matcher,
            self.settings.scan_window,
            &self.settings.retry,
            &cancel,
        )
        .await;
        let device = match discovered {
            Ok(Some(device)) => device,
            Ok(None) => {
                info!("Shutdown requested before the device was found");
                self.transition(SessionState::Closed);
                return Ok(());
            }
            Err(e) => return Err(self.fail(e)),
        };
        self.transition(SessionState::Claimed);
        info!(target: "ble", "Device is nearby, proceeding with the application.");

        self.transition(SessionState::Connecting);
        let connected = self
            .connection_manager
            .connect(&self.transport, device)
            .await;
        let connection = match connected {
            Ok(connection) => connection,
            Err(e) => return Err(self.fail(e)),
        };
        self.transition(SessionState::Connected);

        let result = self.serve(&connection, &cancel).await;
        connection.close().await;
        match result {
            Ok(()) => {
                self.transition(SessionState::Closed);
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Setup and steady state on an open connection. The caller closes the link.
    async fn serve(
        &mut self,
        connection: &Connection<T::Session>,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let characteristics = connection.resolve_characteristics().await?;
        warn_on_uuid_mismatch(
            &characteristics,
            self.settings.service_uuid,
            self.settings.characteristic_uuid,
        );

        let volume = self.current_volume().await;
        info!("Current volume: {}", volume);
        connection
            .write_initial_volume(&characteristics, volume.into())
            .await?;
        self.transition(SessionState::WriteComplete);

        let notifications = connection.subscribe(&characteristics).await?;
        self.transition(SessionState::Subscribed);

        match self
            .notification_handler
            .process_notifications(notifications, cancel)
            .await
        {
            ListenStopReason::Cancelled => info!("Session cancelled"),
            ListenStopReason::StreamEnded => {
                info!("Link to {} closed", connection.device().display_name())
            }
            ListenStopReason::LinkError(e) => warn!("Link to {} lost: {}", connection.device().id, e),
        }
        Ok(())
    }

    async fn current_volume(&self) -> u8 {
        let provider = self.notification_handler.volume_provider();
        match provider.current_volume().await {
            Ok(volume) => volume,
            Err(e) => {
                warn!(
                    "Could not read volume from {} backend: {}, using {}",
                    provider.name(),
                    e,
                    self.settings.fallback_volume
                );
                self.settings.fallback_volume
            }
        }
    }

    fn fail(&mut self, e: SessionError) -> SessionError {
        error!("{}", e);
        self.transition(SessionState::Failed);
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::gatt::CharacteristicRoles;
    use crate::core::bluetooth::mock::{characteristic, service, MockEvent, MockTransport, ScanRound};
    use crate::core::bluetooth::types::{Capability::*, DiscoveredDevice};
    use crate::core::volume::FixedVolume;
    use std::sync::Arc;

    fn settings() -> SessionSettings {
        SessionSettings {
            device_name: "Tone Equalizer".into(),
            scan_window: Duration::from_millis(5),
            retry: RetryPolicy {
                initial_backoff_ms: 1,
                max_backoff_ms: 1,
                max_attempts: Some(5),
                ..RetryPolicy::default()
            },
            service_uuid: None,
            characteristic_uuid: None,
            fallback_volume: 50,
        }
    }

    fn controller(transport: MockTransport) -> SessionController<MockTransport> {
        SessionController::new(
            transport,
            settings(),
            ConnectionManager::new(Duration::from_secs(1), CharacteristicRoles::Shared),
            NotificationHandler::new(Arc::new(FixedVolume::new(42)), true),
        )
    }

    fn tone() -> DiscoveredDevice {
        DiscoveredDevice::new(Some("Tone Equalizer".into()), "N/A".into(), "tone".into(), None)
    }

    #[tokio::test]
    async fn closes_after_the_link_drops() {
        let transport = MockTransport::new()
            .with_scan_round(ScanRound::Devices(vec![tone()]))
            .with_services(vec![service(
                0xff00,
                vec![characteristic(0, 0xff01, 0xff00, &[Write, Notify])],
            )])
            .with_notifications(vec![br#"{"value": 10}"#.to_vec()]);
        let mut controller = controller(transport);

        controller.run(CancellationToken::new()).await.unwrap();

        assert_eq!(controller.state(), SessionState::Closed);
        assert_eq!(controller.transport().writes(), vec![b"vol:42".to_vec()]);
        assert_eq!(controller.transport().events().last(), Some(&MockEvent::Disconnect));
    }

    #[tokio::test]
    async fn missing_notify_characteristic_fails_and_disconnects() {
        let transport = MockTransport::new()
            .with_scan_round(ScanRound::Devices(vec![tone()]))
            .with_services(vec![service(0xff00, vec![characteristic(0, 0xff01, 0xff00, &[Write])])]);
        let mut controller = controller(transport);

        let result = controller.run(CancellationToken::new()).await;

        assert!(matches!(result, Err(SessionError::Setup(_))));
        assert_eq!(controller.state(), SessionState::Failed);
        assert!(controller.transport().writes().is_empty());
        assert_eq!(controller.transport().events(), vec![MockEvent::Disconnect]);
    }

    #[tokio::test]
    async fn failed_write_never_subscribes() {
        let transport = MockTransport::new()
            .with_scan_round(ScanRound::Devices(vec![tone()]))
            .with_services(vec![service(
                0xff00,
                vec![characteristic(0, 0xff01, 0xff00, &[Write, Notify])],
            )])
            .fail_write("write rejected");
        let mut controller = controller(transport);

        let result = controller.run(CancellationToken::new()).await;

        assert!(matches!(result, Err(SessionError::InitialWrite(_))));
        assert!(!controller
            .transport()
            .events()
            .iter()
            .any(|e| matches!(e, MockEvent::Subscribe { .. })));
    }

    #[tokio::test]
    async fn subscribe_failure_is_fatal() {
        let transport = MockTransport::new()
            .with_scan_round(ScanRound::Devices(vec![tone()]))
            .with_services(vec![service(
                0xff00,
                vec![characteristic(0, 0xff01, 0xff00, &[Write, Notify])],
            )])
            .fail_subscribe("cccd write failed");
        let mut controller = controller(transport);

        let result = controller.run(CancellationToken::new()).await;

        assert!(matches!(result, Err(SessionError::Subscribe(_))));
        assert_eq!(controller.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn exhausted_discovery_fails_without_connecting() {
        let mut controller = controller(MockTransport::new());

        let result = controller.run(CancellationToken::new()).await;

        assert!(matches!(result, Err(SessionError::DiscoveryExhausted { attempts: 5 })));
        assert_eq!(controller.transport().connect_count(), 0);
        assert_eq!(controller.state(), SessionState::Failed);
    }
}
