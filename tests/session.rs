use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tone_terminal_lib::build_controller;
use tone_terminal_lib::config::AppConfig;
use tone_terminal_lib::core::bluetooth::mock::{
    characteristic, service, MockEvent, MockTransport, ScanRound,
};
use tone_terminal_lib::core::bluetooth::{
    Capability, CharacteristicRoles, DiscoveredDevice, RetryPolicy, SessionState,
};
use tone_terminal_lib::core::VolumeProvider;
use tone_terminal_lib::error::{SessionError, VolumeError};
use uuid::Uuid;

/// Volume backend that records every set
struct RecordingVolume {
    current: u8,
    sets: Mutex<Vec<u8>>,
}

impl RecordingVolume {
    fn new(current: u8) -> Arc<Self> {
        Arc::new(Self {
            current,
            sets: Mutex::new(Vec::new()),
        })
    }

    fn sets(&self) -> Vec<u8> {
        self.sets.lock().unwrap().clone()
    }
}

#[async_trait]
impl VolumeProvider for RecordingVolume {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn can_set(&self) -> bool {
        true
    }

    async fn current_volume(&self) -> Result<u8, VolumeError> {
        Ok(self.current)
    }

    async fn set_volume(&self, volume: u8) -> Result<(), VolumeError> {
        self.sets.lock().unwrap().push(volume);
        Ok(())
    }
}

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.discovery.scan_timeout_secs = 1;
    config.discovery.retry = RetryPolicy {
        initial_backoff_ms: 1,
        max_backoff_ms: 2,
        max_attempts: Some(10),
        ..RetryPolicy::default()
    };
    config
}

fn named(name: &str, id: &str) -> DiscoveredDevice {
    DiscoveredDevice::new(Some(name.to_string()), "AA:BB:CC:DD:EE:FF".into(), id.into(), Some(-60))
}

fn tone_topology() -> Vec<tone_terminal_lib::core::bluetooth::GattService> {
    vec![service(
        0xff00,
        vec![characteristic(
            0,
            0xff01,
            0xff00,
            &[Capability::Write, Capability::Notify],
        )],
    )]
}

#[tokio::test]
async fn pushes_volume_and_applies_notified_value() {
    let transport = MockTransport::new()
        .with_scan_round(ScanRound::Devices(vec![
            named("Headphones", "other"),
            named("Tone Equalizer Pro", "tone"),
        ]))
        .with_services(tone_topology())
        .with_notifications(vec![br#"{"value": 30}"#.to_vec()]);
    let volume = RecordingVolume::new(50);
    let mut controller = build_controller(transport, &config(), volume.clone());

    controller.run(CancellationToken::new()).await.unwrap();

    let uuid = Uuid::from_u128(0xff01);
    assert_eq!(
        controller.transport().events(),
        vec![
            MockEvent::Write {
                characteristic: uuid,
                data: b"vol:50".to_vec()
            },
            MockEvent::Subscribe { characteristic: uuid },
            MockEvent::Disconnect,
        ]
    );
    assert_eq!(volume.sets(), vec![30]);
    assert_eq!(controller.state(), SessionState::Closed);
    assert_eq!(controller.transport().connect_count(), 1);
}

#[tokio::test]
async fn retries_discovery_until_the_device_shows_up() {
    let transport = MockTransport::new()
        .with_scan_round(ScanRound::Devices(vec![named("Headphones", "other")]))
        .with_scan_round(ScanRound::Devices(vec![]))
        .with_scan_round(ScanRound::Devices(vec![
            named("tone equalizer", "tone"),
            named("Tone Equalizer 2", "tone-2"),
        ]))
        .with_services(tone_topology());
    let volume = RecordingVolume::new(7);
    let mut controller = build_controller(transport, &config(), volume);

    controller.run(CancellationToken::new()).await.unwrap();

    assert_eq!(controller.transport().scan_count(), 3);
    assert_eq!(controller.transport().connect_count(), 1);
    assert_eq!(controller.transport().writes(), vec![b"vol:7".to_vec()]);
}

#[tokio::test]
async fn malformed_frames_keep_the_session_open() {
    let transport = MockTransport::new()
        .with_scan_round(ScanRound::Devices(vec![named("Tone Equalizer", "tone")]))
        .with_services(tone_topology())
        .with_notifications(vec![
            b"".to_vec(),
            vec![0xff, 0xfe],
            b"hello".to_vec(),
            br#"{"value": "loud"}"#.to_vec(),
            br#"{"value": 120}"#.to_vec(),
        ]);
    let volume = RecordingVolume::new(50);
    let mut controller = build_controller(transport, &config(), volume.clone());

    controller.run(CancellationToken::new()).await.unwrap();

    assert_eq!(volume.sets(), vec![100]);
    assert_eq!(controller.state(), SessionState::Closed);
}

#[tokio::test]
async fn dispatch_disabled_only_logs() {
    let transport = MockTransport::new()
        .with_scan_round(ScanRound::Devices(vec![named("Tone Equalizer", "tone")]))
        .with_services(tone_topology())
        .with_notifications(vec![br#"{"value": 30}"#.to_vec()]);
    let volume = RecordingVolume::new(50);
    let mut config = config();
    config.volume.dispatch = false;
    let mut controller = build_controller(transport, &config, volume.clone());

    controller.run(CancellationToken::new()).await.unwrap();

    assert!(volume.sets().is_empty());
}

#[tokio::test]
async fn split_roles_write_to_a_separate_characteristic() {
    let transport = MockTransport::new()
        .with_scan_round(ScanRound::Devices(vec![named("Tone Equalizer", "tone")]))
        .with_services(vec![service(
            0xff00,
            vec![
                characteristic(0, 0xff01, 0xff00, &[Capability::Notify]),
                characteristic(1, 0xff02, 0xff00, &[Capability::Write]),
            ],
        )]);
    let mut config = config();
    config.device.characteristic_roles = CharacteristicRoles::Split;
    let mut controller = build_controller(transport, &config, RecordingVolume::new(64));

    controller.run(CancellationToken::new()).await.unwrap();

    assert_eq!(
        controller.transport().events(),
        vec![
            MockEvent::Write {
                characteristic: Uuid::from_u128(0xff02),
                data: b"vol:64".to_vec()
            },
            MockEvent::Subscribe {
                characteristic: Uuid::from_u128(0xff01)
            },
            MockEvent::Disconnect,
        ]
    );
}

#[tokio::test]
async fn connection_failure_is_reported_without_retry() {
    let transport = MockTransport::new()
        .with_scan_round(ScanRound::Devices(vec![named("Tone Equalizer", "tone")]))
        .fail_connect("link refused");
    let mut controller = build_controller(transport, &config(), RecordingVolume::new(50));

    let result = controller.run(CancellationToken::new()).await;

    assert!(matches!(result, Err(SessionError::Connection(_))));
    assert_eq!(controller.state(), SessionState::Failed);
    assert_eq!(controller.transport().connect_count(), 1);
    assert!(controller.transport().events().is_empty());
}

#[tokio::test]
async fn cancellation_tears_down_a_subscribed_session() {
    let transport = MockTransport::new()
        .with_scan_round(ScanRound::Devices(vec![named("Tone Equalizer", "tone")]))
        .with_services(tone_topology())
        .with_notifications(vec![br#"{"value": 12}"#.to_vec()])
        .hold_open();
    let volume = RecordingVolume::new(50);
    let mut controller = build_controller(transport, &config(), volume.clone());
    let cancel = CancellationToken::new();

    let session = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            let result = controller.run(cancel).await;
            (controller, result)
        }
    });

    // Wait until the scripted frame has been handled, then shut down
    tokio::time::timeout(Duration::from_secs(5), async {
        while volume.sets().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    cancel.cancel();

    let (controller, result) = tokio::time::timeout(Duration::from_secs(5), session)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(controller.state(), SessionState::Closed);
    assert_eq!(volume.sets(), vec![12]);
    assert_eq!(controller.transport().events().last(), Some(&MockEvent::Disconnect));
}
