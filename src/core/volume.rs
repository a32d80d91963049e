//! Host volume backends
//! A backend is chosen once at startup; notification handling only sees the trait.

use async_trait::async_trait;
use log::{debug, info};
use tokio::process::Command;

use crate::core::payload::clamp_volume;
use crate::error::VolumeError;

/// Reads and sets the host output volume, in percent.
#[async_trait]
pub trait VolumeProvider: Send + Sync {
    /// Short name for log lines
    fn name(&self) -> &'static str;

    /// Whether `set_volume` does anything on this host
    fn can_set(&self) -> bool;

    async fn current_volume(&self) -> Result<u8, VolumeError>;

    async fn set_volume(&self, volume: u8) -> Result<(), VolumeError>;
}

/// macOS backend driven through `osascript`.
#[derive(Debug, Default)]
pub struct AppleScriptVolume;

impl AppleScriptVolume {
    async fn run(script: &str) -> Result<String, VolumeError> {
        let output = Command::new("osascript")
            .arg("-e")
            .arg(script)
            .output()
            .await
            .map_err(|e| VolumeError::Command(e.to_string()))?;
        if !output.status.success() {
            return Err(VolumeError::Command(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl VolumeProvider for AppleScriptVolume {
    fn name(&self) -> &'static str {
        "osascript"
    }

    fn can_set(&self) -> bool {
        true
    }

    async fn current_volume(&self) -> Result<u8, VolumeError> {
        let text = Self::run("output volume of (get volume settings)").await?;
        parse_volume(&text)
    }

    async fn set_volume(&self, volume: u8) -> Result<(), VolumeError> {
        let volume = clamp_volume(volume.into());
        debug!("Setting output volume to {}", volume);
        Self::run(&format!("set volume output volume {}", volume)).await?;
        Ok(())
    }
}

/// Windows backend driving the default render endpoint through `IAudioEndpointVolume`.
#[cfg(windows)]
#[derive(Debug, Default)]
pub struct EndpointVolume;

#[cfg(windows)]
mod endpoint {
    use std::cell::Cell;

    use windows::Win32::Media::Audio::Endpoints::IAudioEndpointVolume;
    use windows::Win32::Media::Audio::{
        eConsole, eRender, IMMDeviceEnumerator, MMDeviceEnumerator,
    };
    use windows::Win32::System::Com::{
        CoCreateInstance, CoInitializeEx, CLSCTX_ALL, COINIT_MULTITHREADED,
    };

    use crate::error::VolumeError;

    thread_local! {
        static COM_READY: Cell<bool> = const { Cell::new(false) };
    }

    fn default_endpoint() -> windows::core::Result<IAudioEndpointVolume> {
        if !COM_READY.get() {
            unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) }.ok()?;
            COM_READY.set(true);
        }
        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)?;
            let device = enumerator.GetDefaultAudioEndpoint(eRender, eConsole)?;
            device.Activate(CLSCTX_ALL, None)
        }
    }

    /// Runs `op` against the default endpoint on the blocking pool, where COM may be initialized.
    pub(super) async fn with_endpoint<T, F>(op: F) -> Result<T, VolumeError>
    where
        T: Send + 'static,
        F: FnOnce(&IAudioEndpointVolume) -> windows::core::Result<T> + Send + 'static,
    {
        tokio::task::spawn_blocking(move || default_endpoint().and_then(|endpoint| op(&endpoint)))
            .await
            .map_err(|e| VolumeError::Command(e.to_string()))?
            .map_err(|e| VolumeError::Command(e.to_string()))
    }
}

#[cfg(windows)]
#[async_trait]
impl VolumeProvider for EndpointVolume {
    fn name(&self) -> &'static str {
        "endpoint"
    }

    fn can_set(&self) -> bool {
        true
    }

    async fn current_volume(&self) -> Result<u8, VolumeError> {
        let scalar =
            endpoint::with_endpoint(|control| unsafe { control.GetMasterVolumeLevelScalar() })
                .await?;
        Ok(scalar_to_percent(scalar))
    }

    async fn set_volume(&self, volume: u8) -> Result<(), VolumeError> {
        let scalar = percent_to_scalar(volume);
        debug!("Setting endpoint volume scalar to {}", scalar);
        endpoint::with_endpoint(move |control| unsafe {
            control.SetMasterVolumeLevelScalar(scalar, std::ptr::null())
        })
        .await
    }
}

/// Endpoint level scalar (0.0 to 1.0) as a percent.
pub fn scalar_to_percent(scalar: f32) -> u8 {
    clamp_volume((scalar * 100.0).round() as i64)
}

/// Percent as an endpoint level scalar.
pub fn percent_to_scalar(volume: u8) -> f32 {
    f32::from(clamp_volume(volume.into())) / 100.0
}

/// Backend for hosts without volume control: reports a fixed level, cannot set.
#[derive(Debug, Clone)]
pub struct FixedVolume {
    volume: u8,
}

impl FixedVolume {
    pub fn new(volume: u8) -> Self {
        Self {
            volume: clamp_volume(volume.into()),
        }
    }
}

#[async_trait]
impl VolumeProvider for FixedVolume {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn can_set(&self) -> bool {
        false
    }

    async fn current_volume(&self) -> Result<u8, VolumeError> {
        Ok(self.volume)
    }

    async fn set_volume(&self, _volume: u8) -> Result<(), VolumeError> {
        Err(VolumeError::Unsupported)
    }
}

/// Parses the integer percent printed by a volume command.
pub fn parse_volume(text: &str) -> Result<u8, VolumeError> {
    let text = text.trim();
    text.parse::<i64>()
        .map(clamp_volume)
        .map_err(|_| VolumeError::Parse(text.to_string()))
}

/// Picks the backend for the host operating system (`std::env::consts::OS`).
pub fn provider_for_os(os: &str, fallback_volume: u8) -> Box<dyn VolumeProvider> {
    let provider: Box<dyn VolumeProvider> = match os {
        "macos" => Box::new(AppleScriptVolume),
        #[cfg(windows)]
        "windows" => Box::new(EndpointVolume),
        _ => Box::new(FixedVolume::new(fallback_volume)),
    };
    info!("Using {} volume backend on {}", provider.name(), os);
    provider
}
