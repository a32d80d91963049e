pub mod device_config;
pub mod discovery_config;
pub mod volume_config;

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;
use uuid::Uuid;

use crate::config::device_config::DeviceConfig;
use crate::config::discovery_config::DiscoveryConfig;
use crate::config::volume_config::VolumeConfig;

const CONFIG_FILE_NAME: &str = "tone_config.json";

/// Environment variable holding an alternative config file path
pub const CONFIG_PATH_ENV: &str = "TONE_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub discovery: DiscoveryConfig,
    pub volume: VolumeConfig,
    /// One of error, warn, info, debug, trace
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            device: DeviceConfig::default(),
            discovery: DiscoveryConfig::default(),
            volume: VolumeConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Config file location: `$TONE_CONFIG`, or `tone_config.json` in the working directory.
    pub fn config_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }

    /// Loads the config from a configuration file.
    /// A missing file yields the defaults, which are written back as a template.
    pub async fn load_config(path: &Path) -> Result<Self> {
        let file_path_str = path.to_string_lossy().into_owned();

        if !path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path_str);
            let config = Self::default();
            if let Err(e) = config.save_config(path).await {
                warn!("Could not write default config: {}", e);
            }
            return Ok(config);
        }

        let config_json = fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("Config loaded from {:?}", file_path_str);
        Ok(config)
    }

    /// Saves the current config to a configuration file.
    pub async fn save_config(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_directory_exists(parent).await?;
        }
        let file_path_str = path.to_string_lossy().into_owned();

        let config_json = match serde_json::to_string_pretty(&self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(path, config_json).await?;

        info!("Config saved to {:?}.", file_path_str);
        Ok(())
    }

    /// Applies `DEVICE_NAME`, `SERVICE_UUID` and `CHARACTERISTIC_UUID` from `lookup`.
    /// UUIDs that do not parse are ignored with a warning.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("DEVICE_NAME").filter(|n| !n.trim().is_empty()) {
            self.device.device_name = name;
        }
        if let Some(uuid) = parse_uuid_override("SERVICE_UUID", lookup("SERVICE_UUID")) {
            self.device.service_uuid = Some(uuid);
        }
        if let Some(uuid) = parse_uuid_override("CHARACTERISTIC_UUID", lookup("CHARACTERISTIC_UUID")) {
            self.device.characteristic_uuid = Some(uuid);
        }
    }
}

/// Creates `dir` and its parents when missing.
async fn ensure_directory_exists(dir: &Path) -> Result<()> {
    if !fs::try_exists(dir).await? {
        fs::create_dir_all(dir).await?;
        debug!("Created config directory {:?}", dir);
    }
    Ok(())
}

fn parse_uuid_override(key: &str, value: Option<String>) -> Option<Uuid> {
    let value = value?;
    match Uuid::parse_str(value.trim()) {
        Ok(uuid) => Some(uuid),
        Err(e) => {
            warn!("Ignoring {}={:?}: {}", key, value, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::gatt::CharacteristicRoles;
    use std::collections::HashMap;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("tone-terminal-{}-{}", name, std::process::id()))
            .join(CONFIG_FILE_NAME)
    }

    #[test]
    fn defaults_match_the_device() {
        let config = AppConfig::default();
        assert_eq!(config.device.device_name, "Tone Equalizer");
        assert_eq!(config.discovery.scan_timeout_secs, 5);
        assert_eq!(config.volume.fallback_volume, 50);
        assert_eq!(config.device.characteristic_roles, CharacteristicRoles::Shared);
        assert!(config.device.characteristic_uuid.is_none());
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"device": {"device_name": "Tone Mini", "characteristic_roles": "split"},
                "discovery": {"retry": {"max_attempts": 4}}}"#,
        )
        .unwrap();
        assert_eq!(config.device.device_name, "Tone Mini");
        assert_eq!(config.device.characteristic_roles, CharacteristicRoles::Split);
        assert_eq!(config.discovery.retry.max_attempts, Some(4));
        assert_eq!(config.discovery.retry.initial_backoff_ms, 500);
        assert_eq!(config.discovery.scan_timeout_secs, 5);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn env_overrides_ignore_placeholder_uuids() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DEVICE_NAME", "Tone Equalizer Pro"),
            ("SERVICE_UUID", "your_service_uuid_here"),
            ("CHARACTERISTIC_UUID", "c8c51726-81bc-483b-a052-f7a14ea3d281"),
        ]);
        let mut config = AppConfig::default();

        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.device.device_name, "Tone Equalizer Pro");
        assert_eq!(config.device.service_uuid, None);
        assert_eq!(
            config.device.characteristic_uuid,
            Some(Uuid::from_u128(0xc8c51726_81bc_483b_a052_f7a14ea3d281))
        );
    }

    #[tokio::test]
    async fn missing_file_writes_defaults_that_load_back() {
        let path = temp_path("defaults");
        let _ = fs::remove_file(&path).await;

        let created = AppConfig::load_config(&path).await.unwrap();
        assert!(path.exists());
        let loaded = AppConfig::load_config(&path).await.unwrap();

        assert_eq!(created, AppConfig::default());
        assert_eq!(loaded, created);
        let _ = fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn save_creates_missing_directories() {
        let root = std::env::temp_dir().join(format!("tone-terminal-nested-{}", std::process::id()));
        let path = root.join("a").join("b").join(CONFIG_FILE_NAME);
        let _ = fs::remove_dir_all(&root).await;

        AppConfig::default().save_config(&path).await.unwrap();

        assert!(path.exists());
        let _ = fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn invalid_json_is_an_error() {
        let path = temp_path("invalid");
        ensure_directory_exists(path.parent().unwrap()).await.unwrap();
        fs::write(&path, "{ not json").await.unwrap();

        assert!(AppConfig::load_config(&path).await.is_err());
        let _ = fs::remove_file(&path).await;
    }
}
