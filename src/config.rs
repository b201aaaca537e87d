use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::TrackingOrigin;
use crate::error::VrError;
use crate::input::manifest::ActionManifest;

const CONFIG_DIR: &str = "vrlink";
const SETTINGS_FILE: &str = "settings.toml";

/// Session settings, read from `<config dir>/vrlink/settings.toml`.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct VrSettings {
    pub tracking_origin: TrackingOrigin,
    /// Continuous focus loss after which devices are reported stale.
    /// Unset means poses are kept indefinitely.
    pub stale_pose_timeout_ms: Option<u64>,
    pub poll_backend_events: bool,
    pub update_interval_ms: u64,
    pub input_interval_ms: u64,
    /// Installed at startup when present.
    pub manifest: Option<ActionManifest>,
}

impl Default for VrSettings {
    fn default() -> Self {
        Self {
            tracking_origin: TrackingOrigin::Standing,
            stale_pose_timeout_ms: Some(2_000),
            poll_backend_events: true,
            update_interval_ms: 16,
            input_interval_ms: 4,
            manifest: None,
        }
    }
}

impl VrSettings {
    pub fn stale_pose_timeout(&self) -> Option<Duration> {
        self.stale_pose_timeout_ms.map(Duration::from_millis)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms.max(1))
    }

    pub fn input_interval(&self) -> Duration {
        Duration::from_millis(self.input_interval_ms.max(1))
    }

    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| {
                warn!("Could not determine config directory, using current directory");
                PathBuf::from(".")
            });
        path.push(CONFIG_DIR);
        path.push(SETTINGS_FILE);
        path
    }

    /// Loads from the default location.
    pub async fn load() -> Result<Self, VrError> {
        Self::load_from(&Self::default_path()).await
    }

    /// A missing file yields defaults; a malformed one is an error.
    pub async fn load_from(path: &Path) -> Result<Self, VrError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|e| VrError::Config(format!("Failed to check settings file: {}", e)))?;
        if !exists {
            info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| VrError::Config(format!("Failed to read settings file: {}", e)))?;
        let settings = toml::from_str(&content)
            .map_err(|e| VrError::Config(format!("Failed to parse settings file: {}", e)))?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub async fn save_to(&self, path: &Path) -> Result<(), VrError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| VrError::Config(format!("Failed to create config directory: {}", e)))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| VrError::Config(format!("Failed to serialize settings: {}", e)))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| VrError::Config(format!("Failed to write settings file: {}", e)))?;
        info!("Settings saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::manifest::{ActionKind, ActionSetUsage};

    #[tokio::test]
    async fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = VrSettings::load_from(&dir.path().join("nope.toml")).await.unwrap();
        assert_eq!(settings, VrSettings::default());
    }

    #[tokio::test]
    async fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        tokio::fs::write(
            &path,
            "tracking_origin = \"Seated\"\nstale_pose_timeout_ms = 500\n",
        )
        .await
        .unwrap();

        let settings = VrSettings::load_from(&path).await.unwrap();
        assert_eq!(settings.tracking_origin, TrackingOrigin::Seated);
        assert_eq!(settings.stale_pose_timeout(), Some(Duration::from_millis(500)));
        assert_eq!(settings.input_interval_ms, VrSettings::default().input_interval_ms);
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        tokio::fs::write(&path, "update_interval_ms = \"soon\"").await.unwrap();
        assert!(matches!(
            VrSettings::load_from(&path).await,
            Err(VrError::Config(_))
        ));
    }

    #[tokio::test]
    async fn saved_settings_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let settings = VrSettings {
            stale_pose_timeout_ms: Some(750),
            tracking_origin: TrackingOrigin::RawUncalibrated,
            manifest: Some(
                ActionManifest::new()
                    .with_set("main", ActionSetUsage::Single)
                    .with_action("main", "grip", ActionKind::Boolean),
            ),
            ..Default::default()
        };
        settings.save_to(&path).await.unwrap();
        assert_eq!(VrSettings::load_from(&path).await.unwrap(), settings);
    }
}
