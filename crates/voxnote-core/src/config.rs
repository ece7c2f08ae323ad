use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, VoxnoteError};

/// Top-level configuration for the Voxnote application.
///
/// Loaded from `~/.voxnote/config.toml` by default. Each section corresponds
/// to one subsystem. Preference values the session core reads (trigger
/// phrase, keyword-spotting flag, active folder) live here and are passed
/// into the controller at startup; runtime edits go through the controller
/// handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoxnoteConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for VoxnoteConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            trigger: TriggerConfig::default(),
            session: SessionConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl VoxnoteConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: VoxnoteConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| VoxnoteError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for transcript folders.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.voxnote/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Trigger-phrase settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Spoken phrase that switches from keyword spotting to dictation.
    /// Matched case-insensitively. Edits take effect on the next listener
    /// (re)initialization.
    pub phrase: String,
    /// Whether the background keyword-spotting listener is enabled.
    pub keyword_spotting: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            phrase: "dakota".to_string(),
            keyword_spotting: true,
        }
    }
}

/// Session arbitration timing settings.
///
/// The microphone's capture release is asynchronous and not instantly
/// observable, so handoffs and cool-downs poll at a fixed interval up to a
/// fixed attempt cap. Exceeding the cap aborts to the best safe state; it is
/// never a crash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Interval between microphone-free polls during a handoff, in ms.
    pub handoff_poll_interval_ms: u64,
    /// Maximum number of microphone-free polls before aborting a handoff.
    pub handoff_max_attempts: u32,
    /// Fixed delay after dictation fully stops before keyword spotting may
    /// resume, in ms.
    pub cooldown_ms: u64,
    /// Settle delay after the keyword listener shuts down, before probing
    /// the microphone, in ms.
    pub keyword_settle_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handoff_poll_interval_ms: 100,
            handoff_max_attempts: 10,
            cooldown_ms: 1000,
            keyword_settle_ms: 200,
        }
    }
}

impl SessionConfig {
    pub fn handoff_poll_interval(&self) -> Duration {
        Duration::from_millis(self.handoff_poll_interval_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn keyword_settle(&self) -> Duration {
        Duration::from_millis(self.keyword_settle_ms)
    }
}

/// Transcript storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Folder new utterances are written to at startup.
    pub active_folder: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            active_folder: "General".to_string(),
        }
    }
}
