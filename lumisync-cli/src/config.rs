//! CLI configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use lumisync_core::{DEFAULT_SCAN_WINDOW, SyncConfig, SyncMode};

/// Top-level configuration for the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Device settings.
    pub device: DeviceConfig,
    /// Sync loop tuning.
    pub sync: SyncSection,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Device settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Controller address (IP:port for color frames).
    pub address: String,
    /// Discovery window in seconds.
    pub scan_window_secs: u64,
}

/// Sync loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// Change sensitivity, 1 (least) to 10 (most).
    pub sensitivity: u8,
    /// Extraction rate in frames per second, 10 to 60.
    pub update_rate: u8,
    /// What to send each tick: "regions" or "dominant".
    pub mode: String,
    /// Resend interval when colors hold steady, in milliseconds.
    pub keepalive_ms: u64,
    /// Consecutive send failures before the link counts as lost.
    pub link_loss_after: u32,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            sync: SyncSection::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: "192.168.1.50:7777".into(),
            scan_window_secs: DEFAULT_SCAN_WINDOW.as_secs(),
        }
    }
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            sensitivity: 5,
            update_rate: 30,
            mode: "regions".into(),
            keepalive_ms: 1000,
            link_loss_after: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl CliConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Translate the `[sync]` section into loop tuning.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            update_rate: self.sync.update_rate,
            sensitivity: self.sync.sensitivity,
            mode: if self.sync.mode.eq_ignore_ascii_case("dominant") {
                SyncMode::Dominant
            } else {
                SyncMode::Regions
            },
            crop: None,
            keepalive: std::time::Duration::from_millis(self.sync.keepalive_ms),
            link_loss_after: self.sync.link_loss_after,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
