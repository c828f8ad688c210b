//! Configuration file management.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// WireGuard boundary settings.
    #[serde(default)]
    pub wireguard: WireguardConfig,
    /// Expiry sweep settings.
    #[serde(default)]
    pub expiry: ExpiryConfig,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
}

/// WireGuard boundary configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireguardConfig {
    /// Directory holding `<iface>.conf`.
    #[serde(default = "default_config_dir")]
    pub config_dir: String,
    /// Directory for backups and stripped temp files. Empty = system tmp.
    #[serde(default)]
    pub backup_dir: String,
    /// Timeout for each external `wg`/`wg-quick` invocation.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

/// Expiry sweep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiryConfig {
    /// Seconds between sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_config_dir() -> String {
    passage_wg::sync::DEFAULT_CONFIG_DIR.to_string()
}

fn default_command_timeout() -> u64 {
    passage_wg::runner::DEFAULT_TIMEOUT_SECS
}

fn default_sweep_interval() -> u64 {
    passage_engine::reaper::DEFAULT_SWEEP_INTERVAL_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
        }
    }
}

impl Default for WireguardConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            backup_dir: String::new(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if the file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: DaemonConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    /// Backup directory for the synchronizer.
    pub fn backup_dir(&self) -> PathBuf {
        if self.wireguard.backup_dir.is_empty() {
            std::env::temp_dir()
        } else {
            PathBuf::from(&self.wireguard.backup_dir)
        }
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("PASSAGE_DATA_DIR") {
            return PathBuf::from(dir).join("config.toml");
        }
        Self::default_data_dir().join("config.toml")
    }

    /// Platform-specific default data directory.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("PASSAGE_DATA_DIR") {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            dirs_fallback("Library/Application Support/Passage")
        }
        #[cfg(not(target_os = "macos"))]
        {
            dirs_fallback(".passage")
        }
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/passage"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.wireguard.config_dir, "/etc/wireguard");
        assert_eq!(config.wireguard.command_timeout_secs, 10);
        assert_eq!(config.expiry.sweep_interval_secs, 3600);
        assert_eq!(config.advanced.log_level, "info");
    }

    #[test]
    fn test_config_serialization() {
        let config = DaemonConfig::default();
        let toml_str = toml::to_string(&config).expect("serialize");
        let _parsed: DaemonConfig = toml::from_str(&toml_str).expect("parse");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: DaemonConfig =
            toml::from_str("[expiry]\nsweep_interval_secs = 60\n").expect("parse");
        assert_eq!(parsed.expiry.sweep_interval_secs, 60);
        assert_eq!(parsed.wireguard.config_dir, "/etc/wireguard");
    }
}
