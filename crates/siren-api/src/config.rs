//! Runtime configuration from environment variables

use std::net::SocketAddr;
use std::path::PathBuf;

/// Default HTTP listen address
pub const DEFAULT_BIND: &str = "0.0.0.0:3000";

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen address (`SIREN_BIND`)
    pub bind: SocketAddr,
    /// Directory holding `settings.json` (`DATA_DIR`)
    pub data_dir: PathBuf,
    /// Siren instance ids (`SIREN_DEVICES`, comma separated)
    pub devices: Vec<String>,
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind = lookup("SIREN_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid SIREN_BIND {bind:?}: {e}"))?;

        let data_dir = PathBuf::from(lookup("DATA_DIR").unwrap_or_else(|| "./data".to_string()));

        let devices: Vec<String> = lookup("SIREN_DEVICES")
            .unwrap_or_else(|| "siren".to_string())
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ToString::to_string)
            .collect();
        if devices.is_empty() {
            anyhow::bail!("SIREN_DEVICES names no devices");
        }

        Ok(Self {
            bind,
            data_dir,
            devices,
        })
    }

    /// Path of the settings file
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }
}
