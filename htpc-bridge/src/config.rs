//! Device configuration.
//!
//! One controller instance manages exactly one host. The config is loaded
//! once at startup and treated as immutable while in use; reconfiguration
//! replaces the whole struct under the shared guard (see context.rs), never
//! individual fields.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Fixed command port of the host agent.
pub const AGENT_PORT: u16 = 8086;
/// Fixed web-server port of the hardware monitor.
pub const MONITOR_PORT: u16 = 8085;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn convert(&self, celsius: f64) -> f64 {
        match self {
            TemperatureUnit::Celsius => celsius,
            TemperatureUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Address of the monitored host. Empty means not configured yet.
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_agent_port")]
    pub agent_port: u16,
    #[serde(default = "default_monitor_port")]
    pub monitor_port: u16,
    /// MAC of the host adapter, hyphen or colon delimited. Enables
    /// Wake-on-LAN when present.
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default = "default_unit")]
    pub temperature_unit: TemperatureUnit,
    #[serde(default = "default_true")]
    pub monitoring_enabled: bool,
}

fn default_agent_port() -> u16 {
    AGENT_PORT
}

fn default_monitor_port() -> u16 {
    MONITOR_PORT
}

fn default_unit() -> TemperatureUnit {
    TemperatureUnit::Celsius
}

fn default_true() -> bool {
    true
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            host: String::new(),
            agent_port: AGENT_PORT,
            monitor_port: MONITOR_PORT,
            mac_address: None,
            temperature_unit: TemperatureUnit::Celsius,
            monitoring_enabled: true,
        }
    }
}

impl DeviceConfig {
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty()
    }

    pub fn wol_enabled(&self) -> bool {
        self.mac_address
            .as_deref()
            .map(|m| !m.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn monitor_base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.monitor_port)
    }

    pub fn agent_base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.agent_port)
    }

    /// Chemin du fichier de config (surchargeable via HTPC_BRIDGE_CONFIG).
    pub fn config_file_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("HTPC_BRIDGE_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let mut path = dirs::config_dir().context("Could not find config directory")?;
        path.push("htpc-bridge");
        path.push("config.toml");
        Ok(path)
    }

    /// Load from disk; missing or invalid files fall back to defaults so a
    /// fresh install starts in the unconfigured state instead of crashing.
    pub async fn load() -> DeviceConfig {
        let path = match Self::config_file_path() {
            Ok(p) => p,
            Err(e) => {
                warn!("No config location available: {e}");
                return DeviceConfig::default();
            }
        };
        if !path.exists() {
            warn!("No config file at {}, using defaults", path.display());
            return DeviceConfig::default();
        }
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => toml::from_str(&text).unwrap_or_else(|e| {
                warn!("Invalid config file: {e}");
                DeviceConfig::default()
            }),
            Err(e) => {
                warn!("Cannot read {}: {e}", path.display());
                DeviceConfig::default()
            }
        }
    }

    pub async fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let text = toml::to_string_pretty(self)?;
        tokio::fs::write(&path, text)
            .await
            .with_context(|| format!("Cannot write {}", path.display()))?;
        Ok(())
    }
}
