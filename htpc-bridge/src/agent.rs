//! HTTP client for the host agent, plus setup-time probes.
//!
//! All requests carry bounded timeouts; a slow host is a failed request,
//! never a hang.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::DeviceConfig;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct AgentClient {
    http: reqwest::Client,
}

impl AgentClient {
    pub fn new() -> Self {
        AgentClient {
            http: reqwest::Client::new(),
        }
    }

    /// POST one catalogue token to the agent. Ok only on HTTP 200; the
    /// agent's error message is surfaced when it provides one.
    pub async fn send_command(&self, cfg: &DeviceConfig, token: &str) -> Result<()> {
        let url = format!("{}/command", cfg.agent_base_url());
        debug!("Sending command '{token}' to {url}");

        let response = self
            .http
            .post(&url)
            .timeout(COMMAND_TIMEOUT)
            .json(&serde_json::json!({ "command": token }))
            .send()
            .await
            .with_context(|| format!("Agent unreachable at {url}"))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let detail = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| body["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| format!("HTTP {status}"));
        bail!("Command '{token}' failed: {detail}")
    }

    /// Liveness probe against the agent. Used for connectivity when
    /// monitoring is disabled and for the setup summary.
    pub async fn probe_health(&self, cfg: &DeviceConfig) -> bool {
        let url = format!("{}/health", cfg.agent_base_url());
        match self
            .http
            .get(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Setup-time check of the hardware monitor: fetches the sensor tree
    /// and counts sensors carrying a value, so the setup collaborator can
    /// show something more convincing than "connected".
    pub async fn probe_monitor(&self, cfg: &DeviceConfig) -> Result<usize> {
        let url = format!("{}/data.json", cfg.monitor_base_url());
        let response = self
            .http
            .get(&url)
            .timeout(COMMAND_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("Monitor unreachable at {url}"))?;
        if !response.status().is_success() {
            bail!("Monitor returned HTTP {}", response.status());
        }
        let tree: Value = response.json().await.context("Monitor payload is not JSON")?;
        Ok(count_sensors(&tree))
    }
}

impl Default for AgentClient {
    fn default() -> Self {
        Self::new()
    }
}

fn count_sensors(node: &Value) -> usize {
    let mut count = 0;
    if let Some(value) = node.get("Value").and_then(Value::as_str) {
        if !value.trim().is_empty() {
            count += 1;
        }
    }
    if let Some(children) = node.get("Children").and_then(Value::as_array) {
        for child in children {
            count += count_sensors(child);
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_count_sensors_recurses() {
        let tree = json!({
            "Children": [{
                "Children": [
                    { "Text": "CPU", "Children": [
                        { "Text": "Temps", "Children": [
                            { "Text": "Core", "Value": "45.0 °C" },
                            { "Text": "Empty", "Value": "" },
                        ]}
                    ]}
                ]
            }]
        });
        assert_eq!(count_sensors(&tree), 1);
    }

    #[tokio::test]
    async fn test_unreachable_agent_probe_is_false() {
        let mut cfg = DeviceConfig::default();
        cfg.host = "127.0.0.1".into();
        cfg.agent_port = 1; // nothing listens there

        let client = AgentClient::new();
        assert!(!client.probe_health(&cfg).await);
    }
}
