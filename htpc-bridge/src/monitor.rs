//! Hardware monitor client and raw sensor-tree normalization.
//!
//! The monitored host runs a LibreHardwareMonitor-style web server whose
//! `/data.json` is a tree of hardware nodes, each holding sensor groups,
//! each holding sensors with display-formatted values ("45.0 °C",
//! "1.5 MB/s"). Nothing in that tree is stable across machines, so hardware
//! is detected by keyword matching and every value is parsed defensively.
//! Any schema deviation is a poll failure, never a crash.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::DeviceConfig;

/// Poll budget per request; a fetch slower than this is a failure.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Normalized snapshot of one successful poll. Temperatures are Celsius,
/// network speeds Mbps, memory GB, storage GB, fans RPM, power W.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTelemetry {
    pub cpu_temp: Option<f64>,
    pub cpu_load: Option<f64>,
    pub cpu_clock: Option<f64>,
    pub cpu_power: Option<f64>,
    pub gpu_temp: Option<f64>,
    pub gpu_load: Option<f64>,
    pub memory_used: Option<f64>,
    pub memory_total: Option<f64>,
    pub storage_used: Option<f64>,
    pub storage_total: Option<f64>,
    pub storage_used_percent: Option<f64>,
    pub storage_temp: Option<f64>,
    pub network_up: Option<f64>,
    pub network_down: Option<f64>,
    pub motherboard_temp_avg: Option<f64>,
    pub motherboard_temp_max: Option<f64>,
    pub fan_speeds: Vec<f64>,

    pub has_dedicated_gpu: bool,
    pub has_network_data: bool,
    pub has_storage_data: bool,
    pub detected_cpu_name: String,
    pub detected_gpu_name: String,
    pub detected_storage_name: String,
    pub detected_network_name: String,
}

#[derive(Clone)]
pub struct MonitorClient {
    http: reqwest::Client,
}

impl MonitorClient {
    pub fn new() -> Self {
        MonitorClient {
            http: reqwest::Client::new(),
        }
    }

    /// Fetch the raw sensor tree. Transport errors and non-JSON bodies both
    /// surface as errors; the poller turns them into connectivity failures.
    pub async fn fetch(&self, cfg: &DeviceConfig) -> Result<Value> {
        let url = format!("{}/data.json", cfg.monitor_base_url());
        let response = self
            .http
            .get(&url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("Monitor unreachable at {url}"))?;
        if !response.status().is_success() {
            bail!("Monitor returned HTTP {}", response.status());
        }
        response.json().await.context("Monitor payload is not JSON")
    }
}

impl Default for MonitorClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize a raw tree into telemetry. Hardware detection results from the
/// previous snapshot are carried forward so that a view does not flicker
/// when a sensor momentarily drops out of the tree.
pub fn normalize(root: &Value, prev: Option<&RawTelemetry>) -> Result<RawTelemetry> {
    if root.get("Children").and_then(Value::as_array).is_none() {
        bail!("Sensor tree has no Children node");
    }

    let mut out = RawTelemetry::default();
    if let Some(prev) = prev {
        out.has_dedicated_gpu = prev.has_dedicated_gpu;
        out.has_network_data = prev.has_network_data;
        out.has_storage_data = prev.has_storage_data;
        out.detected_cpu_name = prev.detected_cpu_name.clone();
        out.detected_gpu_name = prev.detected_gpu_name.clone();
        out.detected_storage_name = prev.detected_storage_name.clone();
        out.detected_network_name = prev.detected_network_name.clone();
    }

    if let Some(cpu) = detect_cpu(root) {
        out.detected_cpu_name = node_text(cpu).to_string();
        parse_cpu(cpu, &mut out);
    }
    if let Some(gpu) = detect_gpu(root) {
        out.detected_gpu_name = node_text(gpu).to_string();
        out.has_dedicated_gpu = true;
        parse_gpu(gpu, &mut out);
    }
    if let Some(memory) = detect_memory(root) {
        parse_memory(memory, &mut out);
    }
    if let Some(storage) = detect_storage(root) {
        out.detected_storage_name = node_text(storage).to_string();
        out.has_storage_data = true;
        parse_storage(storage, &mut out);
    }
    if let Some(network) = detect_network(root) {
        out.detected_network_name = node_text(network).to_string();
        out.has_network_data = true;
        parse_network(network, &mut out);
    }
    if let Some(board) = detect_motherboard(root) {
        parse_motherboard(board, &mut out);
    }

    debug!("Normalized sensor tree (cpu: {})", out.detected_cpu_name);
    Ok(out)
}

// ── tree helpers ──

fn children(node: &Value) -> impl Iterator<Item = &Value> {
    node.get("Children")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// Hardware components sit two levels down: root -> computer -> component.
fn components(root: &Value) -> impl Iterator<Item = &Value> {
    children(root).flat_map(|computer| children(computer))
}

fn node_text(node: &Value) -> &str {
    node.get("Text").and_then(Value::as_str).unwrap_or("")
}

fn node_value(node: &Value) -> &str {
    node.get("Value").and_then(Value::as_str).unwrap_or("")
}

/// First whitespace-separated token of a display value, as a number.
fn parse_sensor_value(value: &str) -> Option<f64> {
    let token = value.split_whitespace().next()?;
    token.replace(',', ".").parse().ok()
}

/// Search a component's sensor groups for the first sensor whose label
/// contains one of the targets (case-insensitive).
fn find_sensor(component: &Value, targets: &[&str]) -> Option<f64> {
    find_sensor_raw(component, targets).map(|(value, _)| value)
}

fn find_sensor_raw<'a>(component: &'a Value, targets: &[&str]) -> Option<(f64, &'a str)> {
    for group in children(component) {
        for sensor in children(group) {
            let label = node_text(sensor).to_lowercase();
            if targets.iter().any(|t| label.contains(t)) {
                let raw = node_value(sensor);
                if let Some(value) = parse_sensor_value(raw) {
                    return Some((value, raw));
                }
            }
        }
    }
    None
}

/// Like `find_sensor`, but only inside sensor groups whose own label
/// matches. Needed where the same sensor name appears under several groups
/// ("CPU Package" is both a temperature and a power reading).
fn find_sensor_in_groups(component: &Value, group_keywords: &[&str], targets: &[&str]) -> Option<f64> {
    for group in children(component) {
        let group_text = node_text(group).to_lowercase();
        if !group_keywords.iter().any(|kw| group_text.contains(kw)) {
            continue;
        }
        for sensor in children(group) {
            let label = node_text(sensor).to_lowercase();
            if targets.iter().any(|t| label.contains(t)) {
                if let Some(value) = parse_sensor_value(node_value(sensor)) {
                    return Some(value);
                }
            }
        }
    }
    None
}

fn text_matches(text: &str, any_of: &[&str]) -> bool {
    any_of.iter().any(|kw| text.contains(kw))
}

// ── hardware detection ──

fn detect_cpu(root: &Value) -> Option<&Value> {
    components(root).find(|c| {
        let text = node_text(c).to_lowercase();
        text_matches(&text, &["intel", "amd", "processor", "core", "ryzen", "cpu"])
            && !text_matches(&text, &["graphics", "radeon", "geforce", "gpu"])
    })
}

fn detect_gpu(root: &Value) -> Option<&Value> {
    components(root).find(|c| {
        let text = node_text(c).to_lowercase();
        text_matches(&text, &["nvidia", "amd", "radeon", "geforce", "rtx", "gtx", "rx"])
            && !text_matches(&text, &["uhd", "integrated", "igpu"])
    })
}

fn detect_memory(root: &Value) -> Option<&Value> {
    components(root).find(|c| {
        let text = node_text(c).to_lowercase();
        text.contains("memory") && !text.contains("cpu")
    })
}

/// Several drives may be present; the fullest one is the interesting one.
fn detect_storage(root: &Value) -> Option<&Value> {
    components(root)
        .filter(|c| {
            let text = node_text(c).to_lowercase();
            text_matches(
                &text,
                &["ssd", "hdd", "nvme", "samsung", "wd", "crucial", "seagate", "toshiba", "kingston"],
            )
        })
        .filter_map(|c| find_sensor(c, &["used space"]).map(|pct| (c, pct)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c)
}

/// Pick the interface with the most traffic; fall back to wired, then any.
fn detect_network(root: &Value) -> Option<&Value> {
    let interfaces: Vec<(&Value, f64)> = components(root)
        .filter(|c| {
            let text = node_text(c).to_lowercase();
            text_matches(&text, &["ethernet", "wifi", "wireless", "network"])
                && !text_matches(&text, &["vethernet", "virtual", "loopback"])
        })
        .map(|c| {
            let up = find_sensor(c, &["upload speed"]).unwrap_or(0.0);
            let down = find_sensor(c, &["download speed"]).unwrap_or(0.0);
            let util = find_sensor(c, &["network utilization"]).unwrap_or(0.0);
            (c, up + down * 10.0 + util)
        })
        .collect();

    if let Some(active) = interfaces
        .iter()
        .filter(|(_, activity)| *activity > 0.0)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| *c)
    {
        return Some(active);
    }
    interfaces
        .iter()
        .find(|(c, _)| node_text(c).to_lowercase().contains("ethernet"))
        .or_else(|| interfaces.first())
        .map(|(c, _)| *c)
}

fn detect_motherboard(root: &Value) -> Option<&Value> {
    components(root).find(|c| {
        let text = node_text(c).to_lowercase();
        text_matches(
            &text,
            &["z590", "b550", "x570", "asus", "gigabyte", "msi", "asrock", "it8689", "nct"],
        )
    })
}

// ── per-hardware parsing ──

fn parse_cpu(cpu: &Value, out: &mut RawTelemetry) {
    out.cpu_temp = find_sensor(cpu, &["core average", "cpu package", "package", "tctl", "tdie"]);
    out.cpu_load = find_sensor(cpu, &["cpu total", "total", "cpu usage", "processor usage"]);
    out.cpu_power =
        find_sensor_in_groups(cpu, &["power"], &["cpu package", "package power", "cpu power"]);

    // per-core clocks averaged; bus clocks and idle readings excluded
    let mut clocks = Vec::new();
    for group in children(cpu) {
        let group_text = node_text(group).to_lowercase();
        if !group_text.contains("clocks") && !group_text.contains("frequencies") {
            continue;
        }
        for sensor in children(group) {
            let label = node_text(sensor).to_lowercase();
            if (label.contains("core") || label.contains("cpu")) && !label.contains("bus") {
                if let Some(clock) = parse_sensor_value(node_value(sensor)) {
                    if clock > 100.0 {
                        clocks.push(clock);
                    }
                }
            }
        }
    }
    if !clocks.is_empty() {
        out.cpu_clock = Some(clocks.iter().sum::<f64>() / clocks.len() as f64);
    }
}

fn parse_gpu(gpu: &Value, out: &mut RawTelemetry) {
    out.gpu_temp = find_sensor(gpu, &["gpu core", "gpu", "core", "temperature"]);
    out.gpu_load = find_sensor(gpu, &["gpu core", "gpu", "core load", "3d load", "cuda load"]);
}

fn parse_memory(memory: &Value, out: &mut RawTelemetry) {
    let used = find_sensor(memory, &["memory used", "used"]);
    let available = find_sensor(memory, &["memory available", "available"]);
    out.memory_used = used;
    if let (Some(used), Some(available)) = (used, available) {
        out.memory_total = Some(used + available);
    }
}

fn parse_storage(storage: &Value, out: &mut RawTelemetry) {
    out.storage_temp = find_sensor(storage, &["temperature"]);
    let Some(used_percent) = find_sensor(storage, &["used space", "usage"]) else {
        return;
    };
    out.storage_used_percent = Some(used_percent);
    // the sensor tree has no capacity sensor; the marketing size in the
    // hardware name is the best available total
    if let Some(total) = extract_storage_size(node_text(storage)) {
        out.storage_total = Some(total);
        out.storage_used = Some(used_percent / 100.0 * total);
    }
}

fn parse_network(network: &Value, out: &mut RawTelemetry) {
    out.network_up =
        find_sensor_raw(network, &["upload speed", "tx", "sent"]).map(to_mbps);
    out.network_down =
        find_sensor_raw(network, &["download speed", "rx", "received"]).map(to_mbps);
}

/// Display values come in MB/s or KB/s depending on the monitor build.
fn to_mbps((value, raw): (f64, &str)) -> f64 {
    if raw.contains("MB/s") || raw.contains("Mbps") {
        value * 8.0
    } else {
        value / 125.0
    }
}

fn parse_motherboard(board: &Value, out: &mut RawTelemetry) {
    let mut temperatures = Vec::new();
    let mut fans = Vec::new();

    for chip in children(board) {
        let chip_text = node_text(chip).to_lowercase();
        if !text_matches(&chip_text, &["ite", "nct", "super i/o"]) {
            continue;
        }
        for group in children(chip) {
            let group_text = node_text(group).to_lowercase();
            if group_text.contains("temperatures") {
                for sensor in children(group) {
                    if let Some(temp) = parse_sensor_value(node_value(sensor)) {
                        // disconnected headers report 0 or wild values
                        if temp > 20.0 && temp < 100.0 {
                            temperatures.push(temp);
                        }
                    }
                }
            } else if group_text.contains("fans") {
                for sensor in children(group) {
                    if let Some(rpm) = parse_sensor_value(node_value(sensor)) {
                        if rpm > 0.0 {
                            fans.push(rpm);
                        }
                    }
                }
            }
        }
    }

    if !temperatures.is_empty() {
        out.motherboard_temp_avg =
            Some(temperatures.iter().sum::<f64>() / temperatures.len() as f64);
        out.motherboard_temp_max = Some(temperatures.iter().cloned().fold(f64::MIN, f64::max));
    }
    out.fan_speeds = fans;
}

/// "Samsung SSD 970 EVO 2TB" -> 2000 GB. TB counts decimal, as the label
/// does.
fn extract_storage_size(name: &str) -> Option<f64> {
    let lower = name.to_lowercase();
    let bytes = lower.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            let number: f64 = match lower[start..i].parse() {
                Ok(n) => n,
                Err(_) => continue,
            };
            let rest = lower[i..].trim_start();
            if rest.starts_with("tb") {
                return Some(number * 1000.0);
            }
            if rest.starts_with("gb") {
                return Some(number);
            }
        } else {
            i += 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sensor(text: &str, value: &str) -> Value {
        json!({ "Text": text, "Value": value })
    }

    fn tree() -> Value {
        json!({
            "Text": "Sensor",
            "Children": [{
                "Text": "HTPC-LIVINGROOM",
                "Children": [
                    {
                        "Text": "Intel Core i5-11600K",
                        "Children": [
                            { "Text": "Temperatures", "Children": [
                                sensor("Core Average", "45.0 °C"),
                                sensor("CPU Package", "47.0 °C"),
                            ]},
                            { "Text": "Load", "Children": [
                                sensor("CPU Total", "12.5 %"),
                            ]},
                            { "Text": "Clocks", "Children": [
                                sensor("CPU Core #1", "4200.0 MHz"),
                                sensor("CPU Core #2", "3800.0 MHz"),
                                sensor("Bus Speed", "100.0 MHz"),
                            ]},
                            { "Text": "Powers", "Children": [
                                sensor("CPU Package", "35.2 W"),
                            ]},
                        ]
                    },
                    {
                        "Text": "Generic Memory",
                        "Children": [
                            { "Text": "Data", "Children": [
                                sensor("Memory Used", "6.2 GB"),
                                sensor("Memory Available", "9.8 GB"),
                            ]},
                        ]
                    },
                    {
                        "Text": "Samsung SSD 970 EVO 2TB",
                        "Children": [
                            { "Text": "Levels", "Children": [
                                sensor("Used Space", "40.0 %"),
                            ]},
                            { "Text": "Temperatures", "Children": [
                                sensor("Temperature", "38.0 °C"),
                            ]},
                        ]
                    },
                    {
                        "Text": "Ethernet",
                        "Children": [
                            { "Text": "Throughput", "Children": [
                                sensor("Upload Speed", "1.5 MB/s"),
                                sensor("Download Speed", "250 KB/s"),
                            ]},
                        ]
                    },
                    {
                        "Text": "Gigabyte Z590 AORUS ELITE",
                        "Children": [
                            {
                                "Text": "ITE IT8689E",
                                "Children": [
                                    { "Text": "Temperatures", "Children": [
                                        sensor("System", "36.0 °C"),
                                        sensor("Chipset", "44.0 °C"),
                                        sensor("Unplugged", "0.0 °C"),
                                    ]},
                                    { "Text": "Fans", "Children": [
                                        sensor("Fan #1", "820 RPM"),
                                        sensor("Fan #2", "1100 RPM"),
                                        sensor("Fan #3", "0 RPM"),
                                    ]},
                                ]
                            }
                        ]
                    }
                ]
            }]
        })
    }

    #[test]
    fn test_normalize_full_tree() {
        let data = normalize(&tree(), None).unwrap();

        assert_eq!(data.cpu_temp, Some(45.0));
        assert_eq!(data.cpu_load, Some(12.5));
        assert_eq!(data.cpu_clock, Some(4000.0));
        assert_eq!(data.cpu_power, Some(35.2));
        assert_eq!(data.detected_cpu_name, "Intel Core i5-11600K");

        assert_eq!(data.memory_used, Some(6.2));
        assert_eq!(data.memory_total, Some(16.0));

        assert!(data.has_storage_data);
        assert_eq!(data.storage_used_percent, Some(40.0));
        assert_eq!(data.storage_total, Some(2000.0));
        assert_eq!(data.storage_used, Some(800.0));
        assert_eq!(data.storage_temp, Some(38.0));

        // MB/s -> Mbps times 8, KB/s -> Mbps divided by 125
        assert!(data.has_network_data);
        assert_eq!(data.network_up, Some(12.0));
        assert_eq!(data.network_down, Some(2.0));

        assert_eq!(data.motherboard_temp_avg, Some(40.0));
        assert_eq!(data.motherboard_temp_max, Some(44.0));
        assert_eq!(data.fan_speeds, vec![820.0, 1100.0]);

        // no dedicated GPU in this tree
        assert!(!data.has_dedicated_gpu);
        assert_eq!(data.gpu_temp, None);
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        assert!(normalize(&json!({ "unexpected": true }), None).is_err());
        assert!(normalize(&json!("just a string"), None).is_err());
    }

    #[test]
    fn test_detection_carries_forward() {
        let mut prev = RawTelemetry::default();
        prev.has_dedicated_gpu = true;
        prev.detected_gpu_name = "NVIDIA GeForce RTX 3060".to_string();

        let data = normalize(&tree(), Some(&prev)).unwrap();
        assert!(data.has_dedicated_gpu);
        assert_eq!(data.detected_gpu_name, "NVIDIA GeForce RTX 3060");
    }

    #[test]
    fn test_parse_sensor_value_formats() {
        assert_eq!(parse_sensor_value("45.0 °C"), Some(45.0));
        assert_eq!(parse_sensor_value("1,5 MB/s"), Some(1.5));
        assert_eq!(parse_sensor_value(""), None);
        assert_eq!(parse_sensor_value("n/a"), None);
    }

    #[test]
    fn test_extract_storage_size() {
        assert_eq!(extract_storage_size("Samsung SSD 970 EVO 2TB"), Some(2000.0));
        assert_eq!(extract_storage_size("Crucial MX500 500GB"), Some(500.0));
        assert_eq!(extract_storage_size("WDC WD40EFRX 4 TB"), Some(4000.0));
        assert_eq!(extract_storage_size("Mystery Drive"), None);
    }
}
