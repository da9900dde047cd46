//! Last-known-good telemetry cache and the fixed monitoring views.
//!
//! The cache is a single slot written only by the poller and read by
//! everyone else through snapshot copies. A failed poll never touches the
//! slot: the presentation keeps showing the previous values together with
//! their age instead of blanking out.

use chrono::{DateTime, Utc};

use crate::config::TemperatureUnit;
use crate::monitor::RawTelemetry;
use crate::state::{new_state, Shared};

/// One successful poll, stamped at replacement time.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    pub taken_at: DateTime<Utc>,
    pub data: RawTelemetry,
}

#[derive(Clone)]
pub struct TelemetryCache {
    slot: Shared<Option<TelemetrySnapshot>>,
}

impl TelemetryCache {
    pub fn new() -> Self {
        TelemetryCache {
            slot: new_state(None),
        }
    }

    /// Replace the snapshot wholesale. Partial updates do not exist.
    pub fn update(&self, data: RawTelemetry) {
        *self.slot.lock() = Some(TelemetrySnapshot {
            taken_at: Utc::now(),
            data,
        });
    }

    pub fn snapshot(&self) -> Option<TelemetrySnapshot> {
        self.slot.lock().clone()
    }

    pub fn has_dedicated_gpu(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .map(|s| s.data.has_dedicated_gpu)
            .unwrap_or(false)
    }

    /// Seconds since the cached snapshot was taken, if any.
    pub fn age_seconds(&self) -> Option<i64> {
        self.slot
            .lock()
            .as_ref()
            .map(|s| (Utc::now() - s.taken_at).num_seconds().max(0))
    }
}

impl Default for TelemetryCache {
    fn default() -> Self {
        Self::new()
    }
}

/// The fixed monitoring views. `GpuPerformance` only appears in the source
/// list when a dedicated GPU was detected; the other eight always exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewId {
    SystemOverview,
    CpuPerformance,
    GpuPerformance,
    MemoryUsage,
    StorageActivity,
    NetworkActivity,
    TemperatureOverview,
    FanMonitoring,
    PowerConsumption,
}

impl ViewId {
    pub const ALL: [ViewId; 9] = [
        ViewId::SystemOverview,
        ViewId::CpuPerformance,
        ViewId::GpuPerformance,
        ViewId::MemoryUsage,
        ViewId::StorageActivity,
        ViewId::NetworkActivity,
        ViewId::TemperatureOverview,
        ViewId::FanMonitoring,
        ViewId::PowerConsumption,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ViewId::SystemOverview => "System Overview",
            ViewId::CpuPerformance => "CPU Performance",
            ViewId::GpuPerformance => "GPU Performance",
            ViewId::MemoryUsage => "Memory Usage",
            ViewId::StorageActivity => "Storage Activity",
            ViewId::NetworkActivity => "Network Activity",
            ViewId::TemperatureOverview => "Temperature Overview",
            ViewId::FanMonitoring => "Fan Monitoring",
            ViewId::PowerConsumption => "Power Consumption",
        }
    }

    pub fn from_label(label: &str) -> Option<ViewId> {
        ViewId::ALL.into_iter().find(|v| v.label() == label)
    }
}

/// Three display lines per view, the remote's title/artist/album slots.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel {
    pub view: ViewId,
    pub title: String,
    pub subtitle: String,
    pub detail: String,
    /// Set when the values shown are cached rather than live.
    pub stale: bool,
    pub stale_for_seconds: i64,
}

/// Derive one view from a snapshot. A missing snapshot renders the
/// connection-error placeholder; a stale snapshot renders its last values
/// with the staleness flag set.
pub fn render_view(
    view: ViewId,
    snapshot: Option<&TelemetrySnapshot>,
    unit: TemperatureUnit,
    stale: bool,
) -> ViewModel {
    let Some(snapshot) = snapshot else {
        return ViewModel {
            view,
            title: "Connection Error".to_string(),
            subtitle: "Unable to reach HTPC".to_string(),
            detail: "Check the hardware monitor".to_string(),
            stale: true,
            stale_for_seconds: 0,
        };
    };

    let d = &snapshot.data;
    let age = (Utc::now() - snapshot.taken_at).num_seconds().max(0);
    let (title, subtitle, detail) = match view {
        ViewId::SystemOverview => (
            format!(
                "CPU: {} ({})",
                format_temp(d.cpu_temp, unit),
                format_percent(d.cpu_load)
            ),
            match d.cpu_power {
                Some(w) => format!("Power: {w:.1}W"),
                None => "Power: N/A".to_string(),
            },
            format_memory(d.memory_used, d.memory_total),
        ),
        ViewId::CpuPerformance => (
            format!("Temperature: {}", format_temp(d.cpu_temp, unit)),
            format!("Load: {}", format_percent(d.cpu_load)),
            format!("Clock: {:.0} MHz", d.cpu_clock.unwrap_or(0.0)),
        ),
        ViewId::GpuPerformance => {
            if d.gpu_temp.is_some() || d.gpu_load.is_some() {
                (
                    format!("Temperature: {}", format_temp(d.gpu_temp, unit)),
                    format!("Load: {}", format_percent(d.gpu_load)),
                    "Dedicated Graphics".to_string(),
                )
            } else {
                (
                    "No Dedicated GPU".to_string(),
                    "Using Integrated Graphics".to_string(),
                    "Intel/AMD Integrated".to_string(),
                )
            }
        }
        ViewId::MemoryUsage => {
            let percent = match (d.memory_used, d.memory_total) {
                (Some(used), Some(total)) if total > 0.0 => used / total * 100.0,
                _ => 0.0,
            };
            (
                format!("Used: {:.1} GB", d.memory_used.unwrap_or(0.0)),
                format!("Total: {:.1} GB", d.memory_total.unwrap_or(0.0)),
                format!("Usage: {percent:.1}%"),
            )
        }
        ViewId::StorageActivity => match (d.storage_used, d.storage_total) {
            (Some(used), Some(total)) => (
                format!("Used: {used:.1} GB"),
                format!("Total: {total:.1} GB"),
                format!("Usage: {:.1}%", d.storage_used_percent.unwrap_or(0.0)),
            ),
            _ => (
                format!("Usage: {:.1}%", d.storage_used_percent.unwrap_or(0.0)),
                "Primary Drive".to_string(),
                "Size calculation unavailable".to_string(),
            ),
        },
        ViewId::NetworkActivity => (
            format!("Download: {}", format_speed(d.network_down)),
            format!("Upload: {}", format_speed(d.network_up)),
            "Active Interface".to_string(),
        ),
        ViewId::TemperatureOverview => (
            format!("CPU: {}", format_temp(d.cpu_temp, unit)),
            format!("Storage: {}", format_temp(d.storage_temp, unit)),
            format!("Motherboard: {}", format_temp(d.motherboard_temp_avg, unit)),
        ),
        ViewId::FanMonitoring => {
            if d.fan_speeds.is_empty() {
                (
                    "No Fan Data".to_string(),
                    "Fans not detected".to_string(),
                    "Check the hardware monitor".to_string(),
                )
            } else {
                let avg = d.fan_speeds.iter().sum::<f64>() / d.fan_speeds.len() as f64;
                let max = d.fan_speeds.iter().cloned().fold(f64::MIN, f64::max);
                (
                    format!("Active Fans: {}", d.fan_speeds.len()),
                    format!("Average: {avg:.0} RPM"),
                    format!("Maximum: {max:.0} RPM"),
                )
            }
        }
        ViewId::PowerConsumption => match d.cpu_power {
            Some(w) => (
                format!("CPU Package: {w:.1}W"),
                "Real-time Power Draw".to_string(),
                "Hardware Monitor".to_string(),
            ),
            None => (
                "Power Monitoring".to_string(),
                "No power sensors detected".to_string(),
                "Requires compatible hardware".to_string(),
            ),
        },
    };

    ViewModel {
        view,
        title,
        subtitle,
        detail,
        stale,
        stale_for_seconds: if stale { age } else { 0 },
    }
}

// ── display formatting ──

pub fn format_temp(celsius: Option<f64>, unit: TemperatureUnit) -> String {
    match celsius {
        Some(c) => format!("{:.1}{}", unit.convert(c), unit.symbol()),
        None => "N/A".to_string(),
    }
}

pub fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.1}%"),
        None => "N/A".to_string(),
    }
}

pub fn format_memory(used: Option<f64>, total: Option<f64>) -> String {
    match (used, total) {
        (Some(used), Some(total)) if total > 0.0 => {
            format!("{used:.1}/{total:.1} GB ({:.1}%)", used / total * 100.0)
        }
        _ => "N/A".to_string(),
    }
}

pub fn format_speed(mbps: Option<f64>) -> String {
    match mbps {
        Some(speed) if speed > 1000.0 => format!("{:.2} Gbps", speed / 1000.0),
        Some(speed) => format!("{speed:.1} Mbps"),
        None => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawTelemetry {
        RawTelemetry {
            cpu_temp: Some(45.0),
            cpu_load: Some(12.5),
            cpu_clock: Some(4000.0),
            cpu_power: Some(35.2),
            memory_used: Some(6.2),
            memory_total: Some(16.0),
            fan_speeds: vec![820.0, 1100.0],
            ..RawTelemetry::default()
        }
    }

    #[test]
    fn test_update_replaces_snapshot_wholesale() {
        let cache = TelemetryCache::new();
        assert!(cache.snapshot().is_none());

        cache.update(sample());
        let first = cache.snapshot().unwrap();
        assert_eq!(first.data.cpu_temp, Some(45.0));

        let mut second = RawTelemetry::default();
        second.cpu_temp = Some(51.0);
        cache.update(second);

        let replaced = cache.snapshot().unwrap();
        assert_eq!(replaced.data.cpu_temp, Some(51.0));
        // the old memory reading is gone, not merged
        assert_eq!(replaced.data.memory_used, None);
    }

    #[test]
    fn test_fahrenheit_round_trip() {
        let cache = TelemetryCache::new();
        cache.update(sample());
        let snap = cache.snapshot().unwrap();

        let view = render_view(
            ViewId::CpuPerformance,
            Some(&snap),
            TemperatureUnit::Fahrenheit,
            false,
        );
        assert_eq!(view.title, "Temperature: 113.0°F");
        assert_eq!(view.subtitle, "Load: 12.5%");
        assert_eq!(view.detail, "Clock: 4000 MHz");
        assert!(!view.stale);
    }

    #[test]
    fn test_system_overview_lines() {
        let cache = TelemetryCache::new();
        cache.update(sample());
        let snap = cache.snapshot().unwrap();

        let view = render_view(
            ViewId::SystemOverview,
            Some(&snap),
            TemperatureUnit::Celsius,
            false,
        );
        assert_eq!(view.title, "CPU: 45.0°C (12.5%)");
        assert_eq!(view.subtitle, "Power: 35.2W");
        assert_eq!(view.detail, "6.2/16.0 GB (38.8%)");
    }

    #[test]
    fn test_missing_snapshot_renders_connection_error() {
        let view = render_view(
            ViewId::SystemOverview,
            None,
            TemperatureUnit::Celsius,
            true,
        );
        assert_eq!(view.title, "Connection Error");
        assert!(view.stale);
    }

    #[test]
    fn test_stale_snapshot_keeps_values() {
        let cache = TelemetryCache::new();
        cache.update(sample());
        let snap = cache.snapshot().unwrap();

        let view = render_view(
            ViewId::FanMonitoring,
            Some(&snap),
            TemperatureUnit::Celsius,
            true,
        );
        assert_eq!(view.title, "Active Fans: 2");
        assert_eq!(view.subtitle, "Average: 960 RPM");
        assert_eq!(view.detail, "Maximum: 1100 RPM");
        assert!(view.stale);
    }

    #[test]
    fn test_speed_formatting() {
        assert_eq!(format_speed(Some(12.0)), "12.0 Mbps");
        assert_eq!(format_speed(Some(2500.0)), "2.50 Gbps");
        assert_eq!(format_speed(None), "N/A");
    }

    #[test]
    fn test_view_labels_round_trip() {
        for view in ViewId::ALL {
            assert_eq!(ViewId::from_label(view.label()), Some(view));
        }
        assert_eq!(ViewId::from_label("Flux Capacitor"), None);
    }
}
