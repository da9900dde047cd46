//! Telemetry polling loop.
//!
//! A fixed 5-second cadence with at most one poll in flight: a tick that
//! fires while a poll is still running is skipped, not queued, so staleness
//! stays bounded. There is no retry and no backoff; the next tick is the
//! retry. With monitoring disabled the telemetry fetch is suspended and the
//! agent liveness probe alone drives connectivity.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::context::BridgeContext;
use crate::monitor;
use crate::state::snapshot;

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Spawn the polling task. It stops after the current iteration when the
/// shutdown channel fires; an in-flight poll is allowed to finish.
pub fn spawn_poller(ctx: BridgeContext, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(POLL_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = tick.tick() => poll_once(&ctx).await,
                _ = shutdown.changed() => {
                    info!("Poller stopping");
                    break;
                }
            }
        }
    })
}

/// One poll iteration. Failures downgrade connectivity and leave the cache
/// untouched; the presentation keeps the last good values.
pub async fn poll_once(ctx: &BridgeContext) {
    let cfg = snapshot(&ctx.config);
    if !cfg.is_configured() {
        return;
    }

    if cfg.monitoring_enabled {
        match ctx.monitor.fetch(&cfg).await {
            Ok(root) => {
                let prev = ctx.cache.snapshot();
                match monitor::normalize(&root, prev.as_ref().map(|s| &s.data)) {
                    Ok(raw) => {
                        ctx.cache.update(raw);
                        ctx.connectivity.record_success();
                    }
                    Err(e) => {
                        debug!("Malformed telemetry payload: {e:#}");
                        ctx.connectivity.record_failure();
                    }
                }
            }
            Err(e) => {
                debug!("Telemetry poll failed: {e:#}");
                ctx.connectivity.record_failure();
            }
        }
    } else {
        // telemetry suspendu : seul le /health de l'agent fait foi
        if ctx.agent.probe_health(&cfg).await {
            ctx.connectivity.record_success();
        } else {
            ctx.connectivity.record_failure();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::connectivity::ConnectivityState;
    use crate::monitor::RawTelemetry;

    /// Nothing listens on these ports; polls fail fast with a refusal.
    fn unreachable_config() -> DeviceConfig {
        let mut cfg = DeviceConfig::default();
        cfg.host = "127.0.0.1".into();
        cfg.monitor_port = 1;
        cfg.agent_port = 1;
        cfg
    }

    #[tokio::test]
    async fn test_poll_failure_preserves_snapshot_and_downgrades() {
        let ctx = BridgeContext::new(unreachable_config());

        let mut raw = RawTelemetry::default();
        raw.cpu_temp = Some(42.0);
        ctx.cache.update(raw);
        ctx.connectivity.record_success();
        let before = ctx.cache.snapshot().unwrap();

        // first failure: still connected, threshold not reached
        poll_once(&ctx).await;
        assert_eq!(ctx.connectivity.state(), ConnectivityState::Connected);
        assert_eq!(ctx.cache.snapshot().unwrap(), before);

        // second consecutive failure flips the state, cache untouched
        poll_once(&ctx).await;
        assert_eq!(ctx.connectivity.state(), ConnectivityState::Disconnected);
        assert_eq!(ctx.cache.snapshot().unwrap(), before);
    }

    #[tokio::test]
    async fn test_successful_update_restores_connected() {
        let ctx = BridgeContext::new(unreachable_config());
        poll_once(&ctx).await;
        poll_once(&ctx).await;
        assert_eq!(ctx.connectivity.state(), ConnectivityState::Disconnected);

        // a good poll would do exactly this pair of calls
        let mut raw = RawTelemetry::default();
        raw.cpu_temp = Some(55.0);
        ctx.cache.update(raw);
        ctx.connectivity.record_success();

        assert_eq!(ctx.connectivity.state(), ConnectivityState::Connected);
        assert_eq!(ctx.cache.snapshot().unwrap().data.cpu_temp, Some(55.0));
    }

    #[tokio::test]
    async fn test_unconfigured_host_is_a_noop() {
        let ctx = BridgeContext::new(DeviceConfig::default());
        poll_once(&ctx).await;
        assert_eq!(ctx.connectivity.state(), ConnectivityState::Unknown);
        assert!(ctx.cache.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_disabled_monitoring_probes_the_agent_instead() {
        let mut cfg = unreachable_config();
        cfg.monitoring_enabled = false;
        let ctx = BridgeContext::new(cfg);

        poll_once(&ctx).await;
        poll_once(&ctx).await;

        // the probe failed and drove connectivity; no telemetry appeared
        assert_eq!(ctx.connectivity.state(), ConnectivityState::Disconnected);
        assert!(ctx.cache.snapshot().is_none());
    }
}
