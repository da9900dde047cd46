//! Bridge context: the one object every component hangs off.
//!
//! Holds the shared DeviceConfig, the telemetry cache, the connectivity
//! tracker and the clients. Reconfiguration builds a new config and swaps
//! the whole struct under the guard; readers always see either the old or
//! the new one, never a mix.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::agent::AgentClient;
use crate::config::DeviceConfig;
use crate::connectivity::{ConnectivityState, ConnectivityTracker};
use crate::monitor::MonitorClient;
use crate::state::{new_state, snapshot, Shared};
use crate::telemetry::{render_view, TelemetryCache, ViewId, ViewModel};
use crate::translator::{derive_entities, Directive, EntityCommand, EntitySet, Translator};
use crate::wol;

#[derive(Clone)]
pub struct BridgeContext {
    pub config: Shared<DeviceConfig>,
    pub cache: TelemetryCache,
    pub connectivity: Arc<ConnectivityTracker>,
    pub monitor: MonitorClient,
    pub agent: AgentClient,
    pub translator: Translator,
    selected_view: Shared<ViewId>,
}

impl BridgeContext {
    pub fn new(config: DeviceConfig) -> Self {
        BridgeContext {
            config: new_state(config),
            cache: TelemetryCache::new(),
            connectivity: Arc::new(ConnectivityTracker::default()),
            monitor: MonitorClient::new(),
            agent: AgentClient::new(),
            translator: Translator::new(),
            selected_view: new_state(ViewId::SystemOverview),
        }
    }

    /// Swap the configuration wholesale and re-derive what the remote
    /// platform should expose. The cache and connectivity state survive the
    /// swap; a selected view that no longer exists falls back to the
    /// overview.
    pub fn reconfigure(&self, new_config: DeviceConfig) -> EntitySet {
        info!(
            "Reconfiguring (host: {}, monitoring: {})",
            new_config.host, new_config.monitoring_enabled
        );
        *self.config.lock() = new_config;

        let entities = self.entity_set();
        let mut selected = self.selected_view.lock();
        if !entities.sources.contains(&*selected) {
            *selected = ViewId::SystemOverview;
        }
        entities
    }

    pub fn entity_set(&self) -> EntitySet {
        let cfg = snapshot(&self.config);
        derive_entities(&cfg, self.cache.has_dedicated_gpu())
    }

    pub fn selected_view(&self) -> ViewId {
        *self.selected_view.lock()
    }

    /// Translate and carry out one remote-entity command.
    pub async fn handle(&self, command: EntityCommand) -> Result<()> {
        let cfg = snapshot(&self.config);
        let directive = self
            .translator
            .translate(&command, &cfg, self.connectivity.state())?;
        self.run(directive, &cfg).await
    }

    async fn run(&self, directive: Directive, cfg: &DeviceConfig) -> Result<()> {
        match directive {
            Directive::Agent(token) => self.agent.send_command(cfg, &token).await,
            Directive::AgentBatch(tokens) => {
                for token in tokens {
                    self.agent.send_command(cfg, &token).await?;
                }
                Ok(())
            }
            Directive::WakeOnLan => {
                wol::send_magic_packet(cfg.mac_address.as_deref().unwrap_or_default())
            }
            Directive::SelectView(view) => {
                *self.selected_view.lock() = view;
                Ok(())
            }
        }
    }

    /// Render the currently selected view from the cached snapshot. Cached
    /// values are marked stale as soon as the host stops answering.
    pub fn current_view(&self) -> ViewModel {
        let cfg = snapshot(&self.config);
        let stale = self.connectivity.state() != ConnectivityState::Connected;
        let snapshot = self.cache.snapshot();
        render_view(
            self.selected_view(),
            snapshot.as_ref(),
            cfg.temperature_unit,
            stale,
        )
    }
}
