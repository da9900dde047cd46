//! Remote-entity command translation.
//!
//! Turns interactions coming from the remote platform (button presses,
//! free-text send-command, source selection, power affordances) into either
//! a catalogue token for the agent, a local Wake-on-LAN broadcast, or a
//! view selection for the cache. The token vocabulary mirrors the agent
//! catalogue; the two sides share the wire format, not code.

use thiserror::Error;
use tracing::debug;

use crate::config::DeviceConfig;
use crate::connectivity::ConnectivityState;
use crate::state::{new_state, Shared};
use crate::telemetry::ViewId;

/// Everything the remote platform can hand us.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityCommand {
    /// A button on one of the remote pages, carrying its command id.
    Button(String),
    /// Free-text "send command" input.
    SendCommand(String),
    /// A command sequence, executed element-wise, aborted on first failure.
    Sequence(Vec<String>),
    /// Monitoring source selection by display label.
    SelectSource(String),
    PowerOn,
    PowerOff,
    VolumeSet(u8),
    VolumeUp,
    VolumeDown,
    MuteToggle,
}

/// What the bridge should actually do.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// POST this token to the agent.
    Agent(String),
    /// POST these tokens in order, stop at the first failure.
    AgentBatch(Vec<String>),
    /// Broadcast the magic packet locally; the agent is not involved.
    WakeOnLan,
    /// Switch the presented view; no network traffic.
    SelectView(ViewId),
}

#[derive(Debug, Error, PartialEq)]
pub enum TranslateError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Wake-on-LAN needs a configured MAC address")]
    WakeNotConfigured,
    #[error("Host is offline, only power-on is available (rejected: {0})")]
    HostOffline(String),
}

/// Platform-level aliases for the power affordances.
const POWER_ON_ALIAS: &str = "POWER_ON";
const POWER_OFF_ALIAS: &str = "POWER_OFF";

/// Full token vocabulary of the agent, mirrored for local validation so a
/// doomed request is rejected before it leaves the controller.
pub const KNOWN_TOKENS: &[&str] = &[
    "arrow_up", "arrow_down", "arrow_left", "arrow_right", "enter", "escape",
    "back", "backspace", "tab", "space", "delete", "home", "end", "page_up",
    "page_down",
    "play_pause", "play", "pause", "stop", "previous", "next", "fast_forward",
    "rewind", "record", "volume_up", "volume_down", "mute", "mute_toggle",
    "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12",
    "windows_key", "win_l", "win_d", "win_e", "win_r", "win_i", "alt_tab",
    "ctrl_alt_del", "ctrl_shift_esc",
    "custom_calc", "custom_notepad", "custom_cmd", "custom_powershell",
    "url_youtube", "url_netflix", "url_plex", "url_jellyfin",
    "power_sleep", "power_hibernate", "power_shutdown", "power_restart",
    "power_wake",
    "pair_bluetooth", "show_pairing_help",
];

/// Parametrized families accepted in free-text input.
pub const KNOWN_PREFIXES: &[&str] = &["launch_exe:", "launch_url:", "set_volume:"];

/// One page of the remote UI: (label, token) per button.
pub struct RemotePage {
    pub id: &'static str,
    pub name: &'static str,
    pub buttons: &'static [(&'static str, &'static str)],
}

/// The six fixed remote pages.
pub const REMOTE_PAGES: [RemotePage; 6] = [
    RemotePage {
        id: "navigation",
        name: "Navigation",
        buttons: &[
            ("Up", "arrow_up"), ("Left", "arrow_left"), ("OK", "enter"),
            ("Right", "arrow_right"), ("Down", "arrow_down"), ("Esc", "escape"),
            ("Back", "back"), ("Tab", "tab"), ("Space", "space"),
            ("Delete", "delete"), ("Home", "home"), ("End", "end"),
            ("PgUp", "page_up"), ("PgDn", "page_down"),
        ],
    },
    RemotePage {
        id: "media",
        name: "Media Controls",
        buttons: &[
            ("Rewind", "rewind"), ("Prev", "previous"), ("Play", "play"),
            ("Pause", "pause"), ("Next", "next"), ("FFwd", "fast_forward"),
            ("Stop", "stop"), ("Rec", "record"), ("Vol-", "volume_down"),
            ("Mute", "mute"), ("Vol+", "volume_up"), ("Play/Pause", "play_pause"),
            ("F11", "f11"), ("F5", "f5"), ("F9", "f9"), ("Alt+Tab", "alt_tab"),
        ],
    },
    RemotePage {
        id: "windows",
        name: "Windows Shortcuts",
        buttons: &[
            ("Start", "windows_key"), ("Alt+Tab", "alt_tab"), ("Run", "win_r"),
            ("Desktop", "win_d"), ("Explorer", "win_e"), ("Settings", "win_i"),
            ("Task Mgr", "ctrl_shift_esc"), ("Bluetooth", "pair_bluetooth"),
            ("BT Help", "show_pairing_help"), ("Calculator", "custom_calc"),
            ("Notepad", "custom_notepad"),
        ],
    },
    RemotePage {
        id: "system_tools",
        name: "System Tools",
        buttons: &[
            ("Calculator", "custom_calc"), ("Notepad", "custom_notepad"),
            ("Command", "custom_cmd"), ("PowerShell", "custom_powershell"),
            ("YouTube", "url_youtube"), ("Netflix", "url_netflix"),
            ("Plex Web", "url_plex"), ("Jellyfin", "url_jellyfin"),
            ("Task Mgr", "ctrl_shift_esc"), ("Settings", "win_i"),
            ("Explorer", "win_e"), ("Bluetooth", "pair_bluetooth"),
        ],
    },
    RemotePage {
        id: "function_keys",
        name: "Function Keys",
        buttons: &[
            ("F1", "f1"), ("F2", "f2"), ("F3", "f3"), ("F4", "f4"),
            ("F5", "f5"), ("F6", "f6"), ("F7", "f7"), ("F8", "f8"),
            ("F9", "f9"), ("F10", "f10"), ("F11", "f11"), ("F12", "f12"),
            ("Task Mgr", "ctrl_shift_esc"), ("Lock", "win_l"),
            ("Settings", "win_i"), ("Explorer", "win_e"),
        ],
    },
    RemotePage {
        id: "power",
        name: "Power & System",
        buttons: &[
            ("PowerOn", "POWER_ON"), ("Sleep", "power_sleep"),
            ("Hibernate", "power_hibernate"), ("PowerOff", "power_shutdown"),
            ("Restart", "power_restart"), ("Settings", "win_i"),
            ("Task Mgr", "ctrl_shift_esc"), ("Run", "win_r"),
            ("Desktop", "win_d"),
        ],
    },
];

/// Commands and sources the remote platform should currently expose.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySet {
    pub simple_commands: Vec<&'static str>,
    pub sources: Vec<ViewId>,
}

/// Re-derived after every reconfiguration: wake shows up only with a MAC,
/// the source list only while monitoring is enabled, the GPU view only when
/// a dedicated GPU was seen.
pub fn derive_entities(cfg: &DeviceConfig, has_dedicated_gpu: bool) -> EntitySet {
    let mut simple_commands: Vec<&'static str> = vec![POWER_OFF_ALIAS];
    if cfg.wol_enabled() {
        simple_commands.insert(0, POWER_ON_ALIAS);
    }
    simple_commands.extend_from_slice(KNOWN_TOKENS);

    let sources = if cfg.monitoring_enabled {
        let mut sources = vec![
            ViewId::SystemOverview,
            ViewId::CpuPerformance,
            ViewId::MemoryUsage,
            ViewId::StorageActivity,
            ViewId::NetworkActivity,
            ViewId::TemperatureOverview,
            ViewId::FanMonitoring,
            ViewId::PowerConsumption,
        ];
        if has_dedicated_gpu {
            sources.insert(2, ViewId::GpuPerformance);
        }
        sources
    } else {
        Vec::new()
    };

    EntitySet {
        simple_commands,
        sources,
    }
}

#[derive(Clone)]
pub struct Translator {
    /// The agent offers no volume readback, so the last pushed level is the
    /// best guess for stepping.
    volume: Shared<u8>,
    muted: Shared<bool>,
}

impl Translator {
    pub fn new() -> Self {
        Translator {
            volume: new_state(50),
            muted: new_state(false),
        }
    }

    pub fn assumed_volume(&self) -> u8 {
        *self.volume.lock()
    }

    pub fn assumed_muted(&self) -> bool {
        *self.muted.lock()
    }

    /// Map one entity command to a directive. Agent-bound directives are
    /// refused while the host is known to be offline; waking it is then the
    /// only viable action.
    pub fn translate(
        &self,
        command: &EntityCommand,
        cfg: &DeviceConfig,
        connectivity: ConnectivityState,
    ) -> Result<Directive, TranslateError> {
        let directive = match command {
            EntityCommand::Button(id) | EntityCommand::SendCommand(id) => {
                self.translate_token(id, cfg)?
            }
            EntityCommand::Sequence(tokens) => {
                let mut batch = Vec::with_capacity(tokens.len());
                for token in tokens {
                    match self.translate_token(token, cfg)? {
                        Directive::Agent(t) => batch.push(t),
                        other => return Ok(other),
                    }
                }
                Directive::AgentBatch(batch)
            }
            EntityCommand::SelectSource(label) => {
                let view = ViewId::from_label(label)
                    .ok_or_else(|| TranslateError::UnknownCommand(label.clone()))?;
                Directive::SelectView(view)
            }
            EntityCommand::PowerOn => self.wake_directive(cfg)?,
            EntityCommand::PowerOff => Directive::Agent("power_shutdown".to_string()),
            EntityCommand::VolumeSet(level) => {
                let level = (*level).min(100);
                *self.volume.lock() = level;
                Directive::Agent(format!("set_volume:{level}"))
            }
            EntityCommand::VolumeUp => {
                let level = (self.assumed_volume() + 5).min(100);
                *self.volume.lock() = level;
                Directive::Agent(format!("set_volume:{level}"))
            }
            EntityCommand::VolumeDown => {
                let level = self.assumed_volume().saturating_sub(5);
                *self.volume.lock() = level;
                Directive::Agent(format!("set_volume:{level}"))
            }
            EntityCommand::MuteToggle => {
                let mut muted = self.muted.lock();
                *muted = !*muted;
                Directive::Agent("mute_toggle".to_string())
            }
        };

        match &directive {
            Directive::Agent(token) if connectivity == ConnectivityState::Disconnected => {
                Err(TranslateError::HostOffline(token.clone()))
            }
            Directive::AgentBatch(_) if connectivity == ConnectivityState::Disconnected => {
                Err(TranslateError::HostOffline("sequence".to_string()))
            }
            _ => {
                debug!("Translated {command:?} -> {directive:?}");
                Ok(directive)
            }
        }
    }

    fn translate_token(
        &self,
        token: &str,
        cfg: &DeviceConfig,
    ) -> Result<Directive, TranslateError> {
        match token {
            POWER_ON_ALIAS => return self.wake_directive(cfg),
            POWER_OFF_ALIAS => return Ok(Directive::Agent("power_shutdown".to_string())),
            _ => {}
        }
        if is_known_token(token) {
            Ok(Directive::Agent(token.to_string()))
        } else {
            Err(TranslateError::UnknownCommand(token.to_string()))
        }
    }

    fn wake_directive(&self, cfg: &DeviceConfig) -> Result<Directive, TranslateError> {
        if cfg.wol_enabled() {
            Ok(Directive::WakeOnLan)
        } else {
            Err(TranslateError::WakeNotConfigured)
        }
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

/// Bare known token, or a known family prefix with a non-empty parameter.
fn is_known_token(token: &str) -> bool {
    if KNOWN_TOKENS.contains(&token) {
        return true;
    }
    KNOWN_PREFIXES
        .iter()
        .any(|prefix| token.starts_with(prefix) && token.len() > prefix.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> DeviceConfig {
        let mut cfg = DeviceConfig::default();
        cfg.host = "192.168.1.50".into();
        cfg.mac_address = Some("18-C0-4D-8F-29-06".into());
        cfg
    }

    #[test]
    fn test_every_page_button_translates() {
        let translator = Translator::new();
        let cfg = configured();
        for page in &REMOTE_PAGES {
            for (label, token) in page.buttons {
                let result = translator.translate(
                    &EntityCommand::Button(token.to_string()),
                    &cfg,
                    ConnectivityState::Connected,
                );
                assert!(result.is_ok(), "button {label} ({token}) on {}", page.id);
            }
        }
    }

    #[test]
    fn test_free_text_validation() {
        let translator = Translator::new();
        let cfg = configured();

        let ok = translator.translate(
            &EntityCommand::SendCommand("play_pause".into()),
            &cfg,
            ConnectivityState::Connected,
        );
        assert_eq!(ok, Ok(Directive::Agent("play_pause".into())));

        let exe = translator.translate(
            &EntityCommand::SendCommand("launch_exe:C:\\Apps\\kodi.exe".into()),
            &cfg,
            ConnectivityState::Connected,
        );
        assert_eq!(
            exe,
            Ok(Directive::Agent("launch_exe:C:\\Apps\\kodi.exe".into()))
        );

        // unknown bare token, unknown prefix, empty parameter
        for bad in ["warp_drive", "launch_game:doom", "launch_exe:"] {
            let result = translator.translate(
                &EntityCommand::SendCommand(bad.into()),
                &cfg,
                ConnectivityState::Connected,
            );
            assert!(
                matches!(result, Err(TranslateError::UnknownCommand(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_power_on_is_local_and_needs_a_mac() {
        let translator = Translator::new();

        let with_mac = configured();
        assert_eq!(
            translator.translate(
                &EntityCommand::PowerOn,
                &with_mac,
                ConnectivityState::Disconnected
            ),
            Ok(Directive::WakeOnLan)
        );

        let mut without_mac = configured();
        without_mac.mac_address = None;
        assert_eq!(
            translator.translate(
                &EntityCommand::PowerOn,
                &without_mac,
                ConnectivityState::Disconnected
            ),
            Err(TranslateError::WakeNotConfigured)
        );
    }

    #[test]
    fn test_disconnected_blocks_agent_commands_but_not_wake() {
        let translator = Translator::new();
        let cfg = configured();

        let blocked = translator.translate(
            &EntityCommand::Button("enter".into()),
            &cfg,
            ConnectivityState::Disconnected,
        );
        assert!(matches!(blocked, Err(TranslateError::HostOffline(_))));

        // POWER_ON via the button alias also stays available
        let wake = translator.translate(
            &EntityCommand::Button("POWER_ON".into()),
            &cfg,
            ConnectivityState::Disconnected,
        );
        assert_eq!(wake, Ok(Directive::WakeOnLan));
    }

    #[test]
    fn test_sequence_translates_element_wise() {
        let translator = Translator::new();
        let cfg = configured();

        let ok = translator.translate(
            &EntityCommand::Sequence(vec!["win_d".into(), "enter".into()]),
            &cfg,
            ConnectivityState::Connected,
        );
        assert_eq!(
            ok,
            Ok(Directive::AgentBatch(vec!["win_d".into(), "enter".into()]))
        );

        let bad = translator.translate(
            &EntityCommand::Sequence(vec!["win_d".into(), "warp_drive".into()]),
            &cfg,
            ConnectivityState::Connected,
        );
        assert!(matches!(bad, Err(TranslateError::UnknownCommand(_))));
    }

    #[test]
    fn test_source_selection_is_local() {
        let translator = Translator::new();
        let cfg = configured();

        let view = translator.translate(
            &EntityCommand::SelectSource("Fan Monitoring".into()),
            &cfg,
            ConnectivityState::Connected,
        );
        assert_eq!(view, Ok(Directive::SelectView(ViewId::FanMonitoring)));

        // no agent involved, works while disconnected too
        let offline = translator.translate(
            &EntityCommand::SelectSource("CPU Performance".into()),
            &cfg,
            ConnectivityState::Disconnected,
        );
        assert_eq!(offline, Ok(Directive::SelectView(ViewId::CpuPerformance)));
    }

    #[test]
    fn test_volume_stepping() {
        let translator = Translator::new();
        let cfg = configured();

        let up = translator.translate(
            &EntityCommand::VolumeUp,
            &cfg,
            ConnectivityState::Connected,
        );
        assert_eq!(up, Ok(Directive::Agent("set_volume:55".into())));

        translator
            .translate(
                &EntityCommand::VolumeSet(98),
                &cfg,
                ConnectivityState::Connected,
            )
            .unwrap();
        let capped = translator.translate(
            &EntityCommand::VolumeUp,
            &cfg,
            ConnectivityState::Connected,
        );
        assert_eq!(capped, Ok(Directive::Agent("set_volume:100".into())));

        translator
            .translate(
                &EntityCommand::VolumeSet(3),
                &cfg,
                ConnectivityState::Connected,
            )
            .unwrap();
        let floored = translator.translate(
            &EntityCommand::VolumeDown,
            &cfg,
            ConnectivityState::Connected,
        );
        assert_eq!(floored, Ok(Directive::Agent("set_volume:0".into())));
    }

    #[test]
    fn test_entity_derivation_follows_config() {
        let cfg = configured();
        let set = derive_entities(&cfg, false);
        assert_eq!(set.simple_commands[0], "POWER_ON");
        assert_eq!(set.sources.len(), 8);
        assert!(!set.sources.contains(&ViewId::GpuPerformance));

        let with_gpu = derive_entities(&cfg, true);
        assert_eq!(with_gpu.sources[2], ViewId::GpuPerformance);
        assert_eq!(with_gpu.sources.len(), 9);

        let mut no_monitoring = configured();
        no_monitoring.monitoring_enabled = false;
        let reduced = derive_entities(&no_monitoring, true);
        assert!(reduced.sources.is_empty());
        // command dispatch is unaffected
        assert!(reduced.simple_commands.contains(&"power_shutdown"));

        let mut no_mac = configured();
        no_mac.mac_address = None;
        let no_wake = derive_entities(&no_mac, false);
        assert!(!no_wake.simple_commands.contains(&"POWER_ON"));
    }
}
