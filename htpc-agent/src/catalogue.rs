//! Fixed command catalogue for the HTPC agent.
//!
//! Every action the agent can perform is declared here, keyed by its wire
//! token. Tokens are case-sensitive. A token either matches a static entry
//! exactly, or belongs to one of the parametrized families:
//! - `launch_exe:<path>`   launch an executable by absolute path
//! - `launch_url:<url>`    open a URL with the default handler
//! - `set_volume:<0-100>`  absolute volume level
//! - `f<1-12>`             function keys
//!
//! The catalogue is built once at startup and never mutated afterwards, so
//! it can be shared between request handlers without locking.

use std::collections::HashMap;
use thiserror::Error;

/// Virtual-key codes used by the synthetic input layer (winuser values).
pub mod vk {
    pub const BACK: u16 = 0x08;
    pub const TAB: u16 = 0x09;
    pub const RETURN: u16 = 0x0D;
    pub const SHIFT: u16 = 0x10;
    pub const CONTROL: u16 = 0x11;
    pub const MENU: u16 = 0x12; // Alt
    pub const ESCAPE: u16 = 0x1B;
    pub const SPACE: u16 = 0x20;
    pub const PRIOR: u16 = 0x21; // Page Up
    pub const NEXT: u16 = 0x22; // Page Down
    pub const END: u16 = 0x23;
    pub const HOME: u16 = 0x24;
    pub const LEFT: u16 = 0x25;
    pub const UP: u16 = 0x26;
    pub const RIGHT: u16 = 0x27;
    pub const DOWN: u16 = 0x28;
    pub const DELETE: u16 = 0x2E;
    pub const KEY_D: u16 = 0x44;
    pub const KEY_E: u16 = 0x45;
    pub const KEY_I: u16 = 0x49;
    pub const KEY_L: u16 = 0x4C;
    pub const KEY_R: u16 = 0x52;
    pub const LWIN: u16 = 0x5B;
    pub const F1: u16 = 0x70;
    pub const F9: u16 = 0x78;
    pub const VOLUME_MUTE: u16 = 0xAD;
    pub const VOLUME_DOWN: u16 = 0xAE;
    pub const VOLUME_UP: u16 = 0xAF;
    pub const MEDIA_NEXT_TRACK: u16 = 0xB0;
    pub const MEDIA_PREV_TRACK: u16 = 0xB1;
    pub const MEDIA_STOP: u16 = 0xB2;
    pub const MEDIA_PLAY_PAUSE: u16 = 0xB3;
}

/// Error shape shared by the whole command path. Everything except
/// `Execution` is a caller-side fault.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Command family '{0}' requires a parameter")]
    MissingParameter(&'static str),
    #[error("Invalid parameter for '{family}': {detail}")]
    InvalidParameter {
        family: &'static str,
        detail: String,
    },
    #[error("Command failed: {0}")]
    Execution(String),
}

impl CommandError {
    /// Caller-side faults map to HTTP 4xx, agent-side to 5xx.
    pub fn is_caller_fault(&self) -> bool {
        !matches!(self, CommandError::Execution(_))
    }
}

/// Coarse grouping of catalogue entries, used for reporting and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Navigation,
    Media,
    Shortcut,
    AppLaunch,
    UrlLaunch,
    Power,
    Volume,
    Custom,
}

/// Host power transitions. All fire-and-forget: success means the request
/// was accepted by the OS, not that the transition completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerTransition {
    Sleep,
    Hibernate,
    Shutdown,
    Restart,
    Wake,
}

/// Handler identity for a catalogue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Tap a single key.
    Key(u16),
    /// Press a chord in order, release in reverse.
    Chord(&'static [u16]),
    /// Spawn a system program by name.
    Spawn(&'static str),
    /// Open a fixed URL (or URI scheme) with the default handler.
    OpenUrl(&'static str),
    /// Power-state transition.
    Power(PowerTransition),
    /// Absolute volume level, parameter 0-100.
    VolumeSet,
    /// Mute toggle on the default output.
    MuteToggle,
    /// Launch an executable given by the parameter.
    LaunchExe,
    /// Open a URL given by the parameter.
    LaunchUrl,
    /// Function key, index 1-12 taken from the token tail.
    FunctionKey(u8),
}

/// Immutable descriptor for one catalogue entry.
#[derive(Debug, Clone, Copy)]
pub struct ActionDescriptor {
    pub category: Category,
    pub kind: ActionKind,
}

/// A token resolved against the catalogue, parameter extracted and checked.
#[derive(Debug, Clone)]
pub struct ResolvedCommand {
    pub token: String,
    pub descriptor: ActionDescriptor,
    pub param: Option<String>,
}

use Category::*;

const CHORD_WIN_L: &[u16] = &[vk::LWIN, vk::KEY_L];
const CHORD_WIN_D: &[u16] = &[vk::LWIN, vk::KEY_D];
const CHORD_WIN_E: &[u16] = &[vk::LWIN, vk::KEY_E];
const CHORD_WIN_R: &[u16] = &[vk::LWIN, vk::KEY_R];
const CHORD_WIN_I: &[u16] = &[vk::LWIN, vk::KEY_I];
const CHORD_ALT_TAB: &[u16] = &[vk::MENU, vk::TAB];
const CHORD_CTRL_ALT_DEL: &[u16] = &[vk::CONTROL, vk::MENU, vk::DELETE];
const CHORD_CTRL_SHIFT_ESC: &[u16] = &[vk::CONTROL, vk::SHIFT, vk::ESCAPE];

/// Static entries. Families are handled separately in `resolve`.
static ENTRIES: &[(&str, Category, ActionKind)] = &[
    // Navigation keys
    ("arrow_up", Navigation, ActionKind::Key(vk::UP)),
    ("arrow_down", Navigation, ActionKind::Key(vk::DOWN)),
    ("arrow_left", Navigation, ActionKind::Key(vk::LEFT)),
    ("arrow_right", Navigation, ActionKind::Key(vk::RIGHT)),
    ("enter", Navigation, ActionKind::Key(vk::RETURN)),
    ("escape", Navigation, ActionKind::Key(vk::ESCAPE)),
    ("back", Navigation, ActionKind::Key(vk::BACK)),
    ("backspace", Navigation, ActionKind::Key(vk::BACK)),
    ("tab", Navigation, ActionKind::Key(vk::TAB)),
    ("space", Navigation, ActionKind::Key(vk::SPACE)),
    ("delete", Navigation, ActionKind::Key(vk::DELETE)),
    ("home", Navigation, ActionKind::Key(vk::HOME)),
    ("end", Navigation, ActionKind::Key(vk::END)),
    ("page_up", Navigation, ActionKind::Key(vk::PRIOR)),
    ("page_down", Navigation, ActionKind::Key(vk::NEXT)),
    // Windows shortcuts
    ("windows_key", Shortcut, ActionKind::Key(vk::LWIN)),
    ("win_l", Shortcut, ActionKind::Chord(CHORD_WIN_L)),
    ("win_d", Shortcut, ActionKind::Chord(CHORD_WIN_D)),
    ("win_e", Shortcut, ActionKind::Chord(CHORD_WIN_E)),
    ("win_r", Shortcut, ActionKind::Chord(CHORD_WIN_R)),
    ("win_i", Shortcut, ActionKind::Chord(CHORD_WIN_I)),
    ("alt_tab", Shortcut, ActionKind::Chord(CHORD_ALT_TAB)),
    ("ctrl_alt_del", Shortcut, ActionKind::Chord(CHORD_CTRL_ALT_DEL)),
    ("ctrl_shift_esc", Shortcut, ActionKind::Chord(CHORD_CTRL_SHIFT_ESC)),
    // Media controls. play/pause share the toggle key, like most HTPC apps
    // expect. fast_forward/rewind fall back to track skip keys.
    ("play_pause", Media, ActionKind::Key(vk::MEDIA_PLAY_PAUSE)),
    ("play", Media, ActionKind::Key(vk::MEDIA_PLAY_PAUSE)),
    ("pause", Media, ActionKind::Key(vk::MEDIA_PLAY_PAUSE)),
    ("stop", Media, ActionKind::Key(vk::MEDIA_STOP)),
    ("previous", Media, ActionKind::Key(vk::MEDIA_PREV_TRACK)),
    ("next", Media, ActionKind::Key(vk::MEDIA_NEXT_TRACK)),
    ("fast_forward", Media, ActionKind::Key(vk::MEDIA_NEXT_TRACK)),
    ("rewind", Media, ActionKind::Key(vk::MEDIA_PREV_TRACK)),
    // no dedicated record key exists; F9 is the usual capture binding
    ("record", Media, ActionKind::Key(vk::F9)),
    ("volume_up", Media, ActionKind::Key(vk::VOLUME_UP)),
    ("volume_down", Media, ActionKind::Key(vk::VOLUME_DOWN)),
    ("mute", Media, ActionKind::Key(vk::VOLUME_MUTE)),
    ("mute_toggle", Volume, ActionKind::MuteToggle),
    // Power management
    ("power_sleep", Power, ActionKind::Power(PowerTransition::Sleep)),
    ("power_hibernate", Power, ActionKind::Power(PowerTransition::Hibernate)),
    ("power_shutdown", Power, ActionKind::Power(PowerTransition::Shutdown)),
    ("power_restart", Power, ActionKind::Power(PowerTransition::Restart)),
    ("power_wake", Power, ActionKind::Power(PowerTransition::Wake)),
    // System applications that always exist
    ("custom_calc", AppLaunch, ActionKind::Spawn("calc.exe")),
    ("custom_notepad", AppLaunch, ActionKind::Spawn("notepad.exe")),
    ("custom_cmd", AppLaunch, ActionKind::Spawn("cmd.exe")),
    ("custom_powershell", AppLaunch, ActionKind::Spawn("powershell.exe")),
    // URL shortcuts
    ("url_youtube", UrlLaunch, ActionKind::OpenUrl("https://www.youtube.com")),
    ("url_netflix", UrlLaunch, ActionKind::OpenUrl("https://www.netflix.com")),
    ("url_plex", UrlLaunch, ActionKind::OpenUrl("https://app.plex.tv")),
    ("url_jellyfin", UrlLaunch, ActionKind::OpenUrl("http://localhost:8096")),
    // System utilities
    ("pair_bluetooth", Custom, ActionKind::OpenUrl("ms-settings:bluetooth")),
    (
        "show_pairing_help",
        Custom,
        ActionKind::OpenUrl(
            "https://support.microsoft.com/en-us/windows/pair-a-bluetooth-device-in-windows-2be7b51f-6ae9-b757-a3b9-95ee40c3e242",
        ),
    ),
];

pub struct Catalogue {
    entries: HashMap<&'static str, ActionDescriptor>,
}

impl Catalogue {
    pub fn new() -> Self {
        let mut entries = HashMap::with_capacity(ENTRIES.len());
        for (token, category, kind) in ENTRIES {
            entries.insert(
                *token,
                ActionDescriptor {
                    category: *category,
                    kind: *kind,
                },
            );
        }
        Catalogue { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Resolve a wire token into a descriptor plus checked parameter.
    ///
    /// Lookup order: exact static entry, then `family:<param>`, then the
    /// bare `f<N>` function-key pattern. An unrecognized token is rejected
    /// outright; nothing is ever partially executed.
    pub fn resolve(&self, token: &str) -> Result<ResolvedCommand, CommandError> {
        if let Some(descriptor) = self.entries.get(token) {
            return Ok(ResolvedCommand {
                token: token.to_string(),
                descriptor: *descriptor,
                param: None,
            });
        }

        if let Some((family, param)) = token.split_once(':') {
            return self.resolve_family(token, family, param);
        }

        if let Some(n) = parse_function_key(token) {
            return Ok(ResolvedCommand {
                token: token.to_string(),
                descriptor: ActionDescriptor {
                    category: Shortcut,
                    kind: ActionKind::FunctionKey(n),
                },
                param: None,
            });
        }

        Err(CommandError::UnknownCommand(token.to_string()))
    }

    fn resolve_family(
        &self,
        token: &str,
        family: &str,
        param: &str,
    ) -> Result<ResolvedCommand, CommandError> {
        let (name, category, kind): (&'static str, Category, ActionKind) = match family {
            "launch_exe" => ("launch_exe", AppLaunch, ActionKind::LaunchExe),
            "launch_url" => ("launch_url", UrlLaunch, ActionKind::LaunchUrl),
            "set_volume" => ("set_volume", Volume, ActionKind::VolumeSet),
            _ => return Err(CommandError::UnknownCommand(token.to_string())),
        };

        if param.is_empty() {
            return Err(CommandError::MissingParameter(name));
        }

        let param = match kind {
            ActionKind::VolumeSet => {
                let level: i64 = param.parse().map_err(|_| CommandError::InvalidParameter {
                    family: name,
                    detail: format!("'{param}' is not a number"),
                })?;
                // out-of-range levels are clamped, matching the agent's
                // historical behaviour
                level.clamp(0, 100).to_string()
            }
            ActionKind::LaunchExe => {
                let path = param.trim_matches('"');
                if path.trim().is_empty() {
                    return Err(CommandError::MissingParameter(name));
                }
                path.to_string()
            }
            _ => param.to_string(),
        };

        Ok(ResolvedCommand {
            token: token.to_string(),
            descriptor: ActionDescriptor { category, kind },
            param: Some(param),
        })
    }
}

impl Default for Catalogue {
    fn default() -> Self {
        Self::new()
    }
}

/// `f1` through `f12`, nothing else.
fn parse_function_key(token: &str) -> Option<u8> {
    let digits = token.strip_prefix('f')?;
    if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u8 = digits.parse().ok()?;
    (1..=12).contains(&n).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_static_entries_resolve_with_documented_category() {
        let cat = Catalogue::new();
        for (token, category, _) in ENTRIES {
            let resolved = cat.resolve(token).unwrap();
            assert_eq!(resolved.descriptor.category, *category, "token {token}");
            assert!(resolved.param.is_none());
        }
    }

    #[test]
    fn test_unknown_token_rejected() {
        let cat = Catalogue::new();
        assert!(matches!(
            cat.resolve("warp_drive"),
            Err(CommandError::UnknownCommand(_))
        ));
        // lookup is case-sensitive
        assert!(cat.resolve("Arrow_Up").is_err());
        // unknown family prefix with a parameter
        assert!(matches!(
            cat.resolve("launch_game:doom"),
            Err(CommandError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_families_require_parameter() {
        let cat = Catalogue::new();
        assert!(matches!(
            cat.resolve("launch_exe:"),
            Err(CommandError::MissingParameter("launch_exe"))
        ));
        assert!(matches!(
            cat.resolve("set_volume:"),
            Err(CommandError::MissingParameter("set_volume"))
        ));
    }

    #[test]
    fn test_set_volume_parsing() {
        let cat = Catalogue::new();
        let ok = cat.resolve("set_volume:40").unwrap();
        assert_eq!(ok.param.as_deref(), Some("40"));
        assert_eq!(ok.descriptor.category, Category::Volume);

        // clamped, not rejected
        let high = cat.resolve("set_volume:250").unwrap();
        assert_eq!(high.param.as_deref(), Some("100"));

        assert!(matches!(
            cat.resolve("set_volume:loud"),
            Err(CommandError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_launch_exe_strips_quotes() {
        let cat = Catalogue::new();
        let r = cat.resolve("launch_exe:\"C:\\Apps\\kodi.exe\"").unwrap();
        assert_eq!(r.param.as_deref(), Some("C:\\Apps\\kodi.exe"));
        assert_eq!(r.descriptor.category, Category::AppLaunch);
    }

    #[test]
    fn test_function_key_family() {
        let cat = Catalogue::new();
        let f1 = cat.resolve("f1").unwrap();
        assert_eq!(f1.descriptor.kind, ActionKind::FunctionKey(1));
        let f12 = cat.resolve("f12").unwrap();
        assert_eq!(f12.descriptor.kind, ActionKind::FunctionKey(12));
        assert!(cat.resolve("f0").is_err());
        assert!(cat.resolve("f13").is_err());
        assert!(cat.resolve("fx").is_err());
    }
}
