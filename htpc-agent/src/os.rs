//! Native OS action layer.
//!
//! Windows is the primary target: synthetic input goes through the winuser
//! event queue, power transitions through the stock shutdown tooling, and
//! URL opens through the shell default handler. Non-Windows hosts get the
//! closest equivalent where one exists and a clean error where it does not,
//! so the agent stays testable on a development machine.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

use crate::catalogue::{vk, PowerTransition};
use crate::executor::OsActions;

pub struct NativeOs;

#[async_trait]
impl OsActions for NativeOs {
    fn tap_key(&self, vk: u16) -> Result<()> {
        press_and_release(&[vk])
    }

    fn tap_chord(&self, chord: &[u16]) -> Result<()> {
        press_and_release(chord)
    }

    async fn spawn_program(&self, program: &str) -> Result<()> {
        AsyncCommand::new(program)
            .spawn()
            .with_context(|| format!("Failed to launch {program}"))?;
        Ok(())
    }

    async fn launch_executable(&self, path: &str) -> Result<()> {
        let expanded = expand_env_vars(path);
        if !Path::new(&expanded).exists() {
            return Err(anyhow!("Executable not found: {expanded}"));
        }
        AsyncCommand::new(&expanded)
            .spawn()
            .with_context(|| format!("Failed to launch {expanded}"))?;
        Ok(())
    }

    async fn open_url(&self, url: &str) -> Result<()> {
        debug!("Opening URL: {url}");
        let mut command = if cfg!(target_os = "windows") {
            let mut c = AsyncCommand::new("cmd");
            // empty title argument so paths with spaces are not eaten by start
            c.args(["/C", "start", "", url]);
            c
        } else {
            let mut c = AsyncCommand::new("xdg-open");
            c.arg(url);
            c
        };
        command
            .spawn()
            .with_context(|| format!("Failed to open URL {url}"))?;
        Ok(())
    }

    async fn power(&self, transition: PowerTransition) -> Result<()> {
        if cfg!(target_os = "windows") {
            power_windows(transition).await
        } else {
            power_unix(transition).await
        }
    }

    fn set_volume(&self, percent: u8) -> Result<()> {
        // Key-event fallback without a mixer readback: drive the level to
        // the floor, then step up. Each tap moves the Windows mixer by 2%.
        for _ in 0..50 {
            press_and_release(&[vk::VOLUME_DOWN])?;
        }
        for _ in 0..(percent / 2) {
            press_and_release(&[vk::VOLUME_UP])?;
        }
        Ok(())
    }

    fn toggle_mute(&self) -> Result<()> {
        press_and_release(&[vk::VOLUME_MUTE])
    }
}

/// Press every key in order, release in reverse, via the winuser queue.
#[cfg(windows)]
fn press_and_release(keys: &[u16]) -> Result<()> {
    use winapi::um::winuser::{keybd_event, KEYEVENTF_KEYUP};

    unsafe {
        for &key in keys {
            keybd_event(key as u8, 0, 0, 0);
        }
        for &key in keys.iter().rev() {
            keybd_event(key as u8, 0, KEYEVENTF_KEYUP, 0);
        }
    }
    Ok(())
}

#[cfg(not(windows))]
fn press_and_release(_keys: &[u16]) -> Result<()> {
    Err(anyhow!("Synthetic input not supported on this platform"))
}

async fn power_windows(transition: PowerTransition) -> Result<()> {
    let (program, args): (&str, &[&str]) = match transition {
        PowerTransition::Sleep => ("rundll32.exe", &["powrprof.dll,SetSuspendState", "0,1,0"]),
        PowerTransition::Hibernate => ("shutdown", &["/h"]),
        PowerTransition::Shutdown => ("shutdown", &["/s", "/t", "0"]),
        PowerTransition::Restart => ("shutdown", &["/r", "/t", "0"]),
        PowerTransition::Wake => return wake_jiggle(),
    };

    let output = AsyncCommand::new(program)
        .args(args)
        .output()
        .await
        .with_context(|| format!("Failed to execute {program}"))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(anyhow!(
            "{program} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        ))
    }
}

async fn power_unix(transition: PowerTransition) -> Result<()> {
    let (program, args): (&str, &[&str]) = match transition {
        PowerTransition::Sleep => ("systemctl", &["suspend"]),
        PowerTransition::Hibernate => ("systemctl", &["hibernate"]),
        PowerTransition::Shutdown => ("shutdown", &["-h", "now"]),
        PowerTransition::Restart => ("reboot", &[]),
        PowerTransition::Wake => return wake_jiggle(),
    };

    let output = AsyncCommand::new(program)
        .args(args)
        .output()
        .await
        .with_context(|| format!("Failed to execute {program}"))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(anyhow!(
            "{program} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        ))
    }
}

/// Waking from the inside only works if the host is dozing rather than
/// suspended; a tiny pointer move is enough user activity for that case.
/// Real wake from power-off is Wake-on-LAN, handled on the controller side.
#[cfg(windows)]
fn wake_jiggle() -> Result<()> {
    use winapi::um::winuser::{mouse_event, MOUSEEVENTF_MOVE};

    unsafe {
        mouse_event(MOUSEEVENTF_MOVE, 1, 1, 0, 0);
        mouse_event(MOUSEEVENTF_MOVE, -1i32 as u32, -1i32 as u32, 0, 0);
    }
    Ok(())
}

#[cfg(not(windows))]
fn wake_jiggle() -> Result<()> {
    Err(anyhow!("Wake signal not supported on this platform"))
}

/// Expand `%VAR%` references the way the Windows shell would. Unknown
/// variables are left as-is.
fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        match tail.find('%') {
            Some(end) => {
                let name = &tail[..end];
                match std::env::var(name) {
                    Ok(value) => out.push_str(&value),
                    Err(_) => {
                        out.push('%');
                        out.push_str(name);
                        out.push('%');
                    }
                }
                rest = &tail[end + 1..];
            }
            None => {
                out.push('%');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("HTPC_TEST_DIR", "C:\\Apps");
        assert_eq!(
            expand_env_vars("%HTPC_TEST_DIR%\\kodi.exe"),
            "C:\\Apps\\kodi.exe"
        );
        // unknown variables survive untouched
        assert_eq!(
            expand_env_vars("%NO_SUCH_VAR_HERE%\\x"),
            "%NO_SUCH_VAR_HERE%\\x"
        );
        // stray percent is literal
        assert_eq!(expand_env_vars("50% done"), "50% done");
    }

    #[tokio::test]
    async fn test_launch_executable_missing_path() {
        let os = NativeOs;
        let err = os
            .launch_executable("/definitely/not/here.exe")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Executable not found"));
    }
}
