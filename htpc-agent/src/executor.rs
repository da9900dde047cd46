//! Serialized command execution.
//!
//! The executor resolves tokens against the catalogue and dispatches them to
//! the OS action layer one at a time. Commands arriving concurrently queue in
//! arrival order behind a fair async lock; two OS actions never interleave.
//! The OS layer sits behind a trait so tests can substitute a recording fake.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::catalogue::{ActionKind, Catalogue, CommandError, PowerTransition, ResolvedCommand};

/// OS side effects the agent can trigger. Implementations are global and
/// unsandboxed: window focus, process tree and power state of the host are
/// all in reach. That trust boundary is the agent's documented contract.
#[async_trait]
pub trait OsActions: Send + Sync {
    fn tap_key(&self, vk: u16) -> Result<()>;
    fn tap_chord(&self, chord: &[u16]) -> Result<()>;
    async fn spawn_program(&self, program: &str) -> Result<()>;
    async fn launch_executable(&self, path: &str) -> Result<()>;
    async fn open_url(&self, url: &str) -> Result<()>;
    async fn power(&self, transition: PowerTransition) -> Result<()>;
    fn set_volume(&self, percent: u8) -> Result<()>;
    fn toggle_mute(&self) -> Result<()>;
}

/// Successful execution outcome returned to the HTTP layer.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Outcome {
    pub message: String,
}

pub struct CommandExecutor {
    catalogue: Catalogue,
    os: Arc<dyn OsActions>,
    // fair lock: waiters are released in arrival order, which gives the
    // FIFO one-command-in-flight guarantee
    gate: tokio::sync::Mutex<()>,
}

impl CommandExecutor {
    pub fn new(catalogue: Catalogue, os: Arc<dyn OsActions>) -> Self {
        CommandExecutor {
            catalogue,
            os,
            gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    /// Resolve and run a single token. Resolution failures return before any
    /// side effect; execution failures surface with detail in the message.
    pub async fn execute(&self, token: &str) -> Result<Outcome, CommandError> {
        let resolved = self.catalogue.resolve(token)?;
        debug!("Executing command: {}", token);

        let _slot = self.gate.lock().await;
        let message = self
            .dispatch(&resolved)
            .await
            .map_err(|e| CommandError::Execution(format!("{e:#}")))?;

        info!("Command '{}' -> {}", token, message);
        Ok(Outcome { message })
    }

    async fn dispatch(&self, cmd: &ResolvedCommand) -> Result<String> {
        match cmd.descriptor.kind {
            ActionKind::Key(vk) => {
                self.os.tap_key(vk)?;
                Ok(format!("Sent key: {}", cmd.token))
            }
            ActionKind::Chord(chord) => {
                self.os.tap_chord(chord)?;
                Ok(format!("Sent shortcut: {}", cmd.token))
            }
            ActionKind::FunctionKey(n) => {
                self.os.tap_key(crate::catalogue::vk::F1 + u16::from(n) - 1)?;
                Ok(format!("Sent function key: f{n}"))
            }
            ActionKind::Spawn(program) => {
                self.os.spawn_program(program).await?;
                Ok(format!("Launched {program}"))
            }
            ActionKind::OpenUrl(url) => {
                self.os.open_url(url).await?;
                Ok("Opened URL in default handler".to_string())
            }
            ActionKind::LaunchExe => {
                let path = cmd.param.as_deref().unwrap_or_default();
                self.os.launch_executable(path).await?;
                Ok(format!("Launched {path}"))
            }
            ActionKind::LaunchUrl => {
                let url = cmd.param.as_deref().unwrap_or_default();
                self.os.open_url(url).await?;
                Ok("Opened URL in browser".to_string())
            }
            ActionKind::Power(transition) => {
                self.os.power(transition).await?;
                Ok(power_message(transition).to_string())
            }
            ActionKind::VolumeSet => {
                // validated by the catalogue, always 0-100 here
                let level: u8 = cmd.param.as_deref().unwrap_or("0").parse().unwrap_or(0);
                self.os.set_volume(level)?;
                Ok(format!("Set volume to {level}%"))
            }
            ActionKind::MuteToggle => {
                self.os.toggle_mute()?;
                Ok("Toggled mute".to_string())
            }
        }
    }
}

fn power_message(transition: PowerTransition) -> &'static str {
    match transition {
        PowerTransition::Sleep => "System going to sleep",
        PowerTransition::Hibernate => "System hibernating",
        PowerTransition::Shutdown => "System shutting down",
        PowerTransition::Restart => "System restarting",
        PowerTransition::Wake => "Wake signal sent",
    }
}
