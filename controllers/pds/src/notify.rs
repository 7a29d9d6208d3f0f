//! Notification callbacks.
//!
//! - `ScriptHook`: runs a user shell script for every pod change
//! - `FailedPodBell`: plays a sound when a pod reaches the `Failed` phase
//!
//! Child processes are killed when the shared token is cancelled.

use anyhow::{bail, Context};
use k8s_openapi::api::core::v1::Pod;
use pod_watch::PodHandler;
use std::path::PathBuf;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Sound played for failed pods.
pub const DEFAULT_SOUND: &str = "/usr/share/sounds/freedesktop/stereo/message-new-instant.oga";

/// Audio player used to play [`DEFAULT_SOUND`].
pub const DEFAULT_PLAYER: &str = "paplay";

/// Phase reported by pods whose containers terminated in failure.
const FAILED_PHASE: &str = "Failed";

/// Runs `command` to completion, or kills it once `token` is cancelled.
///
/// A cancelled run is not an error: the session is shutting down anyway.
async fn run_command(token: &CancellationToken, mut command: Command) -> anyhow::Result<()> {
    let program = command.as_std().get_program().to_string_lossy().into_owned();
    let mut child = command
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn {}", program))?;

    let status = tokio::select! {
        status = child.wait() => status.with_context(|| format!("failed to wait for {}", program))?,
        () = token.cancelled() => {
            debug!("Killing {} on shutdown", program);
            child.kill().await.with_context(|| format!("failed to kill {}", program))?;
            return Ok(());
        }
    };

    if !status.success() {
        bail!("{} exited with {}", program, status);
    }
    Ok(())
}

/// Runs `sh <script> <pod name> <pod status JSON>` for every pod change.
#[derive(Debug, Clone)]
pub struct ScriptHook {
    shell: String,
    script: PathBuf,
}

impl ScriptHook {
    /// Hook running `script` with `sh`.
    pub fn new(script: PathBuf) -> Self {
        Self {
            shell: "sh".to_string(),
            script,
        }
    }

    fn command(&self, pod: &Pod) -> anyhow::Result<Command> {
        let name = pod.metadata.name.clone().unwrap_or_default();
        let status = serde_json::to_string(&pod.status.clone().unwrap_or_default())
            .context("failed to encode pod status")?;

        let mut command = Command::new(&self.shell);
        command.arg(&self.script).arg(name).arg(status);
        Ok(command)
    }
}

#[async_trait::async_trait]
impl PodHandler for ScriptHook {
    async fn handle(&self, token: &CancellationToken, pod: Pod) -> anyhow::Result<()> {
        let command = self.command(&pod)?;
        run_command(token, command)
            .await
            .with_context(|| format!("script {}", self.script.display()))
    }
}

/// Plays a sound for pods in the `Failed` phase and ignores the rest.
#[derive(Debug, Clone)]
pub struct FailedPodBell {
    player: String,
    sound: PathBuf,
}

impl FailedPodBell {
    /// Bell playing `sound` with `player`.
    pub fn new(player: impl Into<String>, sound: PathBuf) -> Self {
        Self {
            player: player.into(),
            sound,
        }
    }

    /// Plays the sound once.
    pub async fn ring(&self, token: &CancellationToken) -> anyhow::Result<()> {
        let mut command = Command::new(&self.player);
        command.arg(&self.sound);
        run_command(token, command).await
    }
}

#[async_trait::async_trait]
impl PodHandler for FailedPodBell {
    async fn handle(&self, token: &CancellationToken, pod: Pod) -> anyhow::Result<()> {
        let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref());
        if phase != Some(FAILED_PHASE) {
            return Ok(());
        }

        warn!(
            "= pod details: {} - {} - {}",
            pod.metadata.namespace.as_deref().unwrap_or_default(),
            pod.metadata.name.as_deref().unwrap_or_default(),
            FAILED_PHASE
        );
        self.ring(token).await
    }
}
