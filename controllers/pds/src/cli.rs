//! Command line configuration.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::PdsError;
use crate::notify::{DEFAULT_PLAYER, DEFAULT_SOUND};

/// Default ceiling on how long one run may watch.
const DEFAULT_MAX_LIFETIME_SECS: u64 = 24 * 60 * 60;

/// pds listens for changes of pods in every namespace to fire notifications in time
#[derive(Debug, Parser)]
#[command(name = "pds", version, about)]
pub struct Cli {
    /// Path to the kubeconfig file (defaults to ~/.kube/config, or in-cluster config without a home directory)
    #[arg(long, env = "PDS_KUBECONFIG", global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Directory receiving the per-day log file (defaults to the system temp dir)
    #[arg(long, env = "PDS_LOG_DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// Stop watching after this many seconds even without a signal
    #[arg(long, env = "PDS_MAX_LIFETIME_SECS", default_value_t = DEFAULT_MAX_LIFETIME_SECS, global = true)]
    pub max_lifetime_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

/// Watch targets.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Watch every pod in every namespace
    Pod(PodArgs),
}

/// Callbacks to run for each pod change.
#[derive(Debug, Args)]
pub struct PodArgs {
    /// Shell script run on each change with $1 = pod name and $2 = pod status as JSON (repeatable)
    #[arg(long = "script", value_name = "PATH")]
    pub scripts: Vec<PathBuf>,

    /// Play a sound when a pod reaches the Failed phase
    #[arg(long)]
    pub bell_on_failed: bool,

    /// Sound file played by --bell-on-failed
    #[arg(long, default_value = DEFAULT_SOUND)]
    pub sound: PathBuf,

    /// Audio player command used by --bell-on-failed
    #[arg(long, default_value = DEFAULT_PLAYER)]
    pub player: String,
}

impl Cli {
    /// Hard ceiling on the run.
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    /// Directory for log files.
    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Rejects configurations that would watch without reacting.
    pub fn validate(&self) -> Result<(), PdsError> {
        let Command::Pod(args) = &self.command;
        if args.scripts.is_empty() && !args.bell_on_failed {
            return Err(PdsError::InvalidConfig(
                "at least one --script or --bell-on-failed is required".to_string(),
            ));
        }
        if let Some(script) = args.scripts.iter().find(|s| s.as_os_str().is_empty()) {
            return Err(PdsError::InvalidConfig(format!(
                "the shell script can not be empty: {:?}",
                script
            )));
        }
        if self.max_lifetime_secs == 0 {
            return Err(PdsError::InvalidConfig(
                "--max-lifetime-secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
