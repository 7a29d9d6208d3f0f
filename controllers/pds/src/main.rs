//! pds
//!
//! Listens for pod changes in every namespace of a Kubernetes cluster and
//! fires notifications in time:
//! - a user shell script per change (`--script`, repeatable)
//! - a sound when a pod fails (`--bell-on-failed`)
//!
//! Each (namespace, callback) pair gets its own watch stream. The run stops
//! on SIGINT/SIGTERM/SIGQUIT or once the maximum lifetime elapses.

mod cli;
mod error;
mod logging;
mod notify;
mod signals;

use crate::cli::{Cli, Command, PodArgs};
use crate::error::PdsError;
use crate::notify::{FailedPodBell, ScriptHook};
use clap::Parser;
use pod_watch::{ConnectionProvider, KubeConnectionFactory, KubeconfigSource, SharedHandler, Supervisor};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<(), PdsError> {
    let cli = Cli::parse();
    let _guard = logging::init_logging(&cli.log_dir())?;

    if let Err(e) = run(cli).await {
        error!("fatal: {}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), PdsError> {
    cli.validate()?;

    // kube builds its TLS config through rustls, which needs a process-wide provider
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    info!("Starting pds");

    let source = KubeconfigSource::from_path_or_default(cli.kubeconfig.clone());
    info!("Configuration:");
    match &source {
        KubeconfigSource::File(path) => info!("  Kubeconfig: {}", path.display()),
        KubeconfigSource::InCluster => info!("  Kubeconfig: in-cluster"),
    }
    info!("  Log directory: {}", cli.log_dir().display());
    info!("  Max lifetime: {}s", cli.max_lifetime_secs);

    let token = CancellationToken::new();
    let Command::Pod(args) = &cli.command;
    let handlers = build_handlers(args, &token).await?;

    let provider = ConnectionProvider::new(KubeConnectionFactory::new(source));
    let supervisor = Supervisor::new(provider.get_connection().await?);
    supervisor.start_all(&token, &handlers).await?;

    let signal_result = tokio::select! {
        res = signals::wait_for_shutdown_signal() => res,
        () = tokio::time::sleep(cli.max_lifetime()) => {
            info!("Maximum lifetime of {}s reached", cli.max_lifetime_secs);
            Ok(())
        }
    };

    info!("Shutting down, waiting for watch sessions to stop");
    token.cancel();
    supervisor.wait().await;
    info!(
        "All {} watch sessions stopped",
        supervisor.progress().completed
    );

    signal_result.map_err(PdsError::from)
}

/// One callback per script, plus the failed-pod bell when requested.
async fn build_handlers(
    args: &PodArgs,
    token: &CancellationToken,
) -> Result<Vec<SharedHandler>, PdsError> {
    let mut handlers: Vec<SharedHandler> = Vec::new();

    for script in &args.scripts {
        info!("  callback[{}]: script {}", handlers.len(), script.display());
        handlers.push(Arc::new(ScriptHook::new(script.clone())));
    }

    if args.bell_on_failed {
        let bell = FailedPodBell::new(args.player.clone(), args.sound.clone());
        // Check the audio setup before watching anything
        bell.ring(token).await.map_err(PdsError::Notify)?;
        info!(
            "  callback[{}]: bell on failed pods ({} {})",
            handlers.len(),
            args.player,
            args.sound.display()
        );
        handlers.push(Arc::new(bell));
    }

    Ok(handlers)
}
