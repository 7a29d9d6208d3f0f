//! Shutdown signal handling.
//!
//! On Unix, SIGINT, SIGTERM and SIGQUIT are handled, with
//! `tokio::signal::ctrl_c` as a fallback. Elsewhere only Ctrl-C is awaited.

use tracing::info;

/// Completes when the process receives a termination signal.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv() => info!("SIGINT detected."),
        _ = sigterm.recv() => info!("SIGTERM detected."),
        _ = sigquit.recv() => info!("SIGQUIT detected."),
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("Ctrl+C detected.");
        }
    }
    Ok(())
}

/// Completes when the process receives Ctrl-C.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Ctrl+C detected.");
    Ok(())
}
