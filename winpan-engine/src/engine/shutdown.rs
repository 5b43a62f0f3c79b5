//! Termination boundary of the event loop.

use tracing::info;

use super::error::EngineError;

/// Resolves on SIGINT, or SIGTERM on unix.
pub async fn shutdown_signal() -> Result<(), EngineError> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received SIGINT");
            }
            _ = terminate.recv() => info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl-C");
    }

    Ok(())
}
