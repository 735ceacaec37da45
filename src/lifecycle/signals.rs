//! OS signal handling.
//!
//! # Responsibilities
//! - Translate Ctrl-C into the internal shutdown broadcast
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Returns once the signal fired or shutdown was triggered elsewhere

use crate::lifecycle::Shutdown;

/// Wait for Ctrl-C, then trigger `shutdown`.
pub async fn shutdown_on_ctrl_c(shutdown: Shutdown) {
    let mut already = shutdown.subscribe();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => {
                    tracing::info!("Ctrl-C received");
                    shutdown.trigger();
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                    let _ = already.recv().await;
                }
            }
        }
        _ = already.recv() => {}
    }
}
