//! Cancellable waits
//!
//! Every settle and poll delay in the engine goes through [`pause`], so a
//! stop request is honoured at the wait boundary instead of after it.

use crate::ExtractorError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleeps for `duration` unless `cancel` fires first
///
/// The token is checked before and after the wait.
pub async fn pause(cancel: &CancellationToken, duration: Duration) -> Result<(), ExtractorError> {
    ensure_active(cancel)?;

    if !duration.is_zero() {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }

    ensure_active(cancel)
}

/// Fails with `Cancelled` if a stop was requested
pub fn ensure_active(cancel: &CancellationToken) -> Result<(), ExtractorError> {
    if cancel.is_cancelled() {
        Err(ExtractorError::Cancelled)
    } else {
        Ok(())
    }
}
