//! Lifetime-aware sleeping.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("lifetime ended")]
pub struct Cancelled;

/// Sleeps for `duration` unless `lifetime` ends first.
///
/// A zero duration returns `Ok` right away without looking at the lifetime,
/// so a loop whose first delay is zero always gets one attempt in.
pub async fn sleep(lifetime: &CancellationToken, duration: Duration) -> Result<(), Cancelled> {
    if duration.is_zero() {
        return Ok(());
    }

    tokio::select! {
        _ = lifetime.cancelled() => Err(Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
