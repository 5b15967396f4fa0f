use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

/// Pads successful work so the observable session duration, measured from
/// `session_start`, never drops below `min_dwell`. Failed work returns
/// immediately with no padding.
pub async fn enforce_minimum<T, E, F>(
    session_start: Instant,
    min_dwell: Duration,
    work: F,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let out = work.await?;

    let elapsed = session_start.elapsed();
    if elapsed < min_dwell {
        let remaining = min_dwell - elapsed;
        debug!(remaining_ms = remaining.as_millis() as u64, "padding dwell time");
        sleep(remaining).await;
    }

    Ok(out)
}
