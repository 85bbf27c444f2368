//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap instance calls (forward, probe) with a deadline
//! - Map expiry to the caller's error variant
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - The inner future is dropped on expiry, closing its connection

use std::future::Future;
use std::time::Duration;

use crate::error::{FleetError, FleetResult};

/// Run `fut` for at most `limit`, turning expiry into `on_timeout()`.
pub async fn bounded<F, T>(
    limit: Duration,
    fut: F,
    on_timeout: impl FnOnce() -> FleetError,
) -> FleetResult<T>
where
    F: Future<Output = FleetResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_limit() {
        let result = bounded(Duration::from_secs(1), async { Ok(7) }, || FleetError::Unavailable).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_expiry_maps_error() {
        let result: FleetResult<()> = bounded(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
            || FleetError::MetricsUnavailable("slow".into()),
        )
        .await;
        assert_eq!(result, Err(FleetError::MetricsUnavailable("slow".into())));
    }
}
