//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::BridgeError;

/// Wrap a future with a timeout, mapping expiry to [`BridgeError::Timeout`].
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, BridgeError>>,
) -> Result<T, BridgeError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(BridgeError::Timeout(duration.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expired_future_maps_to_timeout_error() {
        let result: Result<(), BridgeError> = with_timeout(Duration::from_millis(250), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(BridgeError::Timeout(250))));
    }

    #[tokio::test]
    async fn completed_future_passes_through() {
        let result = with_timeout(Duration::from_secs(1), async { Ok::<_, BridgeError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
