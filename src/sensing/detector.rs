use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DetectorError;
use crate::models::{DetectionResult, SourceKind, WindowContext};

/// One signal source behind a uniform contract.
///
/// "Nothing found" is `Ok(DetectionResult::no_content(..))`; `Err` is reserved
/// for missing permissions and failed extraction. Implementations may keep a
/// private cache but must not share mutable state with other detectors.
#[async_trait]
pub trait Detector: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn detect(&self, context: &WindowContext) -> Result<DetectionResult, DetectorError>;

    /// Drop private caches. Called when the engine starts.
    async fn reset(&self) {}
}

/// Await `fut` for at most `budget`, mapping expiry to [`DetectorError::Timeout`].
pub async fn with_timeout<T, F>(budget: Duration, fut: F) -> Result<T, DetectorError>
where
    F: Future<Output = Result<T, DetectorError>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => Err(DetectorError::Timeout(budget.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_passes_through() {
        let value = with_timeout(Duration::from_secs(1), async { Ok::<_, DetectorError>(7) }).await;
        assert_eq!(value, Ok(7));

        let err = with_timeout(Duration::from_secs(1), async {
            Err::<u8, _>(DetectorError::transient("boom"))
        })
        .await;
        assert_eq!(err, Err(DetectorError::transient("boom")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_expires() {
        let result = with_timeout(Duration::from_millis(300), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, DetectorError>(())
        })
        .await;
        assert_eq!(result, Err(DetectorError::Timeout(300)));
    }
}
