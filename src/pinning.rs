//! Foreground pinning controller
//!
//! Wraps the host's exclusive-foreground capability. Every host call here
//! (request, release, and status poll) is bounded by the same timeout, so a
//! stalled platform call degrades to fallback instead of blocking the
//! dispatch thread.

use crate::error::{KioskError, Result};
use crate::host::KioskHost;
use crate::types::now_millis;
use std::sync::Arc;
use std::time::Duration;

/// Proof that pinning was granted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pinned {
    /// Unix timestamp in milliseconds when pinning was confirmed
    pub since: u64,
}

/// Requests and releases exclusive-foreground status
pub struct PinningController {
    host: Arc<dyn KioskHost>,
    timeout: Duration,
}

impl PinningController {
    pub fn new(host: Arc<dyn KioskHost>, timeout: Duration) -> Self {
        Self { host, timeout }
    }

    /// Ask the host for exclusive-foreground status
    ///
    /// Already pinned is a no-op success. Every failure, including a
    /// timeout, is returned as a non-fatal error.
    pub async fn request_pinning(&self) -> Result<Pinned> {
        if matches!(self.query_pinned().await, Ok(true)) {
            tracing::debug!("Pinning already active");
            return Ok(Pinned { since: now_millis() });
        }

        match tokio::time::timeout(self.timeout, self.host.start_pinning()).await {
            Ok(Ok(())) => {
                tracing::info!(host = self.host.name(), "Pinning started");
                Ok(Pinned { since: now_millis() })
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Pinning request failed");
                Err(match e {
                    KioskError::PinningUnavailable(_) => e,
                    other => KioskError::PinningUnavailable(other.to_string()),
                })
            }
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout_ms(), "Pinning request timed out");
                Err(KioskError::Timeout(format!(
                    "pinning request exceeded {}ms",
                    self.timeout_ms()
                )))
            }
        }
    }

    /// Leave exclusive-foreground status; errors are logged, never returned
    ///
    /// The host is skipped only when it confirms pinning is inactive. An
    /// unanswered status query still attempts the release.
    pub async fn release_pinning(&self) {
        match self.query_pinned().await {
            Ok(false) => return,
            Ok(true) => {}
            Err(e) => tracing::debug!(error = %e, "Pinning status unknown, releasing anyway"),
        }

        match tokio::time::timeout(self.timeout, self.host.stop_pinning()).await {
            Ok(Ok(())) => tracing::info!("Pinning stopped"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to stop pinning"),
            Err(_) => tracing::warn!(
                timeout_ms = self.timeout_ms(),
                "Pinning release timed out"
            ),
        }
    }

    /// Poll the host; a failing or stalled status query counts as not pinned
    pub async fn is_pinned(&self) -> bool {
        match self.query_pinned().await {
            Ok(pinned) => pinned,
            Err(e) => {
                tracing::warn!(error = %e, "Pinning status query failed");
                false
            }
        }
    }

    async fn query_pinned(&self) -> Result<bool> {
        match tokio::time::timeout(self.timeout, self.host.is_pinned()).await {
            Ok(result) => result,
            Err(_) => Err(KioskError::Timeout(format!(
                "pinning status query exceeded {}ms",
                self.timeout_ms()
            ))),
        }
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::{MemoryHost, MemoryHostConfig};

    fn controller(host: &Arc<MemoryHost>) -> PinningController {
        PinningController::new(host.clone(), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_request_pinning_success() {
        let host = Arc::new(MemoryHost::default());
        let pinning = controller(&host);

        let pinned = pinning.request_pinning().await.unwrap();
        assert!(pinned.since > 0);
        assert!(pinning.is_pinned().await);
    }

    #[tokio::test]
    async fn test_request_pinning_is_idempotent() {
        let host = Arc::new(MemoryHost::default());
        let pinning = controller(&host);

        pinning.request_pinning().await.unwrap();
        pinning.request_pinning().await.unwrap();
        assert_eq!(host.pin_requests(), 1);
    }

    #[tokio::test]
    async fn test_request_pinning_unavailable() {
        let host = Arc::new(MemoryHost::without_pinning());
        let pinning = controller(&host);

        let err = pinning.request_pinning().await.unwrap_err();
        assert!(matches!(err, KioskError::PinningUnavailable(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_request_pinning_timeout() {
        let host = Arc::new(MemoryHost::new(MemoryHostConfig {
            pinning_delay: Some(Duration::from_secs(5)),
            ..Default::default()
        }));
        let pinning = PinningController::new(host.clone(), Duration::from_millis(20));

        let err = pinning.request_pinning().await.unwrap_err();
        assert!(matches!(err, KioskError::Timeout(_)));
        assert!(!host.pinned());
    }

    #[tokio::test]
    async fn test_release_pinning() {
        let host = Arc::new(MemoryHost::default());
        let pinning = controller(&host);

        pinning.request_pinning().await.unwrap();
        pinning.release_pinning().await;
        assert!(!host.pinned());

        // Releasing when not pinned is silent
        pinning.release_pinning().await;
    }

    #[tokio::test]
    async fn test_stalled_status_query_is_bounded() {
        let host = Arc::new(MemoryHost::new(MemoryHostConfig {
            status_delay: Some(Duration::from_secs(30)),
            ..Default::default()
        }));
        let pinning = PinningController::new(host.clone(), Duration::from_millis(20));

        let checked = tokio::time::timeout(Duration::from_secs(1), pinning.is_pinned()).await;
        assert!(!checked.unwrap());

        // A stalled poll does not stop the request itself
        let requested = tokio::time::timeout(Duration::from_secs(1), pinning.request_pinning()).await;
        assert!(requested.unwrap().is_ok());
        assert!(host.pinned());
    }

    #[tokio::test]
    async fn test_release_with_failing_status_still_unpins() {
        let host = Arc::new(MemoryHost::default());
        let pinning = controller(&host);
        pinning.request_pinning().await.unwrap();

        host.set_fail_status(true);
        assert!(!pinning.is_pinned().await);
        pinning.release_pinning().await;
        assert!(!host.pinned());
    }

    #[tokio::test]
    async fn test_release_with_stalled_status_still_unpins() {
        let host = Arc::new(MemoryHost::default());
        let pinning = PinningController::new(host.clone(), Duration::from_millis(20));
        pinning.request_pinning().await.unwrap();

        host.set_status_delay(Some(Duration::from_secs(30)));
        tokio::time::timeout(Duration::from_secs(1), pinning.release_pinning())
            .await
            .unwrap();
        assert!(!host.pinned());
    }
}
