//! Context-aware retry wrapper for transient transport errors.
//!
//! `reqwest-retry`'s [`RetryTransientMiddleware`](reqwest_retry::RetryTransientMiddleware),
//! applied to [`crate::remote::RemoteClient`]'s raw HTTP client, already
//! retries at the transport layer, but it has no notion of this crate's
//! [`CancellationToken`] — a sibling failure in a bounded work group must
//! still cut a retry loop short before its next backoff. This helper sits
//! one layer up, around whole orchestrator operations (one blob push/pull,
//! one manifest push), re-checking cancellation before every attempt and
//! retrying only [`ModctlError::Transport`] failures.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{ModctlError, ModctlResult};

/// Retries `operation` up to [`modctl_utils::defaults::DEFAULT_RETRY_ATTEMPTS`]
/// times with exponential backoff (initial
/// [`modctl_utils::defaults::DEFAULT_RETRY_INITIAL_DELAY_MS`], capped at
/// [`modctl_utils::defaults::DEFAULT_RETRY_MAX_DELAY_MS`]), but only for
/// [`ModctlError::Transport`] errors — any other error kind is returned
/// immediately on its first occurrence. Checks `cancel` before every
/// attempt and while sleeping between attempts.
pub async fn with_retry<T, F, Fut>(cancel: &CancellationToken, mut operation: F) -> ModctlResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ModctlResult<T>>,
{
    let attempts = modctl_utils::defaults::DEFAULT_RETRY_ATTEMPTS;
    let mut delay_ms = modctl_utils::defaults::DEFAULT_RETRY_INITIAL_DELAY_MS;
    let max_delay_ms = modctl_utils::defaults::DEFAULT_RETRY_MAX_DELAY_MS;

    for attempt in 1..=attempts {
        if cancel.is_cancelled() {
            return Err(ModctlError::Canceled);
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(ModctlError::Transport(message)) if attempt < attempts => {
                tracing::debug!(attempt, message, "retrying after transient transport error");
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
                    _ = cancel.cancelled() => return Err(ModctlError::Canceled),
                }
                delay_ms = (delay_ms * 2).min(max_delay_ms);
            }
            Err(err) => return Err(err),
        }
    }

    unreachable!("loop always returns by its last iteration")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_works() {
        let calls = AtomicUsize::new(0);
        let result = with_retry(&CancellationToken::new(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ModctlError>(42) }
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transport_errors_until_success() {
        let calls = AtomicUsize::new(0);
        let result = with_retry(&CancellationToken::new(), || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt < 2 {
                    Err(ModctlError::Transport("flaky".to_string()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 2);
    }

    #[tokio::test]
    async fn never_retries_non_transport_errors() {
        let calls = AtomicUsize::new(0);
        let result: ModctlResult<()> = with_retry(&CancellationToken::new(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ModctlError::NoLayersMatched) }
        })
        .await;

        assert!(matches!(result, Err(ModctlError::NoLayersMatched)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stops_retrying_once_canceled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: ModctlResult<()> = with_retry(&cancel, || async { Err(ModctlError::Transport("down".to_string())) }).await;
        assert!(matches!(result, Err(ModctlError::Canceled)));
    }
}
