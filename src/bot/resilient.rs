//! Retry helper for short Telegram calls (status texts, deletions).
//!
//! Media uploads do not go through here: they follow the provider's own flood-control
//! pacing without an attempt limit in [`crate::media::upload`].

use crate::config::{
    TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tracing::{debug, warn};

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Transient failure: retry after the next backoff delay
    Backoff,
    /// The provider asked for this exact wait before the next attempt
    After(Duration),
    /// Permanent failure: return the error immediately
    GiveUp,
}

/// Retry a Telegram API operation, letting `classify` decide per error.
///
/// - Initial backoff: 500ms, doubling up to 4s, with jitter
/// - Max retries: 3 (rate-limit waits count as retries)
///
/// # Arguments
///
/// * `operation` - Produces a fresh future for every attempt
/// * `classify` - Maps an error to a [`RetryDecision`]
///
/// # Errors
///
/// Returns the error that ended the retries: a permanent one, or the last one once the
/// attempts are used up.
///
/// # Examples
///
/// ```no_run
/// use reddit_media_relay::bot::resilient::{retry_telegram_operation, RetryDecision};
///
/// # async fn example() -> Result<(), String> {
/// let value = retry_telegram_operation(
///     || async { Ok::<_, String>(42) },
///     |_| RetryDecision::Backoff,
/// )
/// .await?;
/// # assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
pub async fn retry_telegram_operation<F, Fut, T, E, C>(
    mut operation: F,
    classify: C,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryDecision,
    E: Display,
{
    let mut backoff = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let delay = match classify(&error) {
            RetryDecision::GiveUp => {
                debug!(error = %error, "Telegram API operation failed permanently");
                return Err(error);
            }
            RetryDecision::Backoff => backoff.next(),
            RetryDecision::After(wait) => backoff.next().map(|_| wait),
        };

        let Some(delay) = delay else {
            warn!(
                "Telegram API operation failed after {} retries: {}",
                TELEGRAM_API_MAX_RETRIES, error
            );
            return Err(error);
        };

        debug!(delay_ms = delay.as_millis(), error = %error, "Retrying Telegram API operation");
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_recovers_from_transient_failure() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result = retry_telegram_operation(
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("connection reset".to_string())
                } else {
                    Ok("sent")
                }
            },
            |_| RetryDecision::Backoff,
        )
        .await;

        assert_eq!(result, Ok("sent"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result: Result<(), String> = retry_telegram_operation(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            },
            |_| RetryDecision::Backoff,
        )
        .await;

        assert_eq!(result, Err("down".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), TELEGRAM_API_MAX_RETRIES + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let start = Instant::now();
        let result: Result<(), String> = retry_telegram_operation(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("message can't be deleted".to_string())
            },
            |_| RetryDecision::GiveUp,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_the_requested_retry_after() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let wait = Duration::from_secs(9);
        let start = Instant::now();
        let result = retry_telegram_operation(
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("flood".to_string())
                } else {
                    Ok(())
                }
            },
            |_| RetryDecision::After(wait),
        )
        .await;

        assert_eq!(result, Ok(()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= wait);
    }
}
