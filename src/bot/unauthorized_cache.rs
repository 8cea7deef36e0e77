//! Cooldown for "not authorized" replies.
//!
//! With the default cooldown of zero every unauthorized message is answered. A positive
//! cooldown limits strangers to one rejection per window, and further attempts inside it
//! are dropped silently.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Remembers when each unauthorized user was last answered
#[derive(Clone)]
pub struct UnauthorizedCache {
    /// user id -> time of the last rejection reply
    last_reply: Cache<i64, Instant>,
    cooldown: Duration,
    silenced: Arc<AtomicU64>,
}

impl UnauthorizedCache {
    /// Creates a new `UnauthorizedCache`
    ///
    /// # Arguments
    ///
    /// * `cooldown_secs` - Seconds between rejection replies to the same user (0 disables)
    /// * `ttl_secs` - Time-to-live for cache entries
    /// * `max_capacity` - Maximum number of tracked users
    ///
    /// # Examples
    ///
    /// ```
    /// use reddit_media_relay::bot::UnauthorizedCache;
    ///
    /// let cache = UnauthorizedCache::new(
    ///     600,    // 10 minutes cooldown
    ///     7200,   // 2 hours TTL
    ///     10_000, // max 10k entries
    /// );
    /// assert_eq!(cache.cooldown().as_secs(), 600);
    /// ```
    #[must_use]
    pub fn new(cooldown_secs: u64, ttl_secs: u64, max_capacity: u64) -> Self {
        let last_reply = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self {
            last_reply,
            cooldown: Duration::from_secs(cooldown_secs),
            silenced: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether `user_id` should get a rejection reply now.
    ///
    /// Returns `true` on the first attempt, after the cooldown has passed, or always when
    /// the cooldown is zero. Silenced attempts are counted; every 100th is logged.
    ///
    /// # Arguments
    ///
    /// * `user_id` - Telegram user ID
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use reddit_media_relay::bot::UnauthorizedCache;
    /// # async fn example() {
    /// let cache = UnauthorizedCache::new(600, 7200, 10_000);
    /// if cache.should_send(12345).await {
    ///     // send the rejection, then start the cooldown
    ///     cache.mark_sent(12345).await;
    /// }
    /// # }
    /// ```
    pub async fn should_send(&self, user_id: i64) -> bool {
        match self.last_reply.get(&user_id).await {
            Some(at) if at.elapsed() < self.cooldown => {
                let count = self.silenced.fetch_add(1, Ordering::Relaxed) + 1;
                if count % 100 == 0 {
                    debug!(count, user_id, "Silenced unauthorized attempts");
                }
                false
            }
            _ => true,
        }
    }

    /// Start the cooldown for `user_id` after a reply went out
    pub async fn mark_sent(&self, user_id: i64) {
        self.last_reply.insert(user_id, Instant::now()).await;
    }

    /// Total silenced attempts since startup
    #[must_use]
    pub fn silenced_count(&self) -> u64 {
        self.silenced.load(Ordering::Relaxed)
    }

    /// Configured cooldown
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }
}
