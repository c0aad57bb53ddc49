//! Minimum-interval rate limiter for the remote API.

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Enforces a fixed minimum delay before every remote query.
///
/// There is exactly one request in flight at a time, so a single shared
/// timestamp of the last issued request is all the state needed.
pub struct RateLimiter {
    min_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a rate limiter with the given minimum delay between requests.
    pub fn new(min_delay_secs: f64) -> Self {
        Self {
            min_delay: Duration::from_secs_f64(min_delay_secs),
            last_request: Mutex::new(None),
        }
    }

    /// Wait until the minimum delay since the previous request has passed.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
