use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Serializes upstream requests: at most one in flight across all providers,
/// and consecutive requests to the same provider start at least its
/// `min_spacing` apart.
#[derive(Default)]
pub struct RateLimiter {
    /// Start time of the last request per provider. Held for the whole
    /// request, which is what limits concurrency to one.
    last_start: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `request` once the limiter admits it.
    pub async fn run<F, T>(&self, provider: &str, min_spacing: Duration, request: F) -> T
    where
        F: Future<Output = T>,
    {
        let mut last_start = self.last_start.lock().await;

        if let Some(&prev) = last_start.get(provider) {
            let ready_at = prev + min_spacing;
            if ready_at > Instant::now() {
                debug!(provider, wait_ms = (ready_at - Instant::now()).as_millis() as u64, "Rate limiter spacing");
                sleep_until(ready_at).await;
            }
        }

        last_start.insert(provider.to_string(), Instant::now());
        request.await
    }
}
