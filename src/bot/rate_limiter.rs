use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Clone, Debug)]
pub struct RateLimiterConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct WindowCounter {
    count: u32,
    window_start: Instant,
}

/// Fixed-window request counter per operator identity. Denial is a normal
/// outcome the caller turns into a "try later" reply, not an error.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    counters: Mutex<HashMap<String, WindowCounter>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub async fn allow(&self, identity: &str) -> bool {
        let now = Instant::now();
        let mut counters = self.counters.lock().await;
        let counter = counters
            .entry(identity.to_string())
            .or_insert(WindowCounter {
                count: 0,
                window_start: now,
            });

        if now.duration_since(counter.window_start) >= self.config.window {
            counter.count = 0;
            counter.window_start = now;
        }

        if counter.count >= self.config.max_requests {
            return false;
        }
        counter.count += 1;
        true
    }
}
