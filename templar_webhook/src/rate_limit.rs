use std::collections::HashMap;

const WINDOW_MS: i64 = 60_000;

/// Fixed one-minute window request counter, keyed by sender.
#[derive(Debug, Default)]
pub struct RateLimiter {
    /// key -> (count, `window_start_ms`)
    requests: HashMap<String, (u32, i64)>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a request is allowed and record it. A limit of 0 disables limiting.
    pub fn check_and_record(&mut self, key: &str, limit: u32) -> bool {
        self.check_and_record_at(key, limit, chrono::Utc::now().timestamp_millis())
    }

    fn check_and_record_at(&mut self, key: &str, limit: u32, now: i64) -> bool {
        if limit == 0 {
            return true;
        }

        let entry = self.requests.entry(key.to_string()).or_insert((0, now));

        if now - entry.1 >= WINDOW_MS {
            entry.0 = 0;
            entry.1 = now;
        }

        if entry.0 >= limit {
            return false;
        }

        entry.0 += 1;
        true
    }

    /// Drop keys whose window ended more than one window ago.
    pub fn cleanup(&mut self) {
        self.cleanup_at(chrono::Utc::now().timestamp_millis());
    }

    fn cleanup_at(&mut self, now: i64) {
        self.requests
            .retain(|_, (_, window_start)| now - *window_start < WINDOW_MS * 2);
    }

    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.requests.len()
    }
}
