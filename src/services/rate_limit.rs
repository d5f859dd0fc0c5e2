// src/services/rate_limit.rs

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::config::{FINGERPRINT_RATE_LIMIT, FINGERPRINT_RATE_WINDOW, RATE_LIMITER_PRUNE_THRESHOLD};

/// Sliding-window limiter keyed by fingerprint hash.
///
/// Kept in memory only; a restart forgets every window.
#[derive(Clone)]
pub struct FingerprintRateLimiter {
    windows: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    max_requests: usize,
    window: Duration,
    prune_threshold: usize,
}

impl FingerprintRateLimiter {
    pub fn new(max_requests: usize, window: Duration, prune_threshold: usize) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window,
            prune_threshold,
        }
    }

    /// Records a request at `now` and returns whether it is allowed.
    /// Rejected requests are not recorded.
    pub async fn check_at(&self, fingerprint: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock().await;

        if windows.len() > self.prune_threshold {
            let window = self.window;
            windows.retain(|_, hits| {
                hits.back()
                    .is_some_and(|last| now.saturating_duration_since(*last) < window)
            });
        }

        let hits = windows.entry(fingerprint.to_string()).or_default();
        while hits
            .front()
            .is_some_and(|first| now.saturating_duration_since(*first) >= self.window)
        {
            hits.pop_front();
        }

        if hits.len() >= self.max_requests {
            return false;
        }
        hits.push_back(now);
        true
    }

    pub async fn check(&self, fingerprint: &str) -> bool {
        self.check_at(fingerprint, Instant::now()).await
    }

    pub async fn tracked(&self) -> usize {
        self.windows.lock().await.len()
    }
}

impl Default for FingerprintRateLimiter {
    fn default() -> Self {
        Self::new(
            FINGERPRINT_RATE_LIMIT,
            FINGERPRINT_RATE_WINDOW,
            RATE_LIMITER_PRUNE_THRESHOLD,
        )
    }
}
