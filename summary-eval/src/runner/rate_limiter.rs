//! Sliding-window request limiter for hosted APIs

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

/// Limits requests per minute using a one-minute sliding window
pub struct RateLimiter {
    requests_per_minute: u32,
    last_requests: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute: requests_per_minute.max(1),
            last_requests: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait until a request slot is free, then claim it
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut last = self.last_requests.lock().await;
                let now = Instant::now();
                prune(&mut last, now);

                if last.len() < self.requests_per_minute as usize {
                    last.push_back(now);
                    return;
                }

                match last.front() {
                    Some(&oldest) => WINDOW.saturating_sub(now.duration_since(oldest))
                        + Duration::from_millis(10),
                    None => Duration::from_millis(10),
                }
            };

            tracing::debug!("Request limit reached, waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Requests made within the last minute
    pub async fn in_window(&self) -> usize {
        let mut last = self.last_requests.lock().await;
        prune(&mut last, Instant::now());
        last.len()
    }
}

fn prune(requests: &mut VecDeque<Instant>, now: Instant) {
    while let Some(&front) = requests.front() {
        if now.duration_since(front) > WINDOW {
            requests.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_basic() {
        let limiter = RateLimiter::new(5);

        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert_eq!(limiter.in_window().await, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_waits_for_window() {
        let limiter = RateLimiter::new(1);
        limiter.acquire().await;

        let started = tokio::time::Instant::now();
        limiter.acquire().await;
        assert!(started.elapsed() >= Duration::from_secs(59));
    }
}
