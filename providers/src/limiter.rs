//! Token-bucket rate limiter, one bucket per transport channel.
//!
//! `acquire` blocks until a token is available and never drops a request.
//! Refill is fractional so sub-1 req/s scrape budgets work, and the burst
//! size equals the bucket capacity.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct TokenBucket {
    capacity: f64,
    refill_per_second: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// `requests_per_second` may be fractional; `burst` is the bucket
    /// capacity and the number of requests that may pass without waiting
    /// from a full bucket.
    pub fn new(requests_per_second: f64, burst: u32) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            capacity,
            refill_per_second: requests_per_second.max(f64::MIN_POSITIVE),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens =
                    (state.tokens + elapsed * self.refill_per_second).min(self.capacity);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - state.tokens) / self.refill_per_second)
            };
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_passes_without_waiting() {
        let bucket = TokenBucket::new(2.0, 5);
        let start = Instant::now();
        for _ in 0..5 {
            bucket.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_rate_is_bounded_by_rps() {
        // 2 req/s with burst 2: 12 acquires need the 2-token burst plus
        // 10 refilled tokens, i.e. at least 5 seconds.
        let bucket = TokenBucket::new(2.0, 2);
        let start = Instant::now();
        for _ in 0..12 {
            bucket.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_secs(5));
        // And no slower than the refill rate dictates.
        assert!(start.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn fractional_rates_space_requests_out() {
        let bucket = TokenBucket::new(0.5, 1);
        bucket.acquire().await;
        let start = Instant::now();
        bucket.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn ten_second_window_respects_rate_plus_burst() {
        // Property: requests over any 10s window <= rps * 10 + burst.
        let bucket = TokenBucket::new(2.0, 3);
        let start = Instant::now();
        let mut admitted_in_window = 0u32;
        loop {
            bucket.acquire().await;
            if start.elapsed() > Duration::from_secs(10) {
                break;
            }
            admitted_in_window += 1;
        }
        assert!(admitted_in_window <= 2 * 10 + 3);
    }
}
