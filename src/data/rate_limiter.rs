use {
    crate::utils::{TimeUtils, now_unix},
    std::{sync::Arc, time::Duration},
    tokio::sync::Mutex,
};

/// Shared request-weight budget for one exchange, reset on each wall-clock minute.
///
/// Ingest and the training scheduler both fetch klines; cloning the limiter
/// shares the budget between them.
#[derive(Clone)]
pub struct GlobalRateLimiter {
    inner: Arc<Mutex<WeightWindow>>,
}

struct WeightWindow {
    used_weight: u32,
    // Minutes since epoch the weight is being counted for
    minute_idx: i64,
    limit: u32,
}

impl GlobalRateLimiter {
    pub fn new(limit: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(WeightWindow {
                used_weight: 0,
                minute_idx: Self::current_minute_idx(),
                limit,
            })),
        }
    }

    /// Waits until `cost` fits into the current minute's budget, then spends it.
    pub async fn acquire(&self, cost: u32, context: &str) {
        loop {
            let (wait, used, limit) = {
                let mut guard = self.inner.lock().await;
                let now_idx = Self::current_minute_idx();

                if now_idx > guard.minute_idx {
                    guard.used_weight = 0;
                    guard.minute_idx = now_idx;
                }

                // A single call larger than the whole budget would wait forever
                if guard.used_weight + cost <= guard.limit || guard.used_weight == 0 {
                    guard.used_weight += cost;
                    return;
                }

                let into_minute = now_unix().rem_euclid(TimeUtils::S_IN_MIN) as u64;
                let wait = Duration::from_secs(TimeUtils::S_IN_MIN as u64 - into_minute)
                    + Duration::from_millis(100);
                (wait, guard.used_weight, guard.limit)
            };

            log::warn!(
                "🛑 Rate limit saturated for [{}]. Used: {}/{}. Waiting {:.1}s (until :00)...",
                context,
                used,
                limit,
                wait.as_secs_f64()
            );

            tokio::time::sleep(wait).await;
        }
    }

    pub async fn used_weight(&self) -> u32 {
        self.inner.lock().await.used_weight
    }

    fn current_minute_idx() -> i64 {
        now_unix() / TimeUtils::S_IN_MIN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spends_weight_within_budget() {
        let limiter = GlobalRateLimiter::new(10);
        limiter.acquire(4, "test").await;
        let shared = limiter.clone();
        shared.acquire(4, "test").await;
        let used = limiter.used_weight().await;
        // The minute may roll over between calls
        assert!(used == 8 || used == 4, "used {}", used);
    }

    #[tokio::test]
    async fn oversized_cost_is_granted_on_an_empty_budget() {
        let limiter = GlobalRateLimiter::new(1);
        tokio::time::timeout(Duration::from_secs(1), limiter.acquire(5, "big"))
            .await
            .unwrap();
    }
}
