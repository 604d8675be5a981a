use crate::domain::ports::{Sleeper, TokioSleeper};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cancelled")]
pub struct Cancelled;

/// 對外請求之間的最小間隔，所有呼叫端共用
pub struct RateLimiter {
    min_interval: Duration,
    last_tick: AsyncMutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_tick: AsyncMutex::new(None),
        }
    }

    pub fn per_second(requests: u32) -> Self {
        let safe = requests.max(1) as u64;
        Self::new(Duration::from_millis((1000 + safe - 1) / safe))
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    async fn wait(&self, sleeper: &dyn Sleeper) {
        let mut guard = self.last_tick.lock().await;
        if let Some(prev) = *guard {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                sleeper.sleep(self.min_interval - elapsed).await;
            }
        }
        *guard = Some(Instant::now());
    }
}

/// 所有等待與對外請求都經過這裡，一個 cancellation token 就能全部停下。
/// token 取消後不會重置，之後用同一個 pacer 的執行都會立即結束
#[derive(Clone)]
pub struct Pacer {
    sleeper: Arc<dyn Sleeper>,
    cancel: CancellationToken,
    limiter: Option<Arc<RateLimiter>>,
    issued: Arc<AtomicU64>,
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(Arc::new(TokioSleeper), CancellationToken::new())
    }
}

impl Pacer {
    pub fn new(sleeper: Arc<dyn Sleeper>, cancel: CancellationToken) -> Self {
        Self {
            sleeper,
            cancel,
            limiter: None,
            issued: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(Arc::new(limiter));
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 這個 pacer 至今送出的請求數 (跨多次執行累計)
    pub fn requests_issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    pub async fn pause(&self, duration: Duration) -> Result<(), Cancelled> {
        if duration.is_zero() {
            return self.check();
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Cancelled),
            _ = self.sleeper.sleep(duration) => Ok(()),
        }
    }

    /// 等待 rate limiter，回傳即將送出請求的序號 (從 1 開始)
    pub async fn begin_request(&self) -> Result<u64, Cancelled> {
        self.check()?;
        if let Some(limiter) = &self.limiter {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Cancelled),
                _ = limiter.wait(self.sleeper.as_ref()) => {}
            }
        }
        Ok(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// 讓 `fut` 與取消訊號競速
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Cancelled> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Cancelled),
            output = fut => Ok(output),
        }
    }

    fn check(&self) -> Result<(), Cancelled> {
        if self.cancel.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}
