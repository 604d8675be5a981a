use crate::core::pacing::{Cancelled, Pacer};
use crate::utils::error::ApiError;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("{error} (after {attempts} attempt(s))")]
    Api {
        error: ApiError,
        attempts: u32,
        /// 最後一次送出請求的序號
        request_seq: u64,
    },

    #[error("cancelled")]
    Cancelled,
}

impl From<Cancelled> for CallError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// 固定間隔、次數有上限的重試
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// 執行 `operation` 直到成功、遇到不可重試的錯誤或次數用完。
    /// 每次嘗試都經過 pacer
    pub async fn run<T, F, Fut>(
        &self,
        pacer: &Pacer,
        label: &str,
        mut operation: F,
    ) -> Result<T, CallError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let request_seq = pacer.begin_request().await?;
            match pacer.guard(operation()).await? {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(
                        kind = error.kind(),
                        attempt,
                        max_attempts,
                        "🔁 {} failed: {}; retrying after {:?}",
                        label,
                        error,
                        self.delay
                    );
                    pacer.pause(self.delay).await?;
                }
                Err(error) => {
                    return Err(CallError::Api {
                        error,
                        attempts: attempt,
                        request_seq,
                    })
                }
            }
        }
    }
}
