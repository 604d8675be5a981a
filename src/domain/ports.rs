use crate::domain::model::{
    PlaceSummary, ProgressEvent, RawDetail, SearchPage, SearchSummary, SessionResult,
};
use crate::utils::error::{ApiError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// 遠端地點搜尋服務，每次呼叫就是一個對外請求
#[async_trait]
pub trait PlacesApi: Send + Sync {
    async fn search(
        &self,
        query: &str,
        continuation_token: Option<&str>,
    ) -> std::result::Result<SearchPage, ApiError>;

    async fn detail(&self, place: &PlaceSummary) -> std::result::Result<RawDetail, ApiError>;
}

/// 可注入的 sleep，測試時可以記錄延遲而不真的等待
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 純通知用的 hook，預設不做任何事
pub trait ProgressObserver: Send + Sync {
    fn on_page(&self, _event: &ProgressEvent) {}

    fn on_location_complete(&self, _result: &SessionResult) {}

    fn on_run_complete(&self, _summary: &SearchSummary) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 執行結束後接收彙整的紀錄與摘要，回傳輸出位置
#[async_trait]
pub trait OutputSink: Send + Sync {
    async fn write(&self, outcome: &crate::domain::model::SearchOutcome) -> Result<String>;
}
