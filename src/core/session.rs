use crate::core::dedup::Deduplicator;
use crate::core::normalizer::RecordNormalizer;
use crate::core::pacing::Pacer;
use crate::core::retry::{CallError, RetryPolicy};
use crate::domain::model::{
    IdentifiedRecord, PageState, PlaceSummary, ProgressEvent, RawDetail, SearchPage, SessionResult,
    TerminalReason,
};
use crate::domain::ports::{PlacesApi, ProgressObserver};
use crate::utils::error::{ApiError, HarvestError, Result};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::time::Duration;

/// `next_page_token` 發出後要等一小段時間才會生效
pub const DEFAULT_PAGE_TOKEN_DELAY: Duration = Duration::from_secs(2);
/// 同一查詢 text search 最多回傳 60 筆
pub const DEFAULT_RESULT_CEILING: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub retry: RetryPolicy,
    pub page_token_delay: Duration,
    pub result_ceiling: Option<usize>,
    pub detail_concurrency: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            page_token_delay: DEFAULT_PAGE_TOKEN_DELAY,
            result_ceiling: Some(DEFAULT_RESULT_CEILING),
            detail_concurrency: 1,
        }
    }
}

/// 單一 session 的上限，以及達到上限時回報的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimit {
    pub cap: Option<usize>,
    pub reason: TerminalReason,
}

impl SessionLimit {
    pub fn unbounded() -> Self {
        Self {
            cap: None,
            reason: TerminalReason::CapReached,
        }
    }

    pub fn per_location(cap: usize) -> Self {
        Self {
            cap: Some(cap),
            reason: TerminalReason::CapReached,
        }
    }

    pub fn request_budget(cap: usize) -> Self {
        Self {
            cap: Some(cap),
            reason: TerminalReason::RequestCapReached,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
    Fetching { token: Option<String> },
    AwaitingDelay { token: String },
    Done(TerminalReason),
    Failed { message: String },
}

/// session 從本次執行借用的共用元件
#[derive(Clone, Copy)]
pub struct SessionContext<'a> {
    pub api: &'a dyn PlacesApi,
    pub normalizer: &'a RecordNormalizer,
    pub dedup: &'a Deduplicator,
    pub pacer: &'a Pacer,
    pub observer: &'a dyn ProgressObserver,
    pub settings: &'a SessionSettings,
    /// 本次執行第一個請求的序號 (pacer 可能跨多次執行共用)
    pub first_request: u64,
}

/// 單一 (specialty, location) 的分頁流程
///
/// 透過 [`LocationSession::next_page`] 一次推進一頁。
/// 新的 session 一律從第一頁開始
pub struct LocationSession<'a> {
    ctx: SessionContext<'a>,
    query: String,
    tag: Option<String>,
    limit: SessionLimit,
    state: SessionState,
    page: PageState,
    results_seen: usize,
    pages_fetched: usize,
    records: Vec<IdentifiedRecord>,
}

impl<'a> LocationSession<'a> {
    pub fn new(
        ctx: SessionContext<'a>,
        query: impl Into<String>,
        location: &str,
        limit: SessionLimit,
        tag_location: bool,
    ) -> Self {
        Self {
            ctx,
            query: query.into(),
            tag: tag_location.then(|| location.to_string()),
            limit,
            state: SessionState::Fetching { token: None },
            page: PageState::new(location),
            results_seen: 0,
            pages_fetched: 0,
            records: Vec::new(),
        }
    }

    pub fn location(&self) -> &str {
        &self.page.location
    }

    pub fn page_state(&self) -> &PageState {
        &self.page
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            SessionState::Done(_) | SessionState::Failed { .. }
        )
    }

    /// 推進狀態機直到處理完一頁或 session 結束。
    /// 回傳該頁新增的紀錄，結束後回傳 `None`。
    ///
    /// 唯一會回傳的錯誤是本次執行第一個請求就被拒絕金鑰
    pub async fn next_page(&mut self) -> Result<Option<&[IdentifiedRecord]>> {
        loop {
            let placeholder = SessionState::Done(TerminalReason::NoMorePages);
            match std::mem::replace(&mut self.state, placeholder) {
                SessionState::Fetching { token } => {
                    if self.remaining() == Some(0) {
                        self.state = SessionState::Done(self.limit.reason);
                        continue;
                    }
                    let before = self.records.len();
                    let (next, fetched) = match self.fetch_page(token).await {
                        Ok(step) => step,
                        Err(err) => {
                            self.state = SessionState::Failed {
                                message: err.to_string(),
                            };
                            return Err(err);
                        }
                    };
                    self.state = next;
                    if fetched {
                        return Ok(Some(&self.records[before..]));
                    }
                }
                SessionState::AwaitingDelay { token } => {
                    let delay = self.ctx.settings.page_token_delay;
                    tracing::debug!(
                        "⏳ {}: waiting {:?} before requesting page {}",
                        self.page.location,
                        delay,
                        self.page.page_index + 1
                    );
                    self.state = match self.ctx.pacer.pause(delay).await {
                        Ok(()) => {
                            self.page.page_index += 1;
                            SessionState::Fetching { token: Some(token) }
                        }
                        Err(_) => SessionState::Done(TerminalReason::Cancelled),
                    };
                }
                finished @ (SessionState::Done(_) | SessionState::Failed { .. }) => {
                    self.state = finished;
                    return Ok(None);
                }
            }
        }
    }

    /// 一路分頁到結束
    pub async fn run(mut self) -> Result<SessionResult> {
        while self.next_page().await?.is_some() {}
        Ok(self.into_result())
    }

    pub fn into_result(self) -> SessionResult {
        let (terminal_reason, error) = match self.state {
            SessionState::Done(reason) => (reason, None),
            SessionState::Failed { message } => (TerminalReason::FatalError, Some(message)),
            // 分頁途中被放棄
            SessionState::Fetching { .. } | SessionState::AwaitingDelay { .. } => {
                (TerminalReason::Cancelled, None)
            }
        };
        SessionResult {
            location: self.page.location,
            records: self.records,
            terminal_reason,
            pages_fetched: self.pages_fetched,
            error,
        }
    }

    fn remaining(&self) -> Option<usize> {
        self.limit
            .cap
            .map(|cap| cap.saturating_sub(self.records.len()))
    }

    /// 抓取並處理一頁，flag 表示是否真的拿到一頁
    async fn fetch_page(&mut self, token: Option<String>) -> Result<(SessionState, bool)> {
        let api = self.ctx.api;
        let retry = self.ctx.settings.retry;
        let query = self.query.as_str();
        let outcome = retry
            .run(self.ctx.pacer, "text search", || api.search(query, token.as_deref()))
            .await;

        let page = match outcome {
            Ok(page) => page,
            Err(CallError::Cancelled) => {
                return Ok((SessionState::Done(TerminalReason::Cancelled), false))
            }
            Err(CallError::Api {
                error: ApiError::Unauthorized { message },
                request_seq,
                ..
            }) if request_seq == self.ctx.first_request => {
                return Err(HarvestError::CredentialRejected { message })
            }
            Err(err @ CallError::Api { .. }) => {
                tracing::error!(
                    "❌ {}: page {} failed, ending location with {} record(s): {}",
                    self.page.location,
                    self.page.page_index,
                    self.records.len(),
                    err
                );
                let failed = SessionState::Failed {
                    message: err.to_string(),
                };
                return Ok((failed, false));
            }
        };

        self.pages_fetched += 1;
        self.page.continuation_token = page.next_token.clone();
        let SearchPage {
            results,
            next_token,
        } = page;
        let returned = results.len();
        self.results_seen += returned;

        let cancelled = self.collect_records(results).await;
        self.page.records_so_far = self.records.len();

        tracing::info!(
            "📄 {}: page {} returned {} result(s), {} record(s) so far",
            self.page.location,
            self.page.page_index,
            returned,
            self.records.len()
        );
        self.ctx.observer.on_page(&ProgressEvent {
            location: self.page.location.clone(),
            page_index: self.page.page_index,
            records_so_far: self.records.len(),
        });

        Ok((self.after_page(cancelled, next_token), true))
    }

    fn after_page(&self, cancelled: bool, next_token: Option<String>) -> SessionState {
        if cancelled {
            return SessionState::Done(TerminalReason::Cancelled);
        }
        if self.remaining() == Some(0) {
            return SessionState::Done(self.limit.reason);
        }
        if let Some(ceiling) = self.ctx.settings.result_ceiling {
            if self.results_seen >= ceiling {
                tracing::debug!(
                    "{}: service ceiling of {} results reached",
                    self.page.location,
                    ceiling
                );
                return SessionState::Done(TerminalReason::CapReached);
            }
        }
        match next_token {
            Some(token) => SessionState::AwaitingDelay { token },
            None => SessionState::Done(TerminalReason::NoMorePages),
        }
    }

    /// 對一頁摘要查明細、正規化並去重，被取消時回傳 `true`
    async fn collect_records(&mut self, results: Vec<PlaceSummary>) -> bool {
        let mut on_page = HashSet::new();
        let candidates: Vec<PlaceSummary> = results
            .into_iter()
            .filter(|summary| {
                let fresh = !self.ctx.dedup.seen(&summary.place_id)
                    && on_page.insert(summary.place_id.clone());
                if !fresh {
                    tracing::debug!(
                        "{}: skipping already seen {}",
                        self.page.location,
                        summary.place_id
                    );
                }
                fresh
            })
            .collect();

        let concurrency = self.ctx.settings.detail_concurrency.max(1);
        let mut pending = candidates.into_iter();
        loop {
            let chunk_size = match self.remaining() {
                Some(0) => return false,
                Some(remaining) => remaining.min(concurrency),
                None => concurrency,
            };
            let chunk: Vec<PlaceSummary> = pending.by_ref().take(chunk_size).collect();
            if chunk.is_empty() {
                return false;
            }

            let fetched = self.fetch_details(chunk, concurrency).await;
            let mut cancelled = false;
            for (summary, outcome) in fetched {
                match outcome {
                    Ok(raw) => self.accept(summary, raw),
                    Err(CallError::Cancelled) => cancelled = true,
                    Err(err) => {
                        tracing::warn!(
                            "⚠️ {}: dropping {} after detail lookup failed: {}",
                            self.page.location,
                            summary.place_id,
                            err
                        );
                    }
                }
            }
            if cancelled {
                return true;
            }
        }
    }

    async fn fetch_details(
        &self,
        chunk: Vec<PlaceSummary>,
        concurrency: usize,
    ) -> Vec<(PlaceSummary, std::result::Result<RawDetail, CallError>)> {
        let api = self.ctx.api;
        let pacer = self.ctx.pacer;
        let retry = self.ctx.settings.retry;
        stream::iter(chunk)
            .map(move |summary| async move {
                let outcome = retry
                    .run(pacer, "place details", || api.detail(&summary))
                    .await;
                (summary, outcome)
            })
            .buffered(concurrency)
            .collect()
            .await
    }

    fn accept(&mut self, summary: PlaceSummary, raw: RawDetail) {
        if self.remaining() == Some(0) {
            return;
        }
        match self.ctx.normalizer.normalize(&raw, self.tag.as_deref()) {
            Ok(record) => {
                if self.ctx.dedup.mark(&summary.place_id) {
                    self.records.push(IdentifiedRecord {
                        place_id: summary.place_id,
                        record,
                    });
                } else {
                    tracing::debug!(
                        "{}: {} claimed elsewhere",
                        self.page.location,
                        summary.place_id
                    );
                }
            }
            Err(err) => {
                tracing::warn!(
                    "⚠️ {}: dropping {}: {}",
                    self.page.location,
                    summary.place_id,
                    err
                );
            }
        }
    }
}
