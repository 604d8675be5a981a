#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use provider_harvest::core::orchestrator::SearchSettings;
use provider_harvest::core::pacing::Pacer;
use provider_harvest::core::retry::RetryPolicy;
use provider_harvest::core::session::SessionSettings;
use provider_harvest::domain::model::{
    PlaceSummary, ProgressEvent, RawDetail, SearchPage, SearchSummary, SessionResult,
};
use provider_harvest::domain::ports::{PlacesApi, ProgressObserver, Sleeper};
use provider_harvest::ApiError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const PAGE_DELAY: Duration = Duration::from_millis(2000);
pub const LOCATION_DELAY: Duration = Duration::from_millis(1000);
pub const RETRY_DELAY: Duration = Duration::from_millis(500);
pub const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Search { query: String, token: Option<String> },
    Detail(String),
    Sleep(Duration),
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

/// 把每次 sleep 記到共用 log，立即返回
pub struct RecordingSleeper {
    log: EventLog,
}

impl RecordingSleeper {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.log.lock().push(Event::Sleep(duration));
    }
}

struct Failure {
    error: ApiError,
    remaining: usize,
}

/// 依查詢腳本回傳分頁的記憶體內 places 服務
pub struct ScriptedPlaces {
    pages: HashMap<String, Vec<Vec<String>>>,
    details: HashMap<String, RawDetail>,
    search_failures: Mutex<HashMap<(String, usize), Failure>>,
    detail_failures: Mutex<HashMap<String, Failure>>,
    cancel_on: Option<(String, usize, CancellationToken)>,
    log: EventLog,
}

pub fn query(specialty: &str, location: &str) -> String {
    format!("{} in {}", specialty, location)
}

pub fn detail_named(name: &str) -> RawDetail {
    RawDetail {
        name: Some(name.to_string()),
        formatted_address: Some(format!("{} Road", name)),
        formatted_phone_number: Some("(020) 1234-5678".to_string()),
        types: vec!["doctor".to_string(), "health".to_string()],
        rating: Some(4.2),
        user_ratings_total: Some(10),
        ..RawDetail::default()
    }
}

impl ScriptedPlaces {
    pub fn new(log: EventLog) -> Self {
        Self {
            pages: HashMap::new(),
            details: HashMap::new(),
            search_failures: Mutex::new(HashMap::new()),
            detail_failures: Mutex::new(HashMap::new()),
            cancel_on: None,
            log,
        }
    }

    /// 設定某查詢的分頁 place id，每個 id 自動配一筆預設明細
    pub fn with_pages(mut self, query: &str, pages: &[&[&str]]) -> Self {
        let pages: Vec<Vec<String>> = pages
            .iter()
            .map(|page| page.iter().map(|id| id.to_string()).collect())
            .collect();
        for id in pages.iter().flatten() {
            self.details
                .entry(id.clone())
                .or_insert_with(|| detail_named(&format!("Clinic {}", id)));
        }
        self.pages.insert(query.to_string(), pages);
        self
    }

    pub fn with_detail(mut self, id: &str, detail: RawDetail) -> Self {
        self.details.insert(id.to_string(), detail);
        self
    }

    /// `page` 從 0 開始，`times` 為 `usize::MAX` 時永遠失敗
    pub fn failing_search(self, query: &str, page: usize, error: ApiError, times: usize) -> Self {
        self.search_failures.lock().insert(
            (query.to_string(), page),
            Failure {
                error,
                remaining: times,
            },
        );
        self
    }

    pub fn failing_detail(self, id: &str, error: ApiError, times: usize) -> Self {
        self.detail_failures.lock().insert(
            id.to_string(),
            Failure {
                error,
                remaining: times,
            },
        );
        self
    }

    /// 請求到 `query` 的指定頁時取消 `token`
    pub fn cancelling_on(mut self, query: &str, page: usize, token: CancellationToken) -> Self {
        self.cancel_on = Some((query.to_string(), page, token));
        self
    }

    fn take_failure(failures: &mut Failure) -> Option<ApiError> {
        if failures.remaining == 0 {
            return None;
        }
        if failures.remaining != usize::MAX {
            failures.remaining -= 1;
        }
        Some(failures.error.clone())
    }
}

#[async_trait]
impl PlacesApi for ScriptedPlaces {
    async fn search(
        &self,
        query: &str,
        continuation_token: Option<&str>,
    ) -> Result<SearchPage, ApiError> {
        self.log.lock().push(Event::Search {
            query: query.to_string(),
            token: continuation_token.map(str::to_string),
        });

        let index = continuation_token
            .and_then(|token| token.rsplit('#').next())
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);

        if let Some((cancel_query, cancel_page, token)) = &self.cancel_on {
            if cancel_query == query && *cancel_page == index {
                token.cancel();
            }
        }

        if let Some(failure) = self
            .search_failures
            .lock()
            .get_mut(&(query.to_string(), index))
        {
            if let Some(error) = Self::take_failure(failure) {
                return Err(error);
            }
        }

        let Some(pages) = self.pages.get(query) else {
            return Ok(SearchPage::default());
        };
        let results = pages
            .get(index)
            .map(|ids| ids.iter().map(PlaceSummary::new).collect())
            .unwrap_or_default();
        let next_token = (index + 1 < pages.len()).then(|| format!("{}#{}", query, index + 1));
        Ok(SearchPage {
            results,
            next_token,
        })
    }

    async fn detail(&self, place: &PlaceSummary) -> Result<RawDetail, ApiError> {
        self.log.lock().push(Event::Detail(place.place_id.clone()));

        if let Some(failure) = self.detail_failures.lock().get_mut(&place.place_id) {
            if let Some(error) = Self::take_failure(failure) {
                return Err(error);
            }
        }
        self.details
            .get(&place.place_id)
            .cloned()
            .ok_or_else(|| ApiError::invalid_request(format!("NOT_FOUND {}", place.place_id)))
    }
}

#[derive(Default)]
pub struct CollectingObserver {
    pub pages: Mutex<Vec<ProgressEvent>>,
    pub locations: Mutex<Vec<String>>,
    pub runs: Mutex<Vec<SearchSummary>>,
}

impl ProgressObserver for CollectingObserver {
    fn on_page(&self, event: &ProgressEvent) {
        self.pages.lock().push(event.clone());
    }

    fn on_location_complete(&self, result: &SessionResult) {
        self.locations.lock().push(result.location.clone());
    }

    fn on_run_complete(&self, summary: &SearchSummary) {
        self.runs.lock().push(summary.clone());
    }
}

pub fn test_settings() -> SearchSettings {
    SearchSettings {
        session: SessionSettings {
            retry: RetryPolicy::new(MAX_ATTEMPTS, RETRY_DELAY),
            page_token_delay: PAGE_DELAY,
            result_ceiling: Some(60),
            detail_concurrency: 1,
        },
        location_delay: LOCATION_DELAY,
    }
}

pub fn pacer(log: &EventLog, cancel: CancellationToken) -> Pacer {
    Pacer::new(Arc::new(RecordingSleeper::new(log.clone())), cancel)
}

pub fn new_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn searches(log: &EventLog) -> Vec<(String, Option<String>)> {
    log.lock()
        .iter()
        .filter_map(|event| match event {
            Event::Search { query, token } => Some((query.clone(), token.clone())),
            _ => None,
        })
        .collect()
}

pub fn detail_calls(log: &EventLog, id: &str) -> usize {
    log.lock()
        .iter()
        .filter(|event| matches!(event, Event::Detail(d) if d == id))
        .count()
}
