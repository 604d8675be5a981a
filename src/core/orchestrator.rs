use crate::core::dedup::Deduplicator;
use crate::core::normalizer::RecordNormalizer;
use crate::core::pacing::Pacer;
use crate::core::session::{LocationSession, SessionContext, SessionLimit, SessionSettings};
use crate::domain::model::{
    FieldPresence, LocationReport, LocationStatus, ProviderRecord, SearchOutcome, SearchRequest,
    SearchSummary, SessionResult, TerminalReason,
};
use crate::domain::ports::{NoopObserver, PlacesApi, ProgressObserver};
use crate::utils::error::Result;
use std::sync::Arc;
use std::time::Duration;

/// 兩個地點之間的間隔
pub const DEFAULT_LOCATION_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    pub session: SessionSettings,
    pub location_delay: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            session: SessionSettings::default(),
            location_delay: DEFAULT_LOCATION_DELAY,
        }
    }
}

/// 依序執行每個地點並彙整結果
pub struct SearchOrchestrator<A: PlacesApi> {
    api: A,
    pacer: Pacer,
    normalizer: RecordNormalizer,
    observer: Arc<dyn ProgressObserver>,
    settings: SearchSettings,
}

impl<A: PlacesApi> SearchOrchestrator<A> {
    pub fn new(api: A, settings: SearchSettings) -> Self {
        Self {
            api,
            pacer: Pacer::default(),
            normalizer: RecordNormalizer::default(),
            observer: Arc::new(NoopObserver),
            settings,
        }
    }

    /// pacer 的取消狀態不會重置，
    /// 取消過的 pacer 會讓之後每次 `run` 立即結束，
    /// 需要重新執行時請換一個新的 pacer
    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_normalizer(mut self, normalizer: RecordNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    /// 執行整個請求。
    /// 除非本次執行的第一個請求就被拒絕金鑰，否則一定產出摘要
    pub async fn run(&self, request: &SearchRequest) -> Result<SearchOutcome> {
        let dedup = Deduplicator::new();
        let first_request = self.pacer.requests_issued() + 1;
        let ctx = SessionContext {
            api: &self.api,
            normalizer: &self.normalizer,
            dedup: &dedup,
            pacer: &self.pacer,
            observer: self.observer.as_ref(),
            settings: &self.settings.session,
            first_request,
        };

        tracing::info!(
            "🚀 Searching '{}' across {} location(s)",
            request.specialty,
            request.locations.len()
        );

        let mut aggregate = Aggregate::default();
        let mut locations = request.locations.iter().enumerate();
        for (index, location) in locations.by_ref() {
            if self.pacer.is_cancelled() {
                aggregate.not_attempted(location);
                break;
            }
            let Some(limit) = self.limit_for(request, aggregate.records.len()) else {
                tracing::info!("🛑 Global cap reached, skipping '{}'", location);
                aggregate.not_attempted(location);
                continue;
            };
            if index > 0 && self.pacer.pause(self.settings.location_delay).await.is_err() {
                aggregate.not_attempted(location);
                break;
            }

            let session = LocationSession::new(
                ctx,
                request.query_for(location),
                location,
                limit,
                request.tag_location,
            );
            let result = session.run().await?;
            self.observer.on_location_complete(&result);
            aggregate.absorb(result);
        }
        // 剩下的地點因為已取消而未開始
        for (_, location) in locations {
            aggregate.not_attempted(location);
        }

        let outcome = aggregate.finish(self.pacer.is_cancelled());
        tracing::info!(
            "✅ Search finished: {} record(s), {} errored location(s)",
            outcome.summary.total_records,
            outcome.summary.errored_locations().len()
        );
        self.observer.on_run_complete(&outcome.summary);
        Ok(outcome)
    }

    /// 全域上限用完時回傳 `None`
    fn limit_for(&self, request: &SearchRequest, collected: usize) -> Option<SessionLimit> {
        let budget = request
            .global_cap
            .map(|cap| cap.saturating_sub(collected));
        match (request.per_location_cap, budget) {
            (_, Some(0)) => None,
            (Some(per_location), Some(budget)) if budget < per_location => {
                Some(SessionLimit::request_budget(budget))
            }
            (Some(per_location), _) => Some(SessionLimit::per_location(per_location)),
            (None, Some(budget)) => Some(SessionLimit::request_budget(budget)),
            (None, None) => Some(SessionLimit::unbounded()),
        }
    }
}

#[derive(Default)]
struct Aggregate {
    records: Vec<ProviderRecord>,
    reports: Vec<LocationReport>,
    presence: FieldPresence,
}

impl Aggregate {
    fn absorb(&mut self, result: SessionResult) {
        let status = match (result.terminal_reason, result.error) {
            (TerminalReason::FatalError, message) => LocationStatus::Errored {
                message: message.unwrap_or_else(|| "retries exhausted".to_string()),
            },
            (TerminalReason::Cancelled, _) => LocationStatus::Cancelled,
            (reason, _) => LocationStatus::Completed { reason },
        };
        tracing::info!(
            "📍 {}: {} record(s) ({:?})",
            result.location,
            result.records.len(),
            status
        );

        self.reports.push(LocationReport {
            location: result.location,
            count: result.records.len(),
            status,
        });
        for identified in result.records {
            self.presence.observe(&identified.record);
            self.records.push(identified.record);
        }
    }

    fn not_attempted(&mut self, location: &str) {
        self.reports.push(LocationReport {
            location: location.to_string(),
            count: 0,
            status: LocationStatus::NotAttempted,
        });
    }

    fn finish(self, cancelled: bool) -> SearchOutcome {
        SearchOutcome {
            summary: SearchSummary {
                total_records: self.records.len(),
                locations: self.reports,
                field_presence: self.presence,
                cancelled,
            },
            records: self.records,
        }
    }
}
