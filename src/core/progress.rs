use crate::domain::model::{ProgressEvent, SearchSummary, SessionResult};
use crate::domain::ports::ProgressObserver;

/// 透過 `tracing` 回報進度
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_page(&self, event: &ProgressEvent) {
        tracing::debug!(
            location = %event.location,
            page = event.page_index,
            records = event.records_so_far,
            "page completed"
        );
    }

    fn on_location_complete(&self, result: &SessionResult) {
        match &result.error {
            Some(error) => tracing::warn!(
                "⚠️ {} ended early after {} page(s) with {} record(s): {}",
                result.location,
                result.pages_fetched,
                result.count(),
                error
            ),
            None => tracing::info!(
                "📍 {} done: {} record(s) over {} page(s), {:?}",
                result.location,
                result.count(),
                result.pages_fetched,
                result.terminal_reason
            ),
        }
    }

    fn on_run_complete(&self, summary: &SearchSummary) {
        tracing::info!(
            "📊 Totals - records: {}, with phone: {}, with website: {}, with rating: {}",
            summary.total_records,
            summary.field_presence.phone,
            summary.field_presence.website,
            summary.field_presence.rating
        );
        for location in summary.errored_locations() {
            tracing::warn!("❌ Location failed: {}", location);
        }
        for location in summary.not_attempted_locations() {
            tracing::warn!("⏭️ Location not attempted: {}", location);
        }
    }
}
