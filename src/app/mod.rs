use crate::core::orchestrator::SearchOrchestrator;
use crate::domain::model::{SearchOutcome, SearchRequest};
use crate::domain::ports::{OutputSink, PlacesApi};
use crate::utils::error::{HarvestError, Result};

/// 先搜尋，再把結果交給輸出端
pub struct HarvestEngine<A: PlacesApi, O: OutputSink> {
    orchestrator: SearchOrchestrator<A>,
    sink: O,
}

#[derive(Debug, Clone)]
pub struct EngineReport {
    pub outcome: SearchOutcome,
    pub output_location: String,
}

impl<A: PlacesApi, O: OutputSink> HarvestEngine<A, O> {
    pub fn new(orchestrator: SearchOrchestrator<A>, sink: O) -> Self {
        Self { orchestrator, sink }
    }

    pub async fn run(&self, request: &SearchRequest) -> Result<EngineReport> {
        tracing::info!("Starting provider harvest...");

        let outcome = self.orchestrator.run(request).await?;
        tracing::info!("Collected {} records", outcome.records.len());

        if outcome.summary.cancelled {
            if outcome.records.is_empty() {
                tracing::warn!("🛑 Run was cancelled before any record was collected");
                return Err(HarvestError::Cancelled);
            }
            tracing::warn!("⚠️ Run was cancelled, writing partial results");
        }

        let output_location = self.sink.write(&outcome).await?;
        tracing::info!("Output saved to: {}", output_location);

        Ok(EngineReport {
            outcome,
            output_location,
        })
    }
}
