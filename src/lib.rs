pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{google_places::GooglePlacesClient, sink::FileSink, storage::LocalStorage};
pub use app::{EngineReport, HarvestEngine};
pub use config::HarvestSettings;
pub use core::orchestrator::{SearchOrchestrator, SearchSettings};
pub use domain::model::{ProviderRecord, SearchOutcome, SearchRequest, SearchSummary};
pub use utils::error::{ApiError, HarvestError, Result};
