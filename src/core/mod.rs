pub mod dedup;
pub mod normalizer;
pub mod orchestrator;
pub mod pacing;
pub mod progress;
pub mod retry;
pub mod session;

pub use crate::domain::model::{ProviderRecord, SearchOutcome, SearchRequest, SearchSummary};
pub use crate::domain::ports::{OutputSink, PlacesApi, ProgressObserver, Storage};
pub use crate::utils::error::Result;
