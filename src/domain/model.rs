use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// 一次搜尋請求，建立後唯讀
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub specialty: String,
    pub locations: Vec<String>,
    pub per_location_cap: Option<usize>,
    pub global_cap: Option<usize>,
    pub tag_location: bool,
}

impl SearchRequest {
    pub fn new(specialty: impl Into<String>, locations: Vec<String>) -> Self {
        Self {
            specialty: specialty.into(),
            locations,
            per_location_cap: None,
            global_cap: None,
            tag_location: false,
        }
    }

    pub fn with_per_location_cap(mut self, cap: usize) -> Self {
        self.per_location_cap = Some(cap);
        self
    }

    pub fn with_global_cap(mut self, cap: usize) -> Self {
        self.global_cap = Some(cap);
        self
    }

    pub fn with_location_tag(mut self, enabled: bool) -> Self {
        self.tag_location = enabled;
        self
    }

    /// 送往 text search 的查詢字串
    pub fn query_for(&self, location: &str) -> String {
        format!("{} in {}", self.specialty.trim(), location.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub website: String,
    pub tags: BTreeSet<String>,
    pub rating: Option<f64>,
    pub rating_count: Option<u64>,
    pub price_level: Option<u8>,
    pub has_hours: bool,
    pub source_location: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

/// 正規化後的紀錄加上遠端 identity (identity 不放進 `ProviderRecord`)
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifiedRecord {
    pub place_id: String,
    pub record: ProviderRecord,
}

/// text search 結果頁中的一筆摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceSummary {
    pub place_id: String,
    pub name: Option<String>,
}

impl PlaceSummary {
    pub fn new(place_id: impl Into<String>) -> Self {
        Self {
            place_id: place_id.into(),
            name: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub results: Vec<PlaceSummary>,
    pub next_token: Option<String>,
}

/// places 服務回傳的原始明細
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDetail {
    pub name: Option<String>,
    pub formatted_address: Option<String>,
    pub formatted_phone_number: Option<String>,
    pub international_phone_number: Option<String>,
    pub website: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
    pub rating: Option<f64>,
    pub user_ratings_total: Option<i64>,
    pub price_level: Option<i64>,
    pub opening_hours: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    pub location: String,
    pub continuation_token: Option<String>,
    pub page_index: usize,
    pub records_so_far: usize,
}

impl PageState {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            continuation_token: None,
            page_index: 1,
            records_so_far: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    CapReached,
    NoMorePages,
    RequestCapReached,
    FatalError,
    Cancelled,
}

impl TerminalReason {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::FatalError)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionResult {
    pub location: String,
    pub records: Vec<IdentifiedRecord>,
    pub terminal_reason: TerminalReason,
    pub pages_fetched: usize,
    pub error: Option<String>,
}

impl SessionResult {
    pub fn count(&self) -> usize {
        self.records.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocationStatus {
    Completed { reason: TerminalReason },
    Errored { message: String },
    Cancelled,
    NotAttempted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationReport {
    pub location: String,
    pub count: usize,
    #[serde(flatten)]
    pub status: LocationStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPresence {
    pub phone: usize,
    pub website: usize,
    pub rating: usize,
}

impl FieldPresence {
    pub fn observe(&mut self, record: &ProviderRecord) {
        if !record.phone.is_empty() {
            self.phone += 1;
        }
        if !record.website.is_empty() {
            self.website += 1;
        }
        if record.rating.is_some() {
            self.rating += 1;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSummary {
    pub total_records: usize,
    pub locations: Vec<LocationReport>,
    pub field_presence: FieldPresence,
    pub cancelled: bool,
}

impl SearchSummary {
    pub fn per_location_counts(&self) -> HashMap<String, usize> {
        self.locations
            .iter()
            .map(|report| (report.location.clone(), report.count))
            .collect()
    }

    pub fn count_for(&self, location: &str) -> Option<usize> {
        self.report_for(location).map(|report| report.count)
    }

    pub fn report_for(&self, location: &str) -> Option<&LocationReport> {
        self.locations.iter().find(|report| report.location == location)
    }

    pub fn completed_locations(&self) -> Vec<&str> {
        self.locations_where(|status| matches!(status, LocationStatus::Completed { .. }))
    }

    pub fn errored_locations(&self) -> Vec<&str> {
        self.locations_where(|status| matches!(status, LocationStatus::Errored { .. }))
    }

    pub fn not_attempted_locations(&self) -> Vec<&str> {
        self.locations_where(|status| matches!(status, LocationStatus::NotAttempted))
    }

    fn locations_where(&self, predicate: impl Fn(&LocationStatus) -> bool) -> Vec<&str> {
        self.locations
            .iter()
            .filter(|report| predicate(&report.status))
            .map(|report| report.location.as_str())
            .collect()
    }
}

/// 進度通知，每頁與每個地點各發一次
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub location: String,
    pub page_index: usize,
    pub records_so_far: usize,
}

/// 交給輸出端的紀錄與摘要
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub records: Vec<ProviderRecord>,
    pub summary: SearchSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(location: &str, count: usize, status: LocationStatus) -> LocationReport {
        LocationReport {
            location: location.to_string(),
            count,
            status,
        }
    }

    #[test]
    fn test_query_combines_specialty_and_location() {
        let request = SearchRequest::new(" cardiologists ", vec!["Mumbai".to_string()]);
        assert_eq!(request.query_for(" Mumbai"), "cardiologists in Mumbai");
    }

    #[test]
    fn test_summary_location_views() {
        let summary = SearchSummary {
            total_records: 3,
            locations: vec![
                report(
                    "Pune",
                    3,
                    LocationStatus::Completed {
                        reason: TerminalReason::NoMorePages,
                    },
                ),
                report(
                    "Nashik",
                    0,
                    LocationStatus::Errored {
                        message: "timeout".to_string(),
                    },
                ),
                report("Nagpur", 0, LocationStatus::NotAttempted),
            ],
            field_presence: FieldPresence::default(),
            cancelled: false,
        };

        assert_eq!(summary.completed_locations(), vec!["Pune"]);
        assert_eq!(summary.errored_locations(), vec!["Nashik"]);
        assert_eq!(summary.not_attempted_locations(), vec!["Nagpur"]);
        assert_eq!(summary.per_location_counts().get("Pune"), Some(&3));
        assert_eq!(summary.count_for("Nagpur"), Some(0));
    }

    #[test]
    fn test_summary_serializes_status_inline() {
        let value = serde_json::to_value(report(
            "Pune",
            2,
            LocationStatus::Completed {
                reason: TerminalReason::CapReached,
            },
        ))
        .unwrap();

        assert_eq!(value["status"], "completed");
        assert_eq!(value["reason"], "cap_reached");
        assert_eq!(value["count"], 2);
    }
}
