use crate::domain::model::{ProviderRecord, RawDetail};
use crate::domain::ports::{Clock, SystemClock};
use crate::utils::error::ValidationError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};
use url::Url;

const MAX_RATING: f64 = 5.0;
const MAX_PRICE_LEVEL: i64 = 4;

fn digit_groups() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("static phone regex"))
}

/// 把原始明細轉成 `ProviderRecord`
///
/// `fetched_at` 取自注入的 clock，同一個 normalizer 連續呼叫時不會倒退
pub struct RecordNormalizer {
    clock: Arc<dyn Clock>,
    last_fetched_at: Mutex<Option<DateTime<Utc>>>,
}

impl Default for RecordNormalizer {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl RecordNormalizer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last_fetched_at: Mutex::new(None),
        }
    }

    pub fn normalize(
        &self,
        raw: &RawDetail,
        source_location: Option<&str>,
    ) -> Result<ProviderRecord, ValidationError> {
        let name = clean_text(raw.name.as_deref());
        if name.is_empty() {
            return Err(ValidationError::MissingName);
        }

        let phone_source = raw
            .formatted_phone_number
            .as_deref()
            .or(raw.international_phone_number.as_deref());

        Ok(ProviderRecord {
            name,
            address: clean_text(raw.formatted_address.as_deref()),
            phone: normalize_phone(phone_source.unwrap_or_default()),
            website: normalize_website(raw.website.as_deref()),
            tags: raw
                .types
                .iter()
                .map(|tag| tag.trim())
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect::<BTreeSet<_>>(),
            rating: clamp_rating(raw.rating),
            rating_count: raw.user_ratings_total.and_then(|n| u64::try_from(n).ok()),
            price_level: raw
                .price_level
                .filter(|level| (0..=MAX_PRICE_LEVEL).contains(level))
                .map(|level| level as u8),
            has_hours: raw
                .opening_hours
                .as_ref()
                .is_some_and(|hours| !hours.is_null()),
            source_location: source_location.map(str::to_string),
            fetched_at: self.next_timestamp(),
        })
    }

    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        let mut last = self.last_fetched_at.lock();
        let stamped = match *last {
            Some(previous) if previous > now => previous,
            _ => now,
        };
        *last = Some(stamped);
        stamped
    }
}

fn clean_text(value: Option<&str>) -> String {
    value
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

/// 數字群組以單一空白連接，保留開頭的 `+`
/// 例如 `(022) 2345-6789` 與 `022 2345 6789` 都變成 `022 2345 6789`
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let groups: Vec<&str> = digit_groups()
        .find_iter(trimmed)
        .map(|m| m.as_str())
        .collect();
    if groups.is_empty() {
        return String::new();
    }

    let joined = groups.join(" ");
    if trimmed.starts_with('+') {
        format!("+{}", joined)
    } else {
        joined
    }
}

fn normalize_website(raw: Option<&str>) -> String {
    let Some(candidate) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return String::new();
    };
    match Url::parse(candidate) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => candidate.to_string(),
        _ => {
            tracing::debug!("Discarding unparseable website value: {}", candidate);
            String::new()
        }
    }
}

fn clamp_rating(rating: Option<f64>) -> Option<f64> {
    rating
        .filter(|value| !value.is_nan())
        .map(|value| value.clamp(0.0, MAX_RATING))
}
