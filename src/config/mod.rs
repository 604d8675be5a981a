#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::adapters::google_places::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};
use crate::adapters::sink::OutputFormat;
use crate::core::orchestrator::{SearchSettings, DEFAULT_LOCATION_DELAY};
use crate::core::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
use crate::core::session::{SessionSettings, DEFAULT_PAGE_TOKEN_DELAY, DEFAULT_RESULT_CEILING};
use crate::domain::model::SearchRequest;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use std::time::Duration;
use toml_config::TomlConfig;

#[cfg(feature = "cli")]
pub use cli::CliConfig;

pub const API_KEY_ENV: &str = "GOOGLE_MAPS_API_KEY";
pub const DEFAULT_OUTPUT_PATH: &str = "./output";

/// 單次執行的完整設定：先讀 TOML，再套用命令列參數，
/// API key 最後才從環境變數補上
#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub specialty: String,
    pub locations: Vec<String>,
    pub per_location_cap: Option<usize>,
    pub max_results: Option<usize>,
    pub tag_location: bool,
    pub api_key: Option<String>,
    pub endpoint: String,
    pub timeout: Duration,
    pub search: SearchSettings,
    pub max_requests_per_second: Option<u32>,
    pub output_path: String,
    pub output_formats: Vec<String>,
    pub compress: bool,
}

fn millis_or(value: Option<u64>, default: Duration) -> Duration {
    value.map(Duration::from_millis).unwrap_or(default)
}

fn clean_locations(locations: &[String]) -> Vec<String> {
    locations.iter().map(|l| l.trim().to_string()).collect()
}

impl HarvestSettings {
    pub fn from_toml(config: &TomlConfig) -> Self {
        let source = &config.source;
        let retry = RetryPolicy::new(
            source.retry_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            millis_or(source.retry_delay_ms, DEFAULT_RETRY_DELAY),
        );

        Self {
            specialty: config.search.specialty.clone().unwrap_or_default(),
            locations: clean_locations(&config.search.locations),
            per_location_cap: config.search.per_location_cap,
            max_results: config.search.max_results,
            tag_location: config.search.tag_location.unwrap_or(false),
            api_key: config
                .api_key()
                .map(str::to_string)
                .or_else(|| std::env::var(API_KEY_ENV).ok())
                .filter(|key| !key.trim().is_empty()),
            endpoint: source
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            timeout: source
                .timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
            search: SearchSettings {
                session: SessionSettings {
                    retry,
                    page_token_delay: millis_or(
                        source.page_token_delay_ms,
                        DEFAULT_PAGE_TOKEN_DELAY,
                    ),
                    result_ceiling: Some(source.result_ceiling.unwrap_or(DEFAULT_RESULT_CEILING)),
                    detail_concurrency: source.detail_concurrency.unwrap_or(1),
                },
                location_delay: millis_or(source.location_delay_ms, DEFAULT_LOCATION_DELAY),
            },
            max_requests_per_second: source.max_requests_per_second,
            output_path: config
                .load
                .output_path
                .clone()
                .unwrap_or_else(|| DEFAULT_OUTPUT_PATH.to_string()),
            output_formats: config
                .load
                .output_formats
                .clone()
                .unwrap_or_else(|| vec!["csv".to_string()]),
            compress: config.load.compression.unwrap_or(false),
        }
    }

    /// 載入 `--config` 指定的檔案 (若有)，再套用命令列參數
    #[cfg(feature = "cli")]
    pub fn from_cli(cli: &CliConfig) -> Result<Self> {
        let file_config = match &cli.config {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path);
                TomlConfig::from_file(path)?
            }
            None => TomlConfig::default(),
        };
        let mut settings = Self::from_toml(&file_config);
        settings.apply_cli(cli);
        Ok(settings)
    }

    #[cfg(feature = "cli")]
    fn apply_cli(&mut self, cli: &CliConfig) {
        if let Some(specialty) = &cli.specialty {
            self.specialty = specialty.clone();
        }
        if !cli.locations.is_empty() {
            self.locations = clean_locations(&cli.locations);
        }
        if cli.per_location_cap.is_some() {
            self.per_location_cap = cli.per_location_cap;
        }
        if cli.max_results.is_some() {
            self.max_results = cli.max_results;
        }
        self.tag_location |= cli.tag_location;
        if let Some(key) = cli.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key.clone());
        }
        if let Some(path) = &cli.output_path {
            self.output_path = path.clone();
        }
        if !cli.output_formats.is_empty() {
            self.output_formats = cli.output_formats.clone();
        }
        self.compress |= cli.compress;
        if let Some(concurrency) = cli.detail_concurrency {
            self.search.session.detail_concurrency = concurrency;
        }
    }

    pub fn request(&self) -> SearchRequest {
        SearchRequest {
            specialty: self.specialty.trim().to_string(),
            locations: self.locations.clone(),
            per_location_cap: self.per_location_cap,
            global_cap: self.max_results,
            tag_location: self.tag_location,
        }
    }

    pub fn formats(&self) -> Result<Vec<OutputFormat>> {
        self.output_formats
            .iter()
            .map(|format| OutputFormat::parse(format))
            .collect()
    }

    pub fn require_api_key(&self) -> Result<&str> {
        let key = validation::validate_required_field(API_KEY_ENV, &self.api_key)?;
        validation::validate_non_empty_string(API_KEY_ENV, key)?;
        Ok(key)
    }
}

impl Validate for HarvestSettings {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("search.specialty", &self.specialty)?;
        validation::validate_non_empty_list("search.locations", &self.locations)?;
        if let Some(cap) = self.per_location_cap {
            validation::validate_positive_number("search.per_location_cap", cap, 1)?;
        }
        if let Some(cap) = self.max_results {
            validation::validate_positive_number("search.max_results", cap, 1)?;
        }

        validation::validate_url("source.endpoint", &self.endpoint)?;
        self.require_api_key()?;
        validation::validate_positive_number(
            "source.detail_concurrency",
            self.search.session.detail_concurrency,
            1,
        )?;
        if let Some(ceiling) = self.search.session.result_ceiling {
            validation::validate_positive_number("source.result_ceiling", ceiling, 1)?;
        }
        if let Some(rate) = self.max_requests_per_second {
            validation::validate_range("source.max_requests_per_second", rate, 1, 1000)?;
        }

        validation::validate_path("load.output_path", &self.output_path)?;
        validation::validate_non_empty_list("load.output_formats", &self.output_formats)?;
        for format in &self.output_formats {
            validation::validate_one_of(
                "load.output_formats",
                &format.trim().to_ascii_lowercase(),
                &OutputFormat::NAMES,
            )?;
        }
        Ok(())
    }
}
