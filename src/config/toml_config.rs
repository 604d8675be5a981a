use crate::utils::error::{HarvestError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub load: LoadSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSection {
    pub specialty: Option<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    pub per_location_cap: Option<usize>,
    pub max_results: Option<usize>,
    pub tag_location: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSection {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub page_token_delay_ms: Option<u64>,
    pub location_delay_ms: Option<u64>,
    pub result_ceiling: Option<usize>,
    pub detail_concurrency: Option<usize>,
    pub max_requests_per_second: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadSection {
    pub output_path: Option<String>,
    pub output_formats: Option<Vec<String>>,
    pub compression: Option<bool>,
}

fn env_placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static env placeholder regex"))
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(HarvestError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| HarvestError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GOOGLE_MAPS_API_KEY})，找不到的保持原樣
    fn substitute_env_vars(content: &str) -> String {
        env_placeholder()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    /// 取得 API key；未被環境變數替換的佔位字串視為沒有設定
    pub fn api_key(&self) -> Option<&str> {
        self.source
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && !env_placeholder().is_match(key))
    }
}
