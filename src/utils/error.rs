use thiserror::Error;

/// 遠端搜尋服務回報的失敗種類
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Rate limited by places service: {message}")]
    RateLimited { message: String },

    #[error("Credential rejected by places service: {message}")]
    Unauthorized { message: String },

    #[error("Transient places service failure: {message}")]
    Transient { message: String },

    #[error("Invalid places request: {message}")]
    InvalidRequest { message: String },
}

impl ApiError {
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// RateLimited 與 Transient 可重試，其餘立即上報
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Transient { .. } => "transient",
            Self::InvalidRequest { .. } => "invalid_request",
        }
    }
}

/// 單筆紀錄的錯誤：丟棄該筆，session 繼續
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing name")]
    MissingName,
}

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Credential rejected on first request: {message}")]
    CredentialRejected { message: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Authentication,
    Configuration,
    Data,
    Storage,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl HarvestError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HttpError(_) => ErrorCategory::Network,
            Self::CredentialRejected { .. } => ErrorCategory::Authentication,
            Self::Cancelled => ErrorCategory::Interrupted,
            Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Configuration,
            Self::ZipError(_) | Self::IoError(_) | Self::CsvError(_) => ErrorCategory::Storage,
            Self::SerializationError(_) | Self::ProcessingError { .. } => ErrorCategory::Data,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Cancelled => ErrorSeverity::Low,
            Self::HttpError(_) => ErrorSeverity::Medium,
            Self::CredentialRejected { .. } | Self::IoError(_) | Self::ZipError(_) => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check network connectivity and retry later",
            ErrorCategory::Authentication => {
                "Verify GOOGLE_MAPS_API_KEY and that the Places API is enabled for it"
            }
            ErrorCategory::Configuration => "Review command line flags and the TOML config file",
            ErrorCategory::Data => "Inspect the upstream response; the payload may have changed",
            ErrorCategory::Storage => "Check that the output path exists and is writable",
            ErrorCategory::Interrupted => "Re-run the search to collect the remaining locations",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::CredentialRejected { .. } => {
                "The places service rejected the API key on the first request".to_string()
            }
            Self::Cancelled => "The search was cancelled before it finished".to_string(),
            Self::MissingConfigError { field } => format!("Missing required setting: {}", field),
            Self::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ApiError::rate_limited("slow down").is_retryable());
        assert!(ApiError::transient("timeout").is_retryable());
        assert!(!ApiError::unauthorized("bad key").is_retryable());
        assert!(!ApiError::invalid_request("bad query").is_retryable());
    }

    #[test]
    fn test_credential_rejected_is_critical() {
        let err = HarvestError::CredentialRejected {
            message: "REQUEST_DENIED".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Authentication);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_config_errors_are_configuration() {
        let err = HarvestError::MissingConfigError {
            field: "search.specialty".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(err.user_friendly_message().contains("search.specialty"));
    }

    #[test]
    fn test_cancelled_is_low_severity() {
        let err = HarvestError::Cancelled;
        assert_eq!(err.category(), ErrorCategory::Interrupted);
        assert_eq!(err.severity(), ErrorSeverity::Low);
    }
}
