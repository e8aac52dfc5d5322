use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Couldn't connect to FMP API (HTTP {status}): {body}")]
    ConnectionError { status: u16, body: String },

    #[error("Unsupported interval '{value}', check your spelling")]
    UnsupportedInterval { value: String },

    #[error("Unsupported period '{value}', expected one of D, W, M, Q, Y")]
    UnsupportedPeriod { value: String },

    #[error("No historical data returned for {symbol}")]
    NoData { symbol: String },

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Input,
    Data,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ConnectionError { .. } | EtlError::ApiError(_) => ErrorCategory::Network,
            EtlError::UnsupportedInterval { .. } | EtlError::UnsupportedPeriod { .. } => {
                ErrorCategory::Input
            }
            EtlError::NoData { .. }
            | EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::ProcessingError { .. } => ErrorCategory::Data,
            EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EtlError::ZipError(_) | EtlError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 網路錯誤通常可以重新執行
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Input | ErrorCategory::Configuration | ErrorCategory::Data => {
                ErrorSeverity::High
            }
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            EtlError::ConnectionError { status: 401, .. }
            | EtlError::ConnectionError { status: 403, .. } => {
                "Check that the API key is valid and has access to this endpoint".to_string()
            }
            EtlError::ConnectionError { .. } | EtlError::ApiError(_) => {
                "Check the network connection and the base URL, then run again".to_string()
            }
            EtlError::UnsupportedInterval { .. } => {
                "Use one of: 4hour, 1hour, 30min, 15min, 5min, 1min, 1d, 1w, 1m, 1q, 1y"
                    .to_string()
            }
            EtlError::UnsupportedPeriod { .. } => "Use one of: D, W, M, Q, Y".to_string(),
            EtlError::NoData { symbol } => {
                format!("Verify that '{}' is a valid ticker on FMP", symbol)
            }
            EtlError::ConfigValidationError { field, .. }
            | EtlError::InvalidConfigValueError { field, .. }
            | EtlError::MissingConfigError { field } => {
                format!("Fix the '{}' setting and try again", field)
            }
            EtlError::IoError(_) | EtlError::ZipError(_) => {
                "Check that the output path exists and is writable".to_string()
            }
            EtlError::CsvError(_) | EtlError::SerializationError(_) => {
                "The API response had an unexpected shape; run with --verbose for details"
                    .to_string()
            }
            EtlError::ProcessingError { .. } => {
                "Run with --verbose to inspect the intermediate data".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not fetch data from FMP: {}", self),
            ErrorCategory::Input => format!("Invalid request: {}", self),
            ErrorCategory::Data => format!("Could not process the API data: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }

    /// 依嚴重程度決定 CLI 退出碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
