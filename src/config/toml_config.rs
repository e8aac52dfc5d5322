use crate::core::client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECONDS};
use crate::core::returns_pipeline::ReturnsRequest;
use crate::core::{ConfigProvider, Interval, Period};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    pub request: RequestConfig,
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub base_url: Option<String>,
    pub api_key: String,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RequestConfig {
    History {
        ticker: String,
        interval: Option<String>,
    },
    Returns {
        tickers: Vec<String>,
        period: Option<String>,
        compare_with_index: Option<String>,
        relative: Option<bool>,
    },
    Raw {
        path: String,
    },
}

impl RequestConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            RequestConfig::History { .. } => "history",
            RequestConfig::Returns { .. } => "returns",
            RequestConfig::Raw { .. } => "raw",
        }
    }

    pub fn interval(&self) -> Result<Interval> {
        match self {
            RequestConfig::History { interval, .. } => {
                interval.as_deref().unwrap_or("1d").parse()
            }
            _ => Err(EtlError::ConfigValidationError {
                field: "request.interval".to_string(),
                message: format!("interval is not used by '{}' requests", self.kind()),
            }),
        }
    }

    pub fn returns_request(&self) -> Result<ReturnsRequest> {
        match self {
            RequestConfig::Returns {
                tickers,
                period,
                compare_with_index,
                relative,
            } => Ok(ReturnsRequest {
                tickers: tickers.clone(),
                period: period
                    .as_deref()
                    .map(str::parse::<Period>)
                    .transpose()?
                    .unwrap_or_default(),
                compare_with_index: compare_with_index.clone(),
                relative: relative.unwrap_or(false),
            }),
            _ => Err(EtlError::ConfigValidationError {
                field: "request.kind".to_string(),
                message: format!("expected 'returns', got '{}'", self.kind()),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    pub output_formats: Vec<String>,
    pub file_stem: Option<String>,
    pub compress: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub json_logs: Option<bool>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${FMP_API_KEY})，找不到的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigValidationError {
            field: "environment".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("source.api_key", &self.source.api_key)?;
        if self.source.api_key.contains("${") {
            return Err(EtlError::MissingConfigError {
                field: format!("source.api_key (unresolved {})", self.source.api_key),
            });
        }
        validation::validate_url("source.base_url", self.base_url())?;
        validation::validate_positive_number("source.timeout_seconds", self.timeout_seconds(), 1)?;

        validation::validate_path("load.output_path", &self.load.output_path)?;
        validation::validate_output_formats("load.output_formats", &self.load.output_formats)?;

        match &self.request {
            RequestConfig::History { ticker, .. } => {
                validation::validate_ticker("request.ticker", ticker)?;
                self.request.interval()?;
            }
            RequestConfig::Returns {
                tickers,
                compare_with_index,
                relative,
                ..
            } => {
                if tickers.is_empty() {
                    return Err(EtlError::MissingConfigError {
                        field: "request.tickers".to_string(),
                    });
                }
                for ticker in tickers {
                    validation::validate_ticker("request.tickers", ticker)?;
                }
                if let Some(index) = compare_with_index {
                    validation::validate_ticker("request.compare_with_index", index)?;
                } else if relative.unwrap_or(false) {
                    return Err(EtlError::MissingConfigError {
                        field: "request.compare_with_index".to_string(),
                    });
                }
                self.request.returns_request()?;
            }
            RequestConfig::Raw { path } => {
                validation::validate_non_empty_string("request.path", path)?;
            }
        }

        Ok(())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.json_logs)
            .unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn api_key(&self) -> &str {
        &self.source.api_key
    }

    fn base_url(&self) -> &str {
        self.source.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    fn timeout_seconds(&self) -> u64 {
        self.source.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.load.output_formats
    }

    fn file_stem(&self) -> &str {
        self.load.file_stem.as_deref().unwrap_or(self.pipeline.name.as_str())
    }

    fn compress(&self) -> bool {
        self.load.compress.unwrap_or(false)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
