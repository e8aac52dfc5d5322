pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::core::client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECONDS};
#[cfg(feature = "cli")]
use crate::core::{ConfigProvider, Interval, Period};
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "fmp-etl")]
#[command(about = "Fetch Financial Modeling Prep price data into CSV/TSV/JSON files")]
pub struct CliConfig {
    #[arg(long, env = "FMP_API_KEY", hide_env_values = true)]
    pub api_key: String,

    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, value_delimiter = ',', default_value = "csv")]
    pub formats: Vec<String>,

    #[arg(long, help = "Output file name without extension")]
    pub file_stem: Option<String>,

    #[arg(long, help = "Bundle all outputs into a single ZIP archive")]
    pub zip: bool,

    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    pub timeout_seconds: u64,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[arg(long, help = "Log CPU and memory usage per ETL phase")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// OHLCV prices of one ticker
    History {
        ticker: String,

        /// 4hour, 1hour, 30min, 15min, 5min, 1min, 1d, 1w, 1m, 1q, 1y
        #[arg(short, long, default_value = "1d")]
        interval: String,
    },
    /// Period returns of several tickers
    Returns {
        #[arg(required = true, value_delimiter = ',')]
        tickers: Vec<String>,

        /// D, W, M, Q or Y
        #[arg(short, long, default_value = "M")]
        period: String,

        /// Index ticker appended as an extra column
        #[arg(long)]
        index: Option<String>,

        /// Divide every return by the index return of the same period
        #[arg(long, requires = "index")]
        relative: bool,
    },
    /// Any endpoint below the base URL, e.g. `quote/AAPL`
    Raw { path: String },
}

#[cfg(feature = "cli")]
impl Command {
    pub fn default_file_stem(&self) -> &'static str {
        match self {
            Command::History { .. } => "history",
            Command::Returns { .. } => "returns",
            Command::Raw { .. } => "raw",
        }
    }
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn api_key(&self) -> &str {
        &self.api_key
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.formats
    }

    fn file_stem(&self) -> &str {
        self.file_stem
            .as_deref()
            .unwrap_or_else(|| self.command.default_file_stem())
    }

    fn compress(&self) -> bool {
        self.zip
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("api_key", &self.api_key)?;
        validation::validate_url("base_url", &self.base_url)?;
        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_output_formats("formats", &self.formats)?;
        validation::validate_positive_number("timeout_seconds", self.timeout_seconds, 1)?;

        match &self.command {
            Command::History { ticker, interval } => {
                validation::validate_ticker("ticker", ticker)?;
                interval.parse::<Interval>()?;
            }
            Command::Returns {
                tickers,
                period,
                index,
                ..
            } => {
                for ticker in tickers {
                    validation::validate_ticker("tickers", ticker)?;
                }
                if let Some(index) = index {
                    validation::validate_ticker("index", index)?;
                }
                period.parse::<Period>()?;
            }
            Command::Raw { path } => validation::validate_non_empty_string("path", path)?,
        }

        Ok(())
    }
}
