pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use config::{cli::LocalStorage, toml_config::TomlConfig};
pub use core::{
    client::FmpClient, etl::EtlEngine, pipeline::HistoryPipeline, raw_pipeline::RawPipeline,
    returns_pipeline::{ReturnsPipeline, ReturnsRequest},
};
pub use domain::market::{Interval, Period, PriceRow, PriceSeries, ReturnsTable};
pub use domain::model::{Record, Table};
pub use utils::error::{EtlError, Result};
