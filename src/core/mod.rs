pub mod client;
pub mod etl;
pub mod output;
pub mod pipeline;
pub mod raw_pipeline;
pub mod resample;
pub mod returns_pipeline;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::domain::market::{Interval, Period, PriceRow, PriceSeries, ReturnsTable};
pub use crate::domain::model::{Record, Table, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
