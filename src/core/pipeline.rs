use crate::core::client::FmpClient;
use crate::core::output::write_outputs;
use crate::domain::market::{Interval, PriceSeries};
use crate::domain::model::TransformResult;
use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
use crate::utils::error::Result;

/// 單一股票的 OHLCV 歷史價格 pipeline
pub struct HistoryPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    client: FmpClient,
    ticker: String,
    interval: Interval,
}

impl<S: Storage, C: ConfigProvider> HistoryPipeline<S, C> {
    pub fn new(storage: S, config: C, ticker: String, interval: Interval) -> Result<Self> {
        let client = FmpClient::from_config(&config)?;
        Ok(Self {
            storage,
            config,
            client,
            ticker,
            interval,
        })
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for HistoryPipeline<S, C> {
    type Extracted = PriceSeries;

    async fn extract(&self) -> Result<PriceSeries> {
        self.client
            .historical_price_by_interval(Some(self.ticker.as_str()), self.interval)
            .await
    }

    async fn transform(&self, series: PriceSeries) -> Result<TransformResult> {
        tracing::debug!(
            "Tabulating {} {} rows for {}",
            series.len(),
            series.interval,
            series.symbol
        );
        TransformResult::from_table(series.to_table())
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        write_outputs(&self.storage, &self.config, &result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{MockConfig, MockStorage};
    use crate::utils::error::EtlError;
    use httpmock::prelude::*;
    use serde_json::json;

    fn history_mock(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(GET)
                .path("/historical-price-full/AAPL")
                .query_param("apikey", "demo");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({
                    "symbol": "AAPL",
                    "historical": [
                        {"date": "2023-02-01", "open": 143.97, "high": 146.61, "low": 141.32,
                         "close": 145.43, "adjClose": 144.8, "volume": 77663600},
                        {"date": "2023-01-04", "open": 126.89, "high": 128.66, "low": 125.08,
                         "close": 126.36, "adjClose": 125.82, "volume": 89113600},
                        {"date": "2023-01-03", "open": 130.28, "high": 130.9, "low": 124.17,
                         "close": 125.07, "adjClose": 124.54, "volume": 112117500}
                    ]
                }));
        })
    }

    #[tokio::test]
    async fn test_extract_daily_series() {
        let server = MockServer::start();
        let api_mock = history_mock(&server);

        let pipeline = HistoryPipeline::new(
            MockStorage::new(),
            MockConfig::new(&server.base_url()),
            "AAPL".to_string(),
            Interval::Daily,
        )
        .unwrap();

        let series = pipeline.extract().await.unwrap();

        api_mock.assert();
        assert_eq!(series.len(), 3);
        assert_eq!(series.rows[0].adj_close, Some(124.54));
    }

    #[tokio::test]
    async fn test_transform_monthly_columns_and_rows() {
        let server = MockServer::start();
        history_mock(&server);

        let pipeline = HistoryPipeline::new(
            MockStorage::new(),
            MockConfig::new(&server.base_url()),
            "AAPL".to_string(),
            Interval::Monthly,
        )
        .unwrap();

        let series = pipeline.extract().await.unwrap();
        let result = pipeline.transform(series).await.unwrap();

        let lines: Vec<&str> = result.csv_output.lines().collect();
        assert_eq!(
            lines[0],
            "date,symbol,open,high,low,close,adjClose,volume,unadjustedVolume,change,\
             changePercent,vwap,label,changeOverTime,pct change,daily,monthly"
        );
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("2023-01-03,AAPL,130.28,"));
        assert!(lines[1].contains(",112117500,"));
        assert!(lines[1].ends_with(",2023-01-03,2023-01-01"));
        assert!(lines[2].starts_with("2023-02-01,AAPL,"));
        assert!(lines[2].ends_with(",2023-02-01,2023-02-01"));
    }

    #[tokio::test]
    async fn test_load_writes_requested_formats() {
        let server = MockServer::start();
        history_mock(&server);

        let storage = MockStorage::new();
        let pipeline = HistoryPipeline::new(
            storage.clone(),
            MockConfig::new(&server.base_url()).with_formats(&["csv", "json"]),
            "AAPL".to_string(),
            Interval::Daily,
        )
        .unwrap();

        let series = pipeline.extract().await.unwrap();
        let result = pipeline.transform(series).await.unwrap();
        let output = pipeline.load(result).await.unwrap();

        assert_eq!(output, "test_output/prices.csv, test_output/prices.json");
        let json_data = storage.get_file("prices.json").await.unwrap();
        let rows: serde_json::Value = serde_json::from_slice(&json_data).unwrap();
        assert_eq!(rows.as_array().unwrap().len(), 3);
        assert_eq!(rows[0]["date"], "2023-01-03");
        assert_eq!(rows[0]["pct change"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_extract_api_failure_propagates() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/historical-price-full/AAPL");
            then.status(500).body("Internal Server Error");
        });

        let pipeline = HistoryPipeline::new(
            MockStorage::new(),
            MockConfig::new(&server.base_url()),
            "AAPL".to_string(),
            Interval::Weekly,
        )
        .unwrap();

        let err = pipeline.extract().await.unwrap_err();
        assert!(matches!(err, EtlError::ConnectionError { status: 500, .. }));
    }
}
