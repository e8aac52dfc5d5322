use crate::core::client::FmpClient;
use crate::core::output::write_outputs;
use crate::domain::model::{Table, TransformResult};
use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
use crate::utils::error::Result;

/// 任意 FMP 端點原樣轉成表格，例如 `quote/AAPL` 或 `profile/MSFT`
pub struct RawPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    client: FmpClient,
    path: String,
}

impl<S: Storage, C: ConfigProvider> RawPipeline<S, C> {
    pub fn new(storage: S, config: C, path: String) -> Result<Self> {
        let client = FmpClient::from_config(&config)?;
        Ok(Self {
            storage,
            config,
            client,
            path,
        })
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for RawPipeline<S, C> {
    type Extracted = Table;

    async fn extract(&self) -> Result<Table> {
        self.client.fetch_table(&self.path).await
    }

    async fn transform(&self, table: Table) -> Result<TransformResult> {
        if table.is_empty() {
            tracing::warn!("⚠️ {} returned no rows", self.path);
        }
        TransformResult::from_table(table)
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        write_outputs(&self.storage, &self.config, &result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{MockConfig, MockStorage};
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_raw_endpoint_round_trip_to_tsv() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/historical-chart/1hour/MSFT")
                .query_param("apikey", "demo");
            then.status(200).json_body(json!([
                {"date": "2023-01-03 15:00:00", "open": 239.1, "low": 238.5, "high": 240.0, "close": 239.6, "volume": 3400000},
                {"date": "2023-01-03 14:00:00", "open": 238.0, "low": 237.7, "high": 239.3, "close": 239.1, "volume": 2100000}
            ]));
        });

        let storage = MockStorage::new();
        let pipeline = RawPipeline::new(
            storage.clone(),
            MockConfig::new(&server.base_url()).with_formats(&["tsv"]),
            "historical-chart/1hour/MSFT".to_string(),
        )
        .unwrap();

        let table = pipeline.extract().await.unwrap();
        api_mock.assert();
        assert_eq!(table.columns, vec!["date", "open", "low", "high", "close", "volume"]);

        let result = pipeline.transform(table).await.unwrap();
        pipeline.load(result).await.unwrap();

        let tsv = String::from_utf8(storage.get_file("prices.tsv").await.unwrap()).unwrap();
        let lines: Vec<&str> = tsv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "2023-01-03 15:00:00\t239.1\t238.5\t240.0\t239.6\t3400000");
    }
}
