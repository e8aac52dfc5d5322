use crate::core::client::{unique_symbols, FmpClient};
use crate::core::output::write_outputs;
use crate::domain::market::{Period, ReturnsTable};
use crate::domain::model::TransformResult;
use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
use crate::utils::error::{EtlError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnsRequest {
    pub tickers: Vec<String>,
    pub period: Period,
    pub compare_with_index: Option<String>,
    /// 以指數報酬為基準換算相對報酬
    pub relative: bool,
}

impl ReturnsRequest {
    /// 實際會請求的股票代號，重複的只算一次
    pub fn symbols(&self) -> Vec<&str> {
        unique_symbols(&self.tickers, self.compare_with_index.as_deref())
    }
}

/// 多檔股票的期間報酬 pipeline
pub struct ReturnsPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    client: FmpClient,
    request: ReturnsRequest,
}

impl<S: Storage, C: ConfigProvider> ReturnsPipeline<S, C> {
    pub fn new(storage: S, config: C, request: ReturnsRequest) -> Result<Self> {
        if request.relative && request.compare_with_index.is_none() {
            return Err(EtlError::MissingConfigError {
                field: "compare_with_index".to_string(),
            });
        }

        let client = FmpClient::from_config(&config)?;
        Ok(Self {
            storage,
            config,
            client,
            request,
        })
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for ReturnsPipeline<S, C> {
    type Extracted = ReturnsTable;

    async fn extract(&self) -> Result<ReturnsTable> {
        let index = self.request.compare_with_index.as_deref();
        let returns = self
            .client
            .get_multiple_returns(&self.request.tickers, self.request.period, index)
            .await?;

        match index {
            Some(index) if self.request.relative => {
                tracing::info!("📐 Expressing returns relative to {}", index);
                returns.relative_to(index)
            }
            _ => Ok(returns),
        }
    }

    async fn transform(&self, returns: ReturnsTable) -> Result<TransformResult> {
        tracing::debug!(
            "Tabulating {} periods x {} tickers",
            returns.len(),
            returns.tickers.len()
        );
        TransformResult::from_table(returns.to_table())
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        write_outputs(&self.storage, &self.config, &result).await
    }
}
