use crate::core::resample::{apply_pct_change, first_per_bucket, period_returns};
use crate::domain::market::{
    HistoricalResponse, IntradayBar, Interval, Period, PriceRow, PriceSeries, ReturnsTable,
};
use crate::domain::model::Table;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::validate_ticker;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://financialmodelingprep.com/api/v3";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Tickers in request order followed by the index, each fetched once.
pub fn unique_symbols<'a>(tickers: &'a [String], compare_with_index: Option<&'a str>) -> Vec<&'a str> {
    let mut symbols: Vec<&str> = Vec::with_capacity(tickers.len() + 1);
    for ticker in tickers.iter().map(String::as_str).chain(compare_with_index) {
        if symbols.contains(&ticker) {
            tracing::warn!("⚠️ Duplicate ticker {} ignored", ticker);
            continue;
        }
        symbols.push(ticker);
    }
    symbols
}

/// Financial Modeling Prep API 客戶端，以 `apikey` 查詢參數驗證
#[derive(Debug, Clone)]
pub struct FmpClient {
    client: Client,
    base_url: String,
    api_key: String,
    ticker: Option<String>,
    timeout: Duration,
}

impl FmpClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            ticker: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_seconds());
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            api_key: config.api_key().to_string(),
            ticker: None,
            timeout,
        })
    }

    /// 預設股票代號，呼叫時未指定 ticker 就用這個
    pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = Some(ticker.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 每個請求的逾時，預設 30 秒
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn ticker(&self) -> Option<&str> {
        self.ticker.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn resolve_ticker<'a>(&'a self, ticker: Option<&'a str>) -> Result<&'a str> {
        let ticker = ticker
            .or(self.ticker.as_deref())
            .ok_or_else(|| EtlError::MissingConfigError {
                field: "ticker".to_string(),
            })?;
        validate_ticker("ticker", ticker)?;
        Ok(ticker)
    }

    /// GET `{base_url}/{path}?apikey=...`; anything but 200 is a connection error.
    pub async fn fetch_json(&self, path: &str) -> Result<Value> {
        let url = self.endpoint(path);
        tracing::debug!("Making API request to: {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[("apikey", self.api_key.as_str())])
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("API response status: {}", status);

        if status != StatusCode::OK {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!("Failed to read error response body: {}", e);
                    String::new()
                }
            };
            tracing::error!("❌ Response for API is {} {}", status, body);
            return Err(EtlError::ConnectionError {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Raw endpoint as a table, one row per JSON object.
    pub async fn fetch_table(&self, path: &str) -> Result<Table> {
        let json = self.fetch_json(path).await?;
        let table = Table::from_json(json)?;
        tracing::debug!(
            "Fetched {} rows with {} columns from {}",
            table.len(),
            table.columns.len(),
            path
        );
        Ok(table)
    }

    /// Daily history sorted oldest first. `None` when the API answers `{}`.
    pub async fn fetch_historical(&self, ticker: Option<&str>) -> Result<Option<PriceSeries>> {
        let ticker = self.resolve_ticker(ticker)?;
        let json = self
            .fetch_json(&format!("historical-price-full/{}", ticker))
            .await?;

        if matches!(&json, Value::Object(obj) if obj.is_empty()) {
            tracing::warn!("⚠️ {} is empty when retrieving data", ticker);
            return Ok(None);
        }

        let response: HistoricalResponse = serde_json::from_value(json)?;
        let mut rows: Vec<PriceRow> = response.historical.into_iter().map(PriceRow::from).collect();
        rows.sort_by_key(|row| row.date);

        Ok(Some(PriceSeries {
            symbol: response.symbol,
            interval: Interval::Daily,
            rows,
        }))
    }

    async fn fetch_intraday(&self, ticker: &str, interval: Interval) -> Result<PriceSeries> {
        let json = self
            .fetch_json(&format!("historical-chart/{}/{}", interval, ticker))
            .await?;
        let bars: Vec<IntradayBar> = serde_json::from_value(json)?;

        Ok(PriceSeries {
            symbol: ticker.to_string(),
            interval,
            rows: bars.into_iter().map(PriceRow::from).collect(),
        })
    }

    /// OHLCV bars of `ticker` (or the default ticker) at `interval`.
    ///
    /// Intraday intervals come straight from `historical-chart` in API order.
    /// Daily and coarser intervals carry `pct change` computed on the daily
    /// rows; weekly and up then keep only the first trading day of each bucket.
    pub async fn historical_price_by_interval(
        &self,
        ticker: Option<&str>,
        interval: Interval,
    ) -> Result<PriceSeries> {
        let ticker = self.resolve_ticker(ticker)?;
        tracing::info!("📈 Fetching {} prices for {}", interval, ticker);

        let Some(freq) = interval.frequency() else {
            return self.fetch_intraday(ticker, interval).await;
        };

        let mut series = self
            .fetch_historical(Some(ticker))
            .await?
            .ok_or_else(|| EtlError::NoData {
                symbol: ticker.to_string(),
            })?;

        apply_pct_change(&mut series.rows);
        series.interval = interval;

        if interval != Interval::Daily {
            let daily_rows = series.rows.len();
            series.rows = first_per_bucket(series.rows, freq);
            tracing::debug!(
                "Resampled {} daily rows into {} {} rows",
                daily_rows,
                series.rows.len(),
                interval
            );
        }

        Ok(series)
    }

    /// Same as [`historical_price_by_interval`](Self::historical_price_by_interval)
    /// with the interval given as a string such as `"1w"`.
    pub async fn historical_price_by_interval_str(
        &self,
        ticker: Option<&str>,
        interval: &str,
    ) -> Result<PriceSeries> {
        let interval: Interval = interval.parse()?;
        self.historical_price_by_interval(ticker, interval).await
    }

    /// Period returns of several tickers, outer-joined on the period.
    ///
    /// `compare_with_index` is fetched as one more column after `tickers`.
    /// Tickers the API has no data for are skipped.
    pub async fn get_multiple_returns(
        &self,
        tickers: &[String],
        period: Period,
        compare_with_index: Option<&str>,
    ) -> Result<ReturnsTable> {
        let symbols = unique_symbols(tickers, compare_with_index);
        if symbols.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "tickers".to_string(),
            });
        }

        tracing::info!(
            "📊 Computing {} returns for {} tickers",
            period,
            symbols.len()
        );

        let mut columns = Vec::with_capacity(symbols.len());
        for ticker in symbols {
            match self.fetch_historical(Some(ticker)).await? {
                Some(series) => {
                    let returns = period_returns(&series.rows, period.frequency());
                    tracing::debug!("{}: {} {} returns", ticker, returns.len(), period);
                    columns.push((ticker.to_string(), returns));
                }
                None => tracing::warn!("⚠️ Skipping {}: no historical data", ticker),
            }
        }

        Ok(ReturnsTable::outer_join(period, columns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use httpmock::prelude::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn daily(date: &str, adj_close: f64) -> Value {
        json!({
            "date": date,
            "open": adj_close,
            "high": adj_close,
            "low": adj_close,
            "close": adj_close,
            "adjClose": adj_close,
            "volume": 1000
        })
    }

    // FMP 回傳的順序是新到舊
    fn history_body(symbol: &str) -> Value {
        json!({
            "symbol": symbol,
            "historical": [
                daily("2023-02-02", 121.0),
                daily("2023-02-01", 110.0),
                daily("2023-01-09", 105.0),
                daily("2023-01-04", 102.0),
                daily("2023-01-03", 100.0)
            ]
        })
    }

    fn client(server: &MockServer) -> FmpClient {
        FmpClient::new("demo").with_base_url(server.base_url())
    }

    #[tokio::test]
    async fn test_fetch_table_sends_api_key() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/quote/AAPL").query_param("apikey", "demo");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!([{"symbol": "AAPL", "price": 125.07}]));
        });

        let table = client(&server).fetch_table("quote/AAPL").await.unwrap();

        api_mock.assert();
        assert_eq!(table.columns, vec!["symbol", "price"]);
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_non_200_is_connection_error() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/historical-price-full/AAPL");
            then.status(401)
                .json_body(json!({"Error Message": "Invalid API KEY."}));
        });

        let err = client(&server)
            .historical_price_by_interval(Some("AAPL"), Interval::Daily)
            .await
            .unwrap_err();

        api_mock.assert();
        match err {
            EtlError::ConnectionError { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("Invalid API KEY"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_daily_history_sorted_with_pct_change() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/historical-price-full/AAPL");
            then.status(200).json_body(history_body("AAPL"));
        });

        let series = client(&server)
            .with_ticker("AAPL")
            .historical_price_by_interval(None, Interval::Daily)
            .await
            .unwrap();

        assert_eq!(series.symbol, "AAPL");
        assert_eq!(series.len(), 5);
        assert_eq!(series.rows[0].day(), date(2023, 1, 3));
        assert_eq!(series.rows[4].day(), date(2023, 2, 2));
        assert_eq!(series.rows[0].pct_change, None);
        assert!((series.rows[1].pct_change.unwrap() - 0.02).abs() < 1e-12);
        assert!(series.rows.iter().all(|r| r.bucket.is_none()));
    }

    #[tokio::test]
    async fn test_weekly_keeps_first_day_of_each_week() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/historical-price-full/AAPL");
            then.status(200).json_body(history_body("AAPL"));
        });

        let series = client(&server)
            .historical_price_by_interval_str(Some("AAPL"), "1w")
            .await
            .unwrap();

        let days: Vec<NaiveDate> = series.rows.iter().map(|r| r.day()).collect();
        assert_eq!(days, vec![date(2023, 1, 3), date(2023, 1, 9), date(2023, 2, 1)]);
        assert_eq!(series.rows[1].bucket, Some(date(2023, 1, 9)));
        // pct change 是日資料的變化，不是週資料
        assert!((series.rows[1].pct_change.unwrap() - (105.0 / 102.0 - 1.0)).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_monthly_quarterly_yearly_buckets() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/historical-price-full/AAPL");
            then.status(200).json_body(history_body("AAPL"));
        });
        let client = client(&server);

        let monthly = client
            .historical_price_by_interval(Some("AAPL"), Interval::Monthly)
            .await
            .unwrap();
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly.rows[1].bucket, Some(date(2023, 2, 1)));

        let quarterly = client
            .historical_price_by_interval(Some("AAPL"), Interval::Quarterly)
            .await
            .unwrap();
        assert_eq!(quarterly.len(), 1);
        assert_eq!(quarterly.rows[0].day(), date(2023, 1, 3));

        let yearly = client
            .historical_price_by_interval(Some("AAPL"), Interval::Yearly)
            .await
            .unwrap();
        assert_eq!(yearly.len(), 1);
        assert_eq!(yearly.rows[0].bucket, Some(date(2023, 1, 1)));
    }

    #[tokio::test]
    async fn test_intraday_uses_historical_chart_in_api_order() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/historical-chart/5min/AAPL")
                .query_param("apikey", "demo");
            then.status(200).json_body(json!([
                {"date": "2023-01-03 15:55:00", "open": 125.0, "low": 124.8, "high": 125.2, "close": 125.1, "volume": 900},
                {"date": "2023-01-03 15:50:00", "open": 124.9, "low": 124.7, "high": 125.0, "close": 125.0, "volume": 800}
            ]));
        });

        let series = client(&server)
            .historical_price_by_interval(Some("AAPL"), Interval::FiveMin)
            .await
            .unwrap();

        api_mock.assert();
        assert_eq!(series.interval, Interval::FiveMin);
        assert_eq!(series.len(), 2);
        assert!(series.rows[0].date > series.rows[1].date);
        assert_eq!(series.rows[0].pct_change, None);
    }

    #[tokio::test]
    async fn test_unsupported_interval_makes_no_request() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.path_contains("AAPL");
            then.status(200).json_body(json!({}));
        });

        let err = client(&server)
            .historical_price_by_interval_str(Some("AAPL"), "2w")
            .await
            .unwrap_err();

        assert!(matches!(err, EtlError::UnsupportedInterval { value } if value == "2w"));
        api_mock.assert_hits(0);
    }

    #[tokio::test]
    async fn test_empty_object_means_no_data() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/historical-price-full/ZZZZ");
            then.status(200).json_body(json!({}));
        });
        let client = client(&server);

        assert!(client.fetch_historical(Some("ZZZZ")).await.unwrap().is_none());

        let err = client
            .historical_price_by_interval(Some("ZZZZ"), Interval::Monthly)
            .await
            .unwrap_err();
        assert!(matches!(err, EtlError::NoData { symbol } if symbol == "ZZZZ"));
    }

    #[tokio::test]
    async fn test_missing_ticker_is_config_error() {
        let err = FmpClient::new("demo")
            .historical_price_by_interval(None, Interval::Daily)
            .await
            .unwrap_err();
        assert!(matches!(err, EtlError::MissingConfigError { field } if field == "ticker"));
    }

    #[tokio::test]
    async fn test_multiple_returns_outer_join_with_index() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/historical-price-full/AAPL");
            then.status(200).json_body(history_body("AAPL"));
        });
        server.mock(|when, then| {
            when.method(GET).path("/historical-price-full/SPY");
            then.status(200).json_body(json!({
                "symbol": "SPY",
                "historical": [
                    daily("2023-03-01", 420.0),
                    daily("2023-02-01", 400.0),
                    daily("2023-01-03", 380.0)
                ]
            }));
        });

        let tickers = vec!["AAPL".to_string()];
        let returns = client(&server)
            .get_multiple_returns(&tickers, Period::Monthly, Some("SPY"))
            .await
            .unwrap();

        assert_eq!(tickers, vec!["AAPL".to_string()]);
        assert_eq!(returns.tickers, vec!["AAPL", "SPY"]);
        assert_eq!(returns.periods, vec![date(2023, 2, 1), date(2023, 3, 1)]);
        assert!((returns.get(date(2023, 2, 1), "AAPL").unwrap() - 0.10).abs() < 1e-12);
        assert_eq!(returns.get(date(2023, 3, 1), "AAPL"), None);
        assert!((returns.get(date(2023, 3, 1), "SPY").unwrap() - 0.05).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_multiple_returns_skips_empty_ticker() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/historical-price-full/AAPL");
            then.status(200).json_body(history_body("AAPL"));
        });
        server.mock(|when, then| {
            when.method(GET).path("/historical-price-full/GONE");
            then.status(200).json_body(json!({}));
        });

        let returns = client(&server)
            .get_multiple_returns(
                &["AAPL".to_string(), "GONE".to_string(), "AAPL".to_string()],
                Period::Monthly,
                None,
            )
            .await
            .unwrap();

        assert_eq!(returns.tickers, vec!["AAPL"]);
        assert_eq!(returns.len(), 1);
    }

    #[tokio::test]
    async fn test_weekly_and_daily_returns() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/historical-price-full/AAPL");
            then.status(200).json_body(history_body("AAPL"));
        });
        let client = client(&server);
        let tickers = vec!["AAPL".to_string()];

        let weekly = client
            .get_multiple_returns(&tickers, Period::Weekly, None)
            .await
            .unwrap();
        // 週一開始的週：1/2、1/9、1/30
        assert_eq!(weekly.periods, vec![date(2023, 1, 9), date(2023, 1, 30)]);
        assert!((weekly.get(date(2023, 1, 9), "AAPL").unwrap() - 0.05).abs() < 1e-12);
        assert!(
            (weekly.get(date(2023, 1, 30), "AAPL").unwrap() - (110.0 / 105.0 - 1.0)).abs() < 1e-12
        );

        let daily = client
            .get_multiple_returns(&tickers, Period::Daily, None)
            .await
            .unwrap();
        assert_eq!(daily.len(), 4);
        assert_eq!(daily.periods[0], date(2023, 1, 4));
        assert!((daily.get(date(2023, 1, 4), "AAPL").unwrap() - 0.02).abs() < 1e-12);
        assert!((daily.get(date(2023, 2, 2), "AAPL").unwrap() - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_new_client_uses_default_timeout() {
        let client = FmpClient::new("demo");
        assert_eq!(client.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECONDS));
        assert_eq!(
            client.with_timeout(Duration::from_secs(5)).timeout(),
            Duration::from_secs(5)
        );
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/quote/AAPL");
            then.status(200)
                .delay(Duration::from_secs(3))
                .json_body(json!([{"symbol": "AAPL"}]));
        });

        let err = client(&server)
            .with_timeout(Duration::from_millis(200))
            .fetch_table("quote/AAPL")
            .await
            .unwrap_err();

        match err {
            EtlError::ApiError(e) => assert!(e.is_timeout()),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
