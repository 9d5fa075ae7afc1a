use chrono::{DateTime, NaiveDate, Utc};
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::ProviderConfig;
use crate::error::AnalysisError;
use crate::market::Market;
use crate::models::{
    Candle, FinancialStatements, LineItem, PriceSeries, SnapshotInfo, StatementColumn,
    StatementKind, StatementSet, StatementTable,
};
use crate::Result;

use super::{DataProvider, PricePeriod};

const COOKIE_URL: &str = "https://fc.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const SUMMARY_MODULES: &str = "price,summaryDetail,defaultKeyStatistics,financialData,assetProfile";
const STRING_FIELDS: [&str; 4] = ["shortName", "longName", "sector", "industry"];
// 1985-08-23, earlier than any statement the endpoint serves
const TIMESERIES_START: i64 = 493_590_046;

type YahooRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Yahoo Finance client with rate limiting, retry and crumb authentication
///
/// Cloneable; clones share the rate limiter, cookie jar and crumb.
#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    base_url: String,
    cookie_url: String,
    rate_limiter: Arc<YahooRateLimiter>,
    crumb: Arc<RwLock<Option<String>>>,
    max_retries: u32,
    backoff: Duration,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

impl YahooClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .build()?;

        let rpm = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(rpm)));

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cookie_url: COOKIE_URL.to_string(),
            rate_limiter,
            crumb: Arc::new(RwLock::new(None)),
            max_retries: config.max_retries.max(1),
            backoff: Duration::from_secs(1),
        })
    }

    /// Client pointed at another host for both API and cookie requests
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let config = ProviderConfig {
            base_url: base_url.to_string(),
            requests_per_minute: 600,
            ..ProviderConfig::default()
        };
        let mut client = Self::new(&config)?;
        client.cookie_url = client.base_url.clone();
        Ok(client)
    }

    /// Base delay for the exponential retry backoff
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Rate-limited GET with retry on 429, 5xx and network errors.
    /// 404 maps to `NotFound`; 401 drops the crumb so the next attempt
    /// re-authenticates.
    async fn get_json(
        &self,
        provider_symbol: &str,
        url: &str,
        query: &[(&str, String)],
        with_crumb: bool,
    ) -> Result<Value> {
        for attempt in 1..=self.max_retries {
            self.rate_limiter.until_ready().await;

            let mut request = self.client.get(url).query(query);
            if with_crumb {
                request = request.query(&[("crumb", self.crumb().await?)]);
            }

            let backoff = self.backoff * 2u32.pow(attempt - 1);
            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    if status == StatusCode::NOT_FOUND {
                        return Err(AnalysisError::not_found(provider_symbol));
                    }

                    if status == StatusCode::UNAUTHORIZED && with_crumb {
                        tracing::warn!(
                            "Yahoo rejected crumb for {} (attempt {}/{})",
                            provider_symbol,
                            attempt,
                            self.max_retries
                        );
                        *self.crumb.write().await = None;
                        continue;
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        tracing::warn!(
                            "Yahoo returned {} for {}, retrying in {:?} (attempt {}/{})",
                            status,
                            provider_symbol,
                            backoff,
                            attempt,
                            self.max_retries
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    return Err(AnalysisError::Provider(format!(
                        "Yahoo API error ({}) for {}: {}",
                        status, provider_symbol, body
                    )));
                }
                Err(e) if attempt < self.max_retries => {
                    tracing::warn!(
                        "Network error for {}: {}, retrying in {:?} (attempt {}/{})",
                        provider_symbol,
                        e,
                        backoff,
                        attempt,
                        self.max_retries
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AnalysisError::Provider(format!(
            "Yahoo request for {} failed after {} attempts",
            provider_symbol, self.max_retries
        )))
    }

    /// Cached crumb, fetched after priming the session cookie
    async fn crumb(&self) -> Result<String> {
        if let Some(crumb) = self.crumb.read().await.clone() {
            return Ok(crumb);
        }

        let mut slot = self.crumb.write().await;
        if let Some(crumb) = slot.clone() {
            return Ok(crumb);
        }

        // Only the Set-Cookie header matters; the status is usually 404
        self.rate_limiter.until_ready().await;
        if let Err(e) = self.client.get(&self.cookie_url).send().await {
            tracing::debug!("Cookie request failed: {}", e);
        }

        self.rate_limiter.until_ready().await;
        let response = self
            .client
            .get(format!("{}/v1/test/getcrumb", self.base_url))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        let crumb = body.trim();

        if !status.is_success() || crumb.is_empty() || crumb.len() > 64 || crumb.contains('<') {
            return Err(AnalysisError::Provider(format!(
                "failed to obtain Yahoo crumb ({})",
                status
            )));
        }

        tracing::debug!("Obtained Yahoo crumb");
        *slot = Some(crumb.to_string());
        Ok(crumb.to_string())
    }

    async fn fetch_chart(&self, provider_symbol: &str, range: &str) -> Result<ChartResult> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, provider_symbol);
        let query = [("range", range.to_string()), ("interval", "1d".to_string())];
        let body = self.get_json(provider_symbol, &url, &query, false).await?;

        let response: ChartResponse = serde_json::from_value(body)?;
        response
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| AnalysisError::not_found(provider_symbol))
    }

    /// Latest market price from the chart metadata, if the symbol trades
    async fn market_price(&self, provider_symbol: &str) -> Result<Option<f64>> {
        let chart = self.fetch_chart(provider_symbol, "5d").await?;
        Ok(chart.meta.regular_market_price)
    }
}

fn candles_from_chart(chart: ChartResult) -> Vec<Candle> {
    let quote = chart.indicators.quote.into_iter().next().unwrap_or_default();
    let at = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

    let mut candles: Vec<Candle> = Vec::with_capacity(chart.timestamp.len());
    for (i, &ts) in chart.timestamp.iter().enumerate() {
        let Some(close) = at(&quote.close, i) else {
            continue;
        };
        let Some(date) = DateTime::<Utc>::from_timestamp(ts + chart.meta.gmtoffset, 0)
            .map(|dt| dt.date_naive())
        else {
            continue;
        };
        if candles.last().is_some_and(|prev| prev.date >= date) {
            continue;
        }

        candles.push(Candle {
            date,
            open: at(&quote.open, i).unwrap_or(close),
            high: at(&quote.high, i).unwrap_or(close),
            low: at(&quote.low, i).unwrap_or(close),
            close,
            volume: at(&quote.volume, i).unwrap_or(0.0),
        });
    }
    candles
}

/// Merge quoteSummary modules into one flat camelCase object.
/// `{"raw": x, "fmt": ...}` wrappers collapse to `x`.
fn flatten_summary(result: &Value) -> Map<String, Value> {
    let mut flat = Map::new();
    let Some(modules) = result.as_object() else {
        return flat;
    };

    for module in modules.values().filter_map(Value::as_object) {
        for (key, value) in module {
            let scalar = match value {
                Value::Object(wrapper) => wrapper.get("raw").filter(|raw| raw.is_number()).cloned(),
                Value::Number(_) => Some(value.clone()),
                Value::String(_) if STRING_FIELDS.contains(&key.as_str()) => Some(value.clone()),
                _ => None,
            };
            if let Some(scalar) = scalar {
                flat.entry(key.clone()).or_insert(scalar);
            }
        }
    }
    flat
}

fn timeseries_types() -> Vec<String> {
    let mut types = Vec::new();
    for prefix in ["annual", "quarterly"] {
        for item in LineItem::ALL {
            for alias in item.aliases() {
                types.push(format!("{}{}", prefix, alias.replace(' ', "")));
            }
        }
    }
    types
}

/// Map a timeseries type like `annualNetIncome` back to its frequency,
/// statement and display label
fn resolve_type(type_name: &str) -> Option<(bool, StatementKind, &'static str)> {
    let (annual, compact) = if let Some(rest) = type_name.strip_prefix("annual") {
        (true, rest)
    } else {
        (false, type_name.strip_prefix("quarterly")?)
    };

    LineItem::ALL.iter().find_map(|item| {
        item.aliases()
            .iter()
            .find(|alias| alias.replace(' ', "") == compact)
            .map(|alias| (annual, item.statement(), *alias))
    })
}

fn statements_from_timeseries(body: &Value) -> FinancialStatements {
    type Columns = BTreeMap<NaiveDate, HashMap<String, f64>>;
    let mut grouped: HashMap<(bool, StatementKind), Columns> = HashMap::new();

    let results = body
        .pointer("/timeseries/result")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for result in &results {
        let Some(type_name) = result.pointer("/meta/type/0").and_then(Value::as_str) else {
            continue;
        };
        let Some((annual, kind, label)) = resolve_type(type_name) else {
            continue;
        };
        let Some(points) = result.get(type_name).and_then(Value::as_array) else {
            continue;
        };

        for point in points {
            let date = point
                .get("asOfDate")
                .and_then(Value::as_str)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
            let value = point.pointer("/reportedValue/raw").and_then(Value::as_f64);
            if let (Some(date), Some(value)) = (date, value) {
                grouped
                    .entry((annual, kind))
                    .or_default()
                    .entry(date)
                    .or_default()
                    .insert(label.to_string(), value);
            }
        }
    }

    let mut table = |annual: bool, kind: StatementKind| {
        let columns = grouped
            .remove(&(annual, kind))
            .unwrap_or_default()
            .into_iter()
            .map(|(period_end, values)| StatementColumn { period_end, values })
            .collect();
        StatementTable::new(columns)
    };

    let mut set = |annual: bool| StatementSet {
        income: table(annual, StatementKind::Income),
        balance_sheet: table(annual, StatementKind::BalanceSheet),
        cash_flow: table(annual, StatementKind::CashFlow),
    };

    FinancialStatements {
        annual: set(true),
        quarterly: set(false),
    }
}

impl DataProvider for YahooClient {
    async fn fetch_price_series(
        &self,
        symbol: &str,
        market: Market,
        period: PricePeriod,
    ) -> Result<PriceSeries> {
        let provider_symbol = market.provider_symbol(symbol);
        let chart = self.fetch_chart(&provider_symbol, period.as_str()).await?;
        let candles = candles_from_chart(chart);

        if candles.is_empty() {
            return Err(AnalysisError::not_found(provider_symbol));
        }

        tracing::debug!("Fetched {} daily bars for {}", candles.len(), provider_symbol);
        PriceSeries::new(provider_symbol, candles)
    }

    async fn fetch_snapshot_info(&self, symbol: &str, market: Market) -> Result<SnapshotInfo> {
        let provider_symbol = market.provider_symbol(symbol);
        let url = format!("{}/v10/finance/quoteSummary/{}", self.base_url, provider_symbol);
        let query = [("modules", SUMMARY_MODULES.to_string())];
        let body = self.get_json(&provider_symbol, &url, &query, true).await?;

        let result = body
            .pointer("/quoteSummary/result/0")
            .ok_or_else(|| AnalysisError::not_found(&provider_symbol))?;
        let info: SnapshotInfo = serde_json::from_value(Value::Object(flatten_summary(result)))?;
        let info = info.sanitized();

        if info.regular_market_price.is_none() {
            return Err(AnalysisError::not_found(provider_symbol));
        }
        Ok(info)
    }

    async fn fetch_statements(&self, symbol: &str, market: Market) -> Result<FinancialStatements> {
        let provider_symbol = market.provider_symbol(symbol);
        if self.market_price(&provider_symbol).await?.is_none() {
            return Err(AnalysisError::not_found(provider_symbol));
        }

        let url = format!(
            "{}/ws/fundamentals-timeseries/v1/finance/timeseries/{}",
            self.base_url, provider_symbol
        );
        let query = [
            ("type", timeseries_types().join(",")),
            ("period1", TIMESERIES_START.to_string()),
            ("period2", Utc::now().timestamp().to_string()),
        ];
        let body = self.get_json(&provider_symbol, &url, &query, false).await?;

        let statements = statements_from_timeseries(&body);
        tracing::debug!(
            "Fetched statements for {}: {} annual / {} quarterly income columns",
            provider_symbol,
            statements.annual.income.len(),
            statements.quarterly.income.len()
        );
        Ok(statements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn test_flatten_summary_unwraps_raw() {
        let result = json!({
            "price": {
                "regularMarketPrice": {"raw": 189.5, "fmt": "189.50"},
                "shortName": "Apple Inc.",
                "currency": "USD"
            },
            "summaryDetail": {
                "trailingPE": {"raw": 29.1, "fmt": "29.10"},
                "dividendYield": {},
                "maxAge": 1
            },
            "assetProfile": {"sector": "Technology", "companyOfficers": []}
        });

        let flat = flatten_summary(&result);
        assert_eq!(flat["regularMarketPrice"], json!(189.5));
        assert_eq!(flat["trailingPE"], json!(29.1));
        assert_eq!(flat["shortName"], json!("Apple Inc."));
        assert_eq!(flat["sector"], json!("Technology"));
        assert!(!flat.contains_key("currency"));
        assert!(!flat.contains_key("dividendYield"));
        assert!(!flat.contains_key("companyOfficers"));
    }

    #[test]
    fn test_resolve_type() {
        assert_eq!(
            resolve_type("annualNetIncome"),
            Some((true, StatementKind::Income, "Net Income"))
        );
        assert_eq!(
            resolve_type("quarterlyOrdinarySharesNumber"),
            Some((false, StatementKind::BalanceSheet, "Ordinary Shares Number"))
        );
        assert_eq!(resolve_type("annualSomethingElse"), None);
        assert!(timeseries_types().contains(&"quarterlyOperatingCashFlow".to_string()));
    }

    #[test]
    fn test_statements_from_timeseries() {
        let body = json!({"timeseries": {"result": [
            {
                "meta": {"type": ["annualNetIncome"]},
                "annualNetIncome": [
                    {"asOfDate": "2022-12-31", "reportedValue": {"raw": 80.0}},
                    null,
                    {"asOfDate": "2023-12-31", "reportedValue": {"raw": 100.0}}
                ]
            },
            {
                "meta": {"type": ["annualTotalAssets"]},
                "annualTotalAssets": [
                    {"asOfDate": "2023-12-31", "reportedValue": {"raw": 1000.0}}
                ]
            }
        ]}});

        let statements = statements_from_timeseries(&body);
        let income = &statements.annual.income;
        assert_eq!(income.len(), 2);
        assert_eq!(income.value(0, LineItem::NetIncome), Some(100.0));
        assert_eq!(income.value(1, LineItem::NetIncome), Some(80.0));
        assert_eq!(statements.annual.balance_sheet.value(0, LineItem::TotalAssets), Some(1000.0));
        assert!(statements.quarterly.income.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_price_series_drops_null_closes() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v8/finance/chart/TCS.NS")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("range".into(), "1y".into()),
                Matcher::UrlEncoded("interval".into(), "1d".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({"chart": {"result": [{
                    "meta": {"gmtoffset": 19800, "regularMarketPrice": 3900.0},
                    "timestamp": [1704166200, 1704252600, 1704339000],
                    "indicators": {"quote": [{
                        "open": [3800.0, null, 3850.0],
                        "high": [3850.0, null, 3900.0],
                        "low": [3790.0, null, 3840.0],
                        "close": [3840.0, null, 3890.0],
                        "volume": [1000, null, 1500]
                    }]}
                }], "error": null}})
                .to_string(),
            )
            .create_async()
            .await;

        let client = YahooClient::with_base_url(&server.url()).unwrap();
        let series = client
            .fetch_price_series("tcs", Market::India, PricePeriod::OneYear)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(series.symbol(), "TCS.NS");
        assert_eq!(series.len(), 2);
        assert_eq!(series.closes(), vec![3840.0, 3890.0]);
        assert_eq!(series.volumes(), vec![1000.0, 1500.0]);
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v8/finance/chart/NOPE")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"chart":{"result":null,"error":{"code":"Not Found"}}}"#)
            .create_async()
            .await;

        let client = YahooClient::with_base_url(&server.url()).unwrap();
        let err = client
            .fetch_price_series("NOPE", Market::Us, PricePeriod::OneYear)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("GET", "/v8/finance/chart/AAPL")
            .match_query(Matcher::Any)
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let client = YahooClient::with_base_url(&server.url())
            .unwrap()
            .with_backoff(Duration::from_millis(1));
        let err = client
            .fetch_price_series("AAPL", Market::Us, PricePeriod::OneYear)
            .await
            .unwrap_err();

        failing.assert_async().await;
        assert!(matches!(err, AnalysisError::Provider(_)));
    }

    #[tokio::test]
    async fn test_fetch_snapshot_info_with_crumb() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/").with_status(404).create_async().await;
        let crumb = server
            .mock("GET", "/v1/test/getcrumb")
            .with_status(200)
            .with_body("abc123")
            .expect(1)
            .create_async()
            .await;
        let summary = server
            .mock("GET", "/v10/finance/quoteSummary/AAPL")
            .match_query(Matcher::UrlEncoded("crumb".into(), "abc123".into()))
            .with_status(200)
            .with_body(
                json!({"quoteSummary": {"result": [{
                    "price": {"regularMarketPrice": {"raw": 190.0}, "shortName": "Apple Inc."},
                    "financialData": {"returnOnEquity": {"raw": 1.47}, "currentRatio": {"raw": 0.99}},
                    "defaultKeyStatistics": {"heldPercentInstitutions": {"raw": 0.61}}
                }], "error": null}})
                .to_string(),
            )
            .expect(2)
            .create_async()
            .await;

        let client = YahooClient::with_base_url(&server.url()).unwrap();
        let info = client.fetch_snapshot_info("AAPL", Market::Us).await.unwrap();
        assert_eq!(info.price(), Some(190.0));
        assert_eq!(info.short_name.as_deref(), Some("Apple Inc."));
        assert_eq!(info.return_on_equity, Some(1.47));
        assert_eq!(info.held_percent_institutions, Some(0.61));
        assert!(info.trailing_pe.is_none());

        // Second call reuses the crumb
        client.fetch_snapshot_info("AAPL", Market::Us).await.unwrap();
        crumb.assert_async().await;
        summary.assert_async().await;
    }

    #[tokio::test]
    async fn test_snapshot_without_price_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/").with_status(404).create_async().await;
        server
            .mock("GET", "/v1/test/getcrumb")
            .with_body("abc123")
            .create_async()
            .await;
        server
            .mock("GET", "/v10/finance/quoteSummary/DELISTED.NS")
            .match_query(Matcher::Any)
            .with_body(r#"{"quoteSummary":{"result":[{"price":{"shortName":"Gone"}}],"error":null}}"#)
            .create_async()
            .await;

        let client = YahooClient::with_base_url(&server.url()).unwrap();
        let err = client
            .fetch_snapshot_info("DELISTED", Market::India)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
