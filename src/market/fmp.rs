//! Financial Modeling Prep client.
//!
//! Endpoints used: `/profile/{symbol}` for quotes and profiles, `/search`,
//! `/historical-price-full/{symbol}`, `/quote-short/{a,b,..}` and
//! `/stock-screener`. Every request carries the API key
//! as the `apikey` query parameter and is bounded by the client timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, error, warn};

use super::{MarketData, MarketDataError, PriceLookup, MAX_BATCH_SYMBOLS};
use crate::models::{
    PriceBar, PriceTick, ScreenerFilters, ScreenerRow, StockProfile, StockQuote, SymbolMatch,
};

const SEARCH_LIMIT: &str = "10";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpProfile {
    symbol: Option<String>,
    company_name: Option<String>,
    price: Option<f64>,
    changes: Option<f64>,
    mkt_cap: Option<f64>,
    exchange_short_name: Option<String>,
    beta: Option<f64>,
    open: Option<f64>,
    previous_close: Option<f64>,
    vol_avg: Option<f64>,
    year_high: Option<f64>,
    year_low: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpSearchItem {
    symbol: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    stock_exchange: Option<String>,
    #[serde(default)]
    exchange_short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FmpHistory {
    #[serde(default)]
    historical: Vec<FmpBar>,
}

#[derive(Debug, Deserialize)]
struct FmpBar {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct FmpQuoteShort {
    symbol: String,
    price: Option<f64>,
    #[serde(default)]
    volume: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpScreenerRow {
    symbol: String,
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    market_cap: Option<f64>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    beta: Option<f64>,
    #[serde(default)]
    volume: Option<f64>,
    #[serde(default)]
    exchange_short_name: Option<String>,
    #[serde(default)]
    sector: Option<String>,
}

pub struct FmpClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl FmpClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, MarketDataError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MarketDataError::UpstreamUnavailable(format!("http client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self, segments: &[&str], params: &[(&str, &str)]) -> Result<Url, MarketDataError> {
        let invalid = || MarketDataError::UpstreamUnavailable("invalid provider base url".into());
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        {
            let mut path = url.path_segments_mut().map_err(|_| invalid())?;
            path.pop_if_empty().extend(segments);
        }
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            query.append_pair("apikey", &self.api_key);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, MarketDataError> {
        let path = url.path().to_string();
        debug!("FMP request: {}", path);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                warn!("FMP request to {} timed out", path);
                MarketDataError::UpstreamUnavailable(format!("request to {path} timed out"))
            } else {
                error!("FMP request to {} failed: {}", path, e.without_url());
                MarketDataError::UpstreamUnavailable("provider request failed".into())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            error!("FMP returned HTTP {} for {}", status, path);
            return Err(MarketDataError::UpstreamUnavailable(format!(
                "provider returned HTTP {}",
                status.as_u16()
            )));
        }

        let body = response.text().await.map_err(|e| {
            error!("Failed to read FMP response for {}: {}", path, e.without_url());
            MarketDataError::UpstreamUnavailable("provider response unreadable".into())
        })?;

        serde_json::from_str(&body).map_err(|e| {
            error!("Unexpected FMP payload for {}: {}", path, e);
            MarketDataError::UpstreamUnavailable("unexpected provider payload".into())
        })
    }

    async fn fetch_profile(&self, symbol: &str) -> Result<FmpProfile, MarketDataError> {
        let url = self.endpoint(&["profile", symbol], &[])?;
        let profiles: Vec<FmpProfile> = self.get_json(url).await?;
        first_profile(symbol, profiles)
    }
}

#[async_trait]
impl PriceLookup for FmpClient {
    async fn quote(&self, symbol: &str) -> Result<StockQuote, MarketDataError> {
        let profile = self.fetch_profile(symbol).await?;
        quote_from_profile(symbol, profile)
    }
}

#[async_trait]
impl MarketData for FmpClient {
    async fn profile(&self, symbol: &str) -> Result<StockProfile, MarketDataError> {
        let profile = self.fetch_profile(symbol).await?;
        stock_profile_from(symbol, profile)
    }

    async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>, MarketDataError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MarketDataError::InvalidQuery);
        }
        let url = self.endpoint(&["search"], &[("query", query), ("limit", SEARCH_LIMIT)])?;
        let items: Vec<FmpSearchItem> = self.get_json(url).await?;
        Ok(items.into_iter().map(symbol_match_from).collect())
    }

    async fn history(&self, symbol: &str) -> Result<Vec<PriceBar>, MarketDataError> {
        let url = self.endpoint(&["historical-price-full", symbol], &[])?;
        let history: FmpHistory = self.get_json(url).await?;
        Ok(bars_oldest_first(history))
    }

    async fn quotes(&self, symbols: &[String]) -> Result<Vec<PriceTick>, MarketDataError> {
        if symbols.is_empty() || symbols.len() > MAX_BATCH_SYMBOLS {
            return Err(MarketDataError::InvalidQuery);
        }
        let joined = symbols.join(",");
        let url = self.endpoint(&["quote-short", joined.as_str()], &[])?;
        let rows: Vec<FmpQuoteShort> = self.get_json(url).await?;
        Ok(ticks_from(rows))
    }

    async fn screener(
        &self,
        filters: &ScreenerFilters,
    ) -> Result<Vec<ScreenerRow>, MarketDataError> {
        let params = screener_params(filters);
        let pairs: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let url = self.endpoint(&["stock-screener"], &pairs)?;
        let rows: Vec<FmpScreenerRow> = self.get_json(url).await?;
        Ok(rows.into_iter().map(screener_row_from).collect())
    }
}

fn decimal(value: Option<f64>) -> Option<Decimal> {
    value.and_then(|v| Decimal::try_from(v).ok())
}

fn first_profile(symbol: &str, profiles: Vec<FmpProfile>) -> Result<FmpProfile, MarketDataError> {
    profiles
        .into_iter()
        .next()
        .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))
}

fn quote_from_profile(symbol: &str, profile: FmpProfile) -> Result<StockQuote, MarketDataError> {
    let price = decimal(profile.price)
        .filter(|p| p.is_sign_positive() && !p.is_zero())
        .ok_or_else(|| MarketDataError::UpstreamUnavailable(format!("no price for {symbol}")))?;
    let symbol = profile.symbol.unwrap_or_else(|| symbol.to_string());
    let company_name = profile.company_name.unwrap_or_else(|| symbol.clone());

    Ok(StockQuote {
        symbol,
        company_name,
        price,
    })
}

fn stock_profile_from(symbol: &str, profile: FmpProfile) -> Result<StockProfile, MarketDataError> {
    let changes = decimal(profile.changes);
    let market_cap = decimal(profile.mkt_cap);
    let exchange = profile.exchange_short_name.clone();
    let beta = decimal(profile.beta);
    let open = decimal(profile.open);
    let previous_close = decimal(profile.previous_close);
    let volume_avg = decimal(profile.vol_avg);
    let year_high = decimal(profile.year_high);
    let year_low = decimal(profile.year_low);
    let quote = quote_from_profile(symbol, profile)?;

    Ok(StockProfile {
        symbol: quote.symbol,
        company_name: quote.company_name,
        price: quote.price,
        changes,
        market_cap,
        exchange,
        beta,
        open,
        previous_close,
        volume_avg,
        year_high,
        year_low,
    })
}

fn symbol_match_from(item: FmpSearchItem) -> SymbolMatch {
    SymbolMatch {
        name: item.name.unwrap_or_else(|| item.symbol.clone()),
        symbol: item.symbol,
        currency: item.currency,
        exchange: item.exchange_short_name.or(item.stock_exchange),
    }
}

fn bars_oldest_first(history: FmpHistory) -> Vec<PriceBar> {
    let mut bars: Vec<PriceBar> = history
        .historical
        .into_iter()
        .filter_map(|bar| {
            Some(PriceBar {
                open: decimal(Some(bar.open))?,
                high: decimal(Some(bar.high))?,
                low: decimal(Some(bar.low))?,
                close: decimal(Some(bar.close))?,
                volume: decimal(Some(bar.volume))?,
                time: bar.date,
            })
        })
        .collect();
    // FMP lists newest first
    bars.reverse();
    bars
}

fn ticks_from(rows: Vec<FmpQuoteShort>) -> Vec<PriceTick> {
    rows.into_iter()
        .filter_map(|row| {
            Some(PriceTick {
                price: decimal(row.price)?,
                volume: decimal(row.volume),
                symbol: row.symbol,
            })
        })
        .collect()
}

fn screener_params(filters: &ScreenerFilters) -> Vec<(&'static str, String)> {
    vec![
        ("marketCapMoreThan", filters.market_cap_floor().to_string()),
        ("volumeMoreThan", filters.volume_floor().to_string()),
        ("betaLowerThan", filters.beta_ceiling().normalize().to_string()),
        ("limit", filters.row_limit().to_string()),
    ]
}

fn screener_row_from(row: FmpScreenerRow) -> ScreenerRow {
    ScreenerRow {
        company_name: row.company_name.unwrap_or_else(|| row.symbol.clone()),
        symbol: row.symbol,
        price: decimal(row.price),
        market_cap: decimal(row.market_cap),
        beta: decimal(row.beta),
        volume: decimal(row.volume),
        exchange: row.exchange_short_name,
        sector: row.sector,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn client() -> FmpClient {
        FmpClient::new(
            "https://financialmodelingprep.com/api/v3",
            "secret",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn profiles(json: &str) -> Vec<FmpProfile> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn endpoint_appends_segments_and_key() {
        let url = client()
            .endpoint(&["search"], &[("query", "apple inc"), ("limit", "10")])
            .unwrap();
        assert_eq!(url.path(), "/api/v3/search");
        assert_eq!(url.query(), Some("query=apple+inc&limit=10&apikey=secret"));
    }

    #[test]
    fn endpoint_escapes_symbol_segment() {
        let url = client().endpoint(&["profile", "A/B"], &[]).unwrap();
        assert_eq!(url.path(), "/api/v3/profile/A%2FB");
    }

    #[test]
    fn quote_reads_price_and_name() {
        let mut list = profiles(
            r#"[{"symbol":"AAPL","companyName":"Apple Inc.","price":190.5,"mktCap":2900000000000}]"#,
        );
        let quote = quote_from_profile("AAPL", list.remove(0)).unwrap();
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.company_name, "Apple Inc.");
        assert_eq!(quote.price, dec!(190.5));
    }

    #[test]
    fn empty_profile_list_is_symbol_not_found() {
        let err = first_profile("ZZZZ", profiles("[]")).unwrap_err();
        assert_eq!(err, MarketDataError::SymbolNotFound("ZZZZ".into()));
    }

    #[test]
    fn missing_or_zero_price_is_upstream_failure() {
        let mut list = profiles(r#"[{"symbol":"AAPL","price":0}, {"symbol":"AAPL"}]"#);
        for profile in list.drain(..) {
            let err = quote_from_profile("AAPL", profile).unwrap_err();
            assert!(matches!(err, MarketDataError::UpstreamUnavailable(_)));
        }
    }

    #[test]
    fn profile_maps_optional_metrics() {
        let mut list = profiles(
            r#"[{"symbol":"MSFT","companyName":"Microsoft","price":410.25,"changes":-1.5,
                "exchangeShortName":"NASDAQ","beta":0.9,"volAvg":21000000}]"#,
        );
        let profile = stock_profile_from("MSFT", list.remove(0)).unwrap();
        assert_eq!(profile.price, dec!(410.25));
        assert_eq!(profile.changes, Some(dec!(-1.5)));
        assert_eq!(profile.exchange.as_deref(), Some("NASDAQ"));
        assert_eq!(profile.volume_avg, Some(dec!(21000000)));
        assert_eq!(profile.market_cap, None);
    }

    #[test]
    fn search_prefers_short_exchange_name() {
        let items: Vec<FmpSearchItem> = serde_json::from_str(
            r#"[{"symbol":"AAPL","name":"Apple Inc.","currency":"USD",
                 "stockExchange":"NASDAQ Global Select","exchangeShortName":"NASDAQ"},
                {"symbol":"APLE"}]"#,
        )
        .unwrap();
        let matches: Vec<SymbolMatch> = items.into_iter().map(symbol_match_from).collect();
        assert_eq!(matches[0].exchange.as_deref(), Some("NASDAQ"));
        assert_eq!(matches[1].name, "APLE");
    }

    #[test]
    fn history_is_reversed_to_oldest_first() {
        let history: FmpHistory = serde_json::from_str(
            r#"{"symbol":"AAPL","historical":[
                {"date":"2024-01-03","open":2.0,"high":3.0,"low":1.0,"close":2.5,"volume":100},
                {"date":"2024-01-02","open":1.0,"high":2.0,"low":0.5,"close":1.5,"volume":90}]}"#,
        )
        .unwrap();
        let bars = bars_oldest_first(history);
        assert_eq!(bars[0].time, "2024-01-02");
        assert_eq!(bars[1].close, dec!(2.5));
    }

    #[test]
    fn history_without_series_is_empty() {
        let history: FmpHistory = serde_json::from_str("{}").unwrap();
        assert!(bars_oldest_first(history).is_empty());
    }

    #[test]
    fn quote_short_skips_rows_without_price() {
        let rows: Vec<FmpQuoteShort> = serde_json::from_str(
            r#"[{"symbol":"AAPL","price":190.5,"volume":51000000},
                {"symbol":"MSFT","price":null},
                {"symbol":"TSLA","price":242}]"#,
        )
        .unwrap();
        let ticks = ticks_from(rows);
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].price, dec!(190.5));
        assert_eq!(ticks[0].volume, Some(dec!(51000000)));
        assert_eq!(ticks[1].symbol, "TSLA");
        assert_eq!(ticks[1].volume, None);
    }

    #[test]
    fn batched_quote_url_joins_symbols() {
        let url = client()
            .endpoint(&["quote-short", "AAPL,MSFT,TSLA"], &[])
            .unwrap();
        assert_eq!(url.path(), "/api/v3/quote-short/AAPL,MSFT,TSLA");
    }

    #[tokio::test]
    async fn batched_quotes_reject_empty_and_oversized_lists() {
        let client = client();
        assert_eq!(client.quotes(&[]).await.unwrap_err(), MarketDataError::InvalidQuery);

        let many: Vec<String> = (0..=MAX_BATCH_SYMBOLS).map(|i| format!("S{i}")).collect();
        assert_eq!(client.quotes(&many).await.unwrap_err(), MarketDataError::InvalidQuery);
    }

    #[test]
    fn screener_defaults_match_large_liquid_low_beta() {
        let url_params = screener_params(&ScreenerFilters::default());
        assert_eq!(
            url_params,
            vec![
                ("marketCapMoreThan", "1000000000".to_string()),
                ("volumeMoreThan", "1000000".to_string()),
                ("betaLowerThan", "1.2".to_string()),
                ("limit", "50".to_string()),
            ]
        );

        let custom = ScreenerFilters {
            market_cap_more_than: Some(5_000_000),
            beta_lower_than: Some(dec!(0.80)),
            limit: Some(1000),
            ..Default::default()
        };
        let url_params = screener_params(&custom);
        assert_eq!(url_params[0].1, "5000000");
        assert_eq!(url_params[2].1, "0.8");
        assert_eq!(url_params[3].1, "100");
    }

    #[test]
    fn screener_rows_map_provider_fields() {
        let rows: Vec<FmpScreenerRow> = serde_json::from_str(
            r#"[{"symbol":"KO","companyName":"Coca-Cola","marketCap":260000000000,
                 "price":60.1,"beta":0.75,"volume":12000000,
                 "exchangeShortName":"NYSE","sector":"Consumer Defensive"},
                {"symbol":"XYZ"}]"#,
        )
        .unwrap();
        let rows: Vec<ScreenerRow> = rows.into_iter().map(screener_row_from).collect();
        assert_eq!(rows[0].company_name, "Coca-Cola");
        assert_eq!(rows[0].beta, Some(dec!(0.75)));
        assert_eq!(rows[0].exchange.as_deref(), Some("NYSE"));
        assert_eq!(rows[1].company_name, "XYZ");
        assert_eq!(rows[1].price, None);
    }
}
