use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const YAHOO_API_BASE: &str = "https://query2.finance.yahoo.com";
const REQUEST_TIMEOUT_SECS: u64 = 10;
const RATE_LIMIT_RPM: u32 = 120;
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) pulsetrade-worker";

type YahooRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Most recent short-interval observation for a symbol
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub volume: f64,
}

/// Source of latest bars, implemented by [`YahooClient`]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn latest_bar(&self, symbol: &str) -> Result<Bar>;
}

/// Source of recent news headlines, implemented by [`YahooClient`]
#[async_trait]
pub trait HeadlineSource: Send + Sync {
    async fn headlines(&self, symbol: &str, limit: usize) -> Result<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news: Option<Vec<NewsItem>>,
}

#[derive(Debug, Deserialize)]
struct NewsItem {
    #[serde(default)]
    title: String,
}

/// Yahoo Finance client for 1-minute bars and news headlines
///
/// Cloneable; all clones share one rate limiter. Every request is a single
/// attempt bounded by a 10 second timeout.
#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    base_url: String,
    rate_limiter: Arc<YahooRateLimiter>,
}

impl YahooClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(YAHOO_API_BASE)
    }

    /// Point the client at another host (used by tests against a mock server)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        let quota =
            Quota::per_minute(NonZeroU32::new(RATE_LIMIT_RPM).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Yahoo API error ({}): {}", status, body);
        }

        Ok(response)
    }

    /// Fetch today's 1-minute chart and return its latest complete row
    pub async fn fetch_latest_bar(&self, symbol: &str) -> Result<Bar> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let response: ChartResponse = self
            .get(&url, &[("interval", "1m"), ("range", "1d")])
            .await?
            .json()
            .await
            .context("Failed to parse chart response")?;

        if let Some(err) = response.chart.error {
            anyhow::bail!("Yahoo chart error for {}: {} ({})", symbol, err.description, err.code);
        }

        let result = response
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .with_context(|| format!("No chart data for {}", symbol))?;

        latest_complete_row(&result).with_context(|| format!("No priced bar for {}", symbol))
    }

    /// Fetch up to `limit` news headline titles for a plain symbol
    pub async fn fetch_headlines(&self, symbol: &str, limit: usize) -> Result<Vec<String>> {
        let url = format!("{}/v1/finance/search", self.base_url);
        let news_count = limit.to_string();
        let response: SearchResponse = self
            .get(
                &url,
                &[("q", symbol), ("quotesCount", "0"), ("newsCount", &news_count)],
            )
            .await?
            .json()
            .await
            .context("Failed to parse search response")?;

        Ok(response
            .news
            .unwrap_or_default()
            .into_iter()
            .map(|n| n.title)
            .take(limit)
            .collect())
    }
}

/// Walk back from the newest row to the first one carrying a close price
fn latest_complete_row(result: &ChartResult) -> Option<Bar> {
    let quote = result.indicators.quote.first()?;
    let rows = result.timestamp.len().min(quote.close.len());

    (0..rows).rev().find_map(|i| {
        let close = quote.close[i]?;
        let volume = quote.volume.get(i).copied().flatten().unwrap_or(0.0);
        let timestamp = Utc.timestamp_opt(result.timestamp[i], 0).single()?;
        Some(Bar {
            timestamp,
            close,
            volume,
        })
    })
}

#[async_trait]
impl MarketDataSource for YahooClient {
    async fn latest_bar(&self, symbol: &str) -> Result<Bar> {
        self.fetch_latest_bar(symbol).await
    }
}

#[async_trait]
impl HeadlineSource for YahooClient {
    async fn headlines(&self, symbol: &str, limit: usize) -> Result<Vec<String>> {
        self.fetch_headlines(symbol, limit).await
    }
}
