use crate::config::Settings;
use crate::ingest::types::{
    AnalystEstimates, CompanyInfo, NewsItem, NextEarningsResponse, PriceBar,
};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
// Provider calls are not retried unless configured.
const DEFAULT_RETRIES: u32 = 1;
const MAX_BACKOFF_EXPONENT: u32 = 6;

/// External market-data feed. Any call may fail or come back partial; callers treat
/// an error the same as an absent value for the ticker concerned.
#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn current_info(&self, ticker: &str) -> Result<CompanyInfo>;

    async fn analyst_estimates(&self, ticker: &str) -> Result<Option<AnalystEstimates>>;

    async fn next_earnings_date(&self, ticker: &str) -> Result<Option<NaiveDate>>;

    async fn price_history(&self, ticker: &str, days: u32) -> Result<Vec<PriceBar>>;

    async fn ticker_news(&self, ticker: &str, limit: u32) -> Result<Vec<NewsItem>>;
}

/// Client for a JSON market-data gateway exposing `/v1/{info,estimates,earnings,prices,news}/{ticker}`.
#[derive(Debug, Clone)]
pub struct HttpJsonProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retries: u32,
}

impl HttpJsonProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_data_provider_base_url()?.to_string();
        let api_key = settings.data_provider_api_key.clone();

        let timeout_secs = std::env::var("DATA_PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("DATA_PROVIDER_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES)
            .max(1);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build data provider http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            retries,
        })
    }

    fn url(&self, resource: &str, ticker: &str) -> String {
        format!(
            "{}/v1/{}/{}",
            self.base_url.trim_end_matches('/'),
            resource,
            ticker.trim().to_ascii_uppercase()
        )
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    /// `Ok(None)` on 404, the parsed body on success, an error otherwise.
    async fn get_once<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        let res = self
            .http
            .get(url)
            .headers(self.headers()?)
            .query(query)
            .send()
            .await
            .with_context(|| format!("data provider request failed: {url}"))?;

        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let text = res
            .text()
            .await
            .context("failed to read provider response")?;

        if !status.is_success() {
            anyhow::bail!("data provider HTTP {status} for {url}: {text}");
        }

        let parsed = serde_json::from_str::<T>(&text)
            .with_context(|| format!("unexpected provider response shape from {url}: {text}"))?;
        Ok(Some(parsed))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.get_once(&url, query).await {
                Ok(v) => return Ok(v),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = backoff_for(attempt);
                    tracing::warn!(attempt, ?backoff, error = %err, "data provider fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

// Doubles per failed attempt: 1s, 2s, 4s, ... capped at 64s.
fn backoff_for(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT))
}

#[async_trait::async_trait]
impl MarketDataProvider for HttpJsonProvider {
    fn provider_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn current_info(&self, ticker: &str) -> Result<CompanyInfo> {
        self.get::<CompanyInfo>(self.url("info", ticker), &[])
            .await?
            .with_context(|| format!("no company info for {ticker}"))
    }

    async fn analyst_estimates(&self, ticker: &str) -> Result<Option<AnalystEstimates>> {
        self.get(self.url("estimates", ticker), &[]).await
    }

    async fn next_earnings_date(&self, ticker: &str) -> Result<Option<NaiveDate>> {
        let res: Option<NextEarningsResponse> =
            self.get(self.url("earnings", ticker), &[]).await?;
        Ok(res.and_then(|r| r.report_date))
    }

    async fn price_history(&self, ticker: &str, days: u32) -> Result<Vec<PriceBar>> {
        let bars: Option<Vec<PriceBar>> = self
            .get(self.url("prices", ticker), &[("days", days.to_string())])
            .await?;
        Ok(bars.unwrap_or_default())
    }

    async fn ticker_news(&self, ticker: &str, limit: u32) -> Result<Vec<NewsItem>> {
        let items: Option<Vec<NewsItem>> = self
            .get(self.url("news", ticker), &[("limit", limit.to_string())])
            .await?;
        Ok(items.unwrap_or_default())
    }
}
