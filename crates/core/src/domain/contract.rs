//! Loosely typed records accepted from import files, validated into domain types
//! before anything reaches the store.

use crate::domain::signal::{Sentiment, SignalObservation};
use crate::domain::trade::{NewTrade, TradeAction};
use crate::domain::watchlist::{normalize_ticker, Stance};
use anyhow::{ensure, Context};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistImport {
    pub ticker: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub stance: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Validated watchlist input. Name and sector stay empty when the caller left them out.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWatchlistEntry {
    pub ticker: String,
    pub name: String,
    pub sector: String,
    pub stance: Stance,
    pub notes: String,
}

impl WatchlistImport {
    pub fn validate_and_into_entry(self) -> anyhow::Result<NewWatchlistEntry> {
        let ticker = normalize_ticker(&self.ticker);
        ensure!(!ticker.is_empty(), "ticker must be non-empty");

        let stance = match self.stance.as_deref() {
            Some(s) => s.parse::<Stance>()?,
            None => Stance::Watch,
        };

        Ok(NewWatchlistEntry {
            ticker,
            name: trimmed_or_empty(self.name),
            sector: trimmed_or_empty(self.sector),
            stance,
            notes: trimmed_or_empty(self.notes),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalImport {
    pub ticker: String,
    pub source: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub raw_data: Option<serde_json::Value>,
}

impl SignalImport {
    /// `default_date` is used when the record carries no date.
    pub fn validate_and_into_observation(
        self,
        default_date: NaiveDate,
    ) -> anyhow::Result<SignalObservation> {
        let ticker = normalize_ticker(&self.ticker);
        ensure!(!ticker.is_empty(), "ticker must be non-empty");

        let source = self.source.trim().to_ascii_lowercase();
        ensure!(!source.is_empty(), "source must be non-empty");

        if let Some(score) = self.score {
            ensure!(score.is_finite(), "score must be finite (got {score})");
        }

        let sentiment = self
            .sentiment
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<Sentiment>)
            .transpose()?;

        ensure!(
            self.score.is_some() || sentiment.is_some(),
            "signal for {ticker} from {source} carries neither score nor sentiment"
        );

        Ok(SignalObservation {
            ticker,
            date: parse_optional_date(self.date.as_deref(), default_date)?,
            source,
            score: self.score,
            sentiment,
            raw_data: self.raw_data,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeImport {
    pub ticker: String,
    pub action: String,
    pub price: f64,
    pub shares: i64,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub thesis: Option<String>,
}

impl TradeImport {
    pub fn validate_and_into_trade(self, default_date: NaiveDate) -> anyhow::Result<NewTrade> {
        let ticker = normalize_ticker(&self.ticker);
        ensure!(!ticker.is_empty(), "ticker must be non-empty");

        let action = self.action.parse::<TradeAction>()?;
        ensure!(
            self.price.is_finite() && self.price > 0.0,
            "price must be positive (got {})",
            self.price
        );
        ensure!(self.shares > 0, "shares must be positive (got {})", self.shares);

        let thesis = self
            .thesis
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(NewTrade {
            ticker,
            action,
            date: parse_optional_date(self.date.as_deref(), default_date)?,
            price: self.price,
            shares: self.shares,
            thesis,
        })
    }
}

fn trimmed_or_empty(v: Option<String>) -> String {
    v.map(|s| s.trim().to_string()).unwrap_or_default()
}

fn parse_optional_date(s: Option<&str>, default_date: NaiveDate) -> anyhow::Result<NaiveDate> {
    match s.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid date {s:?} (expected YYYY-MM-DD)")),
        None => Ok(default_date),
    }
}
