use crate::domain::error::InvalidEnumValue;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeAction {
    Buy,
    Sell,
    Trim,
    Add,
}

impl TradeAction {
    pub const ALLOWED: &'static [&'static str] = &["buy", "sell", "trim", "add"];

    pub fn as_str(self) -> &'static str {
        match self {
            TradeAction::Buy => "buy",
            TradeAction::Sell => "sell",
            TradeAction::Trim => "trim",
            TradeAction::Add => "add",
        }
    }
}

impl FromStr for TradeAction {
    type Err = InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(TradeAction::Buy),
            "sell" => Ok(TradeAction::Sell),
            "trim" => Ok(TradeAction::Trim),
            "add" => Ok(TradeAction::Add),
            _ => Err(InvalidEnumValue::new("action", s, Self::ALLOWED)),
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrade {
    pub ticker: String,
    pub action: TradeAction,
    pub date: NaiveDate,
    pub price: f64,
    pub shares: i64,
    pub thesis: Option<String>,
}

/// A journal entry. Open while `closed_date` is unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    pub ticker: String,
    pub action: TradeAction,
    pub date: NaiveDate,
    pub price: f64,
    pub shares: i64,
    pub thesis: Option<String>,
    /// Latest signals at the time the trade was logged. Never rewritten.
    pub signals_snapshot: Option<serde_json::Value>,
    pub outcome_notes: Option<String>,
    pub outcome_return: Option<f64>,
    pub closed_date: Option<NaiveDate>,
}

impl Trade {
    pub fn is_open(&self) -> bool {
        self.closed_date.is_none()
    }
}
