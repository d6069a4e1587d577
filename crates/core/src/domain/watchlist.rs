use crate::domain::error::InvalidEnumValue;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Buy,
    Hold,
    Sell,
    Watch,
}

impl Stance {
    pub const ALLOWED: &'static [&'static str] = &["buy", "hold", "sell", "watch"];

    pub fn as_str(self) -> &'static str {
        match self {
            Stance::Buy => "buy",
            Stance::Hold => "hold",
            Stance::Sell => "sell",
            Stance::Watch => "watch",
        }
    }
}

impl FromStr for Stance {
    type Err = InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Stance::Buy),
            "hold" => Ok(Stance::Hold),
            "sell" => Ok(Stance::Sell),
            "watch" => Ok(Stance::Watch),
            _ => Err(InvalidEnumValue::new("stance", s, Self::ALLOWED)),
        }
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked ticker. Entries are never hard-deleted; `active = false` hides them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub ticker: String,
    pub name: String,
    pub sector: String,
    pub stance: Stance,
    pub added_date: NaiveDate,
    pub notes: String,
    pub active: bool,
}

pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_ascii_uppercase()
}
