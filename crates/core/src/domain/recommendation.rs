use crate::domain::error::InvalidEnumValue;
use crate::domain::watchlist::Stance;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl RecommendationCategory {
    pub const ALLOWED: &'static [&'static str] =
        &["strong_buy", "buy", "hold", "sell", "strong_sell"];

    /// Thresholds are checked high to low; the first bound the score reaches wins.
    pub fn from_raw_score(raw_score: f64) -> Self {
        if raw_score >= 8.0 {
            RecommendationCategory::StrongBuy
        } else if raw_score >= 6.5 {
            RecommendationCategory::Buy
        } else if raw_score >= 4.0 {
            RecommendationCategory::Hold
        } else if raw_score >= 2.5 {
            RecommendationCategory::Sell
        } else {
            RecommendationCategory::StrongSell
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecommendationCategory::StrongBuy => "strong_buy",
            RecommendationCategory::Buy => "buy",
            RecommendationCategory::Hold => "hold",
            RecommendationCategory::Sell => "sell",
            RecommendationCategory::StrongSell => "strong_sell",
        }
    }
}

impl FromStr for RecommendationCategory {
    type Err = InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strong_buy" => Ok(RecommendationCategory::StrongBuy),
            "buy" => Ok(RecommendationCategory::Buy),
            "hold" => Ok(RecommendationCategory::Hold),
            "sell" => Ok(RecommendationCategory::Sell),
            "strong_sell" => Ok(RecommendationCategory::StrongSell),
            _ => Err(InvalidEnumValue::new("recommendation", s, Self::ALLOWED)),
        }
    }
}

impl fmt::Display for RecommendationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the signal aggregator for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub category: RecommendationCategory,
    pub confidence: f64,
    pub raw_score: f64,
    pub factors: Vec<String>,
}

impl RecommendationResult {
    pub fn rationale(&self) -> String {
        if self.factors.is_empty() {
            "Insufficient data".to_string()
        } else {
            self.factors.join("; ")
        }
    }
}

/// A persisted recommendation; one per `(ticker, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub ticker: String,
    pub date: NaiveDate,
    pub recommendation: RecommendationCategory,
    pub confidence: f64,
    pub rationale: String,
    pub factors: Vec<String>,
}

impl Recommendation {
    pub fn from_result(ticker: &str, date: NaiveDate, result: &RecommendationResult) -> Self {
        Self {
            ticker: ticker.to_string(),
            date,
            recommendation: result.category,
            confidence: result.confidence,
            rationale: result.rationale(),
            factors: result.factors.clone(),
        }
    }
}

/// Latest recommendation for a ticker joined with its active watchlist entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchedRecommendation {
    #[serde(flatten)]
    pub recommendation: Recommendation,
    pub name: String,
    pub stance: Stance,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_inclusive_from_below() {
        use RecommendationCategory::*;
        assert_eq!(RecommendationCategory::from_raw_score(8.0), StrongBuy);
        assert_eq!(RecommendationCategory::from_raw_score(7.999), Buy);
        assert_eq!(RecommendationCategory::from_raw_score(6.5), Buy);
        assert_eq!(RecommendationCategory::from_raw_score(6.499), Hold);
        assert_eq!(RecommendationCategory::from_raw_score(4.0), Hold);
        assert_eq!(RecommendationCategory::from_raw_score(2.5), Sell);
        assert_eq!(RecommendationCategory::from_raw_score(2.4999), StrongSell);
    }

    #[test]
    fn scores_outside_nominal_scale_still_categorize() {
        use RecommendationCategory::*;
        assert_eq!(RecommendationCategory::from_raw_score(11.5), StrongBuy);
        assert_eq!(RecommendationCategory::from_raw_score(-1.0), StrongSell);
    }

    #[test]
    fn category_round_trips_through_its_name() {
        for name in RecommendationCategory::ALLOWED {
            let c: RecommendationCategory = name.parse().unwrap();
            assert_eq!(c.as_str(), *name);
        }
        assert!("accumulate".parse::<RecommendationCategory>().is_err());
    }

    #[test]
    fn rationale_falls_back_when_no_factors() {
        let r = RecommendationResult {
            category: RecommendationCategory::Hold,
            confidence: 0.3,
            raw_score: 5.0,
            factors: vec![],
        };
        assert_eq!(r.rationale(), "Insufficient data");

        let r = RecommendationResult {
            factors: vec!["a".into(), "b".into()],
            ..r
        };
        assert_eq!(r.rationale(), "a; b");
    }
}
