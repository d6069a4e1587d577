//! Deterministic reduction of a ticker's latest signals and analyst estimates into a
//! recommendation.
//!
//! Scoring starts from a neutral 5.0 and sums the delta of every [`Contribution`]. The
//! collection order of contributions is the display order of the resulting factors:
//! primary-source tiers, then sentiments in signal order, then analyst consensus, then
//! earnings growth.
//!
//! A single observation from the primary source that carries both a score and a
//! sentiment contributes twice, once per facet.

use crate::domain::recommendation::{RecommendationCategory, RecommendationResult};
use crate::domain::signal::{Sentiment, SignalObservation};
use crate::ingest::types::AnalystEstimates;

pub const NEUTRAL_SCORE: f64 = 5.0;

const CONFIDENCE_FLOOR: f64 = 0.3;
const CONFIDENCE_PER_FACTOR: f64 = 0.15;
const CONFIDENCE_CAP: f64 = 0.95;

pub const DEFAULT_PRIMARY_SOURCE: &str = "danelfin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringConfig {
    /// Source whose numeric score feeds the tiered adjustment.
    pub primary_source: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            primary_source: DEFAULT_PRIMARY_SOURCE.to_string(),
        }
    }
}

impl ScoringConfig {
    pub fn new(primary_source: &str) -> Self {
        Self {
            primary_source: primary_source.trim().to_ascii_lowercase(),
        }
    }

    fn is_primary(&self, source: &str) -> bool {
        source.eq_ignore_ascii_case(&self.primary_source)
    }
}

/// One independent input to the score.
#[derive(Debug, Clone, PartialEq)]
pub enum Contribution<'a> {
    QuantTier { source: &'a str, score: f64 },
    Sentiment { source: &'a str, sentiment: Sentiment },
    Consensus { rating: String },
    EarningsGrowth { growth: f64 },
}

impl Contribution<'_> {
    /// The score delta and factor text, or `None` when the input falls in a neutral band.
    pub fn evaluate(&self) -> Option<(f64, String)> {
        match self {
            Contribution::QuantTier { source, score } => {
                let score = *score;
                let (delta, tier) = if score >= 8.0 {
                    (2.0, "Strong")
                } else if score >= 6.0 {
                    (1.0, "Good")
                } else if score <= 3.0 {
                    (-2.0, "Weak")
                } else if score <= 5.0 {
                    (-1.0, "Below-average")
                } else {
                    return None;
                };
                Some((
                    delta,
                    format!(
                        "{tier} {} score ({}/10)",
                        capitalize(source),
                        format_score(score)
                    ),
                ))
            }
            Contribution::Sentiment { source, sentiment } => match sentiment {
                Sentiment::Bullish => Some((0.5, format!("Bullish {source} sentiment"))),
                Sentiment::Bearish => Some((-0.5, format!("Bearish {source} sentiment"))),
                Sentiment::Neutral => None,
            },
            Contribution::Consensus { rating } => match rating.as_str() {
                "strong_buy" | "buy" => Some((1.0, format!("Analyst consensus: {rating}"))),
                "sell" | "strong_sell" => Some((-1.0, format!("Analyst consensus: {rating}"))),
                _ => None,
            },
            Contribution::EarningsGrowth { growth } => {
                let pct = growth * 100.0;
                if *growth > 0.20 {
                    Some((0.5, format!("Strong earnings growth ({pct:.0}%)")))
                } else if *growth < -0.10 {
                    Some((-0.5, format!("Negative earnings growth ({pct:.0}%)")))
                } else {
                    None
                }
            }
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whole scores keep one decimal place (`9.0`), fractional ones print as-is (`8.25`).
fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{score:.1}")
    } else {
        score.to_string()
    }
}

/// Lists every candidate contribution in factor display order.
pub fn contributions<'a>(
    signals: &'a [SignalObservation],
    estimates: Option<&AnalystEstimates>,
    config: &ScoringConfig,
) -> Vec<Contribution<'a>> {
    let mut out = Vec::new();

    for signal in signals.iter().filter(|s| config.is_primary(&s.source)) {
        if let Some(score) = signal.score.filter(|s| s.is_finite()) {
            out.push(Contribution::QuantTier {
                source: &signal.source,
                score,
            });
        }
    }

    for signal in signals {
        if let Some(sentiment) = signal.sentiment {
            out.push(Contribution::Sentiment {
                source: &signal.source,
                sentiment,
            });
        }
    }

    if let Some(est) = estimates {
        if let Some(rating) = est.recommendation.as_deref() {
            out.push(Contribution::Consensus {
                rating: rating.trim().to_ascii_lowercase(),
            });
        }
        if let Some(growth) = est.earnings_growth.filter(|g| g.is_finite()) {
            out.push(Contribution::EarningsGrowth { growth });
        }
    }

    out
}

pub fn confidence_for(factor_count: usize) -> f64 {
    (CONFIDENCE_FLOOR + CONFIDENCE_PER_FACTOR * factor_count as f64).min(CONFIDENCE_CAP)
}

/// Scores one ticker. Pure: the same inputs always produce the same result.
pub fn score(
    ticker: &str,
    latest_signals: &[SignalObservation],
    estimates: Option<&AnalystEstimates>,
    config: &ScoringConfig,
) -> RecommendationResult {
    let (raw_score, factors) = contributions(latest_signals, estimates, config)
        .iter()
        .filter_map(Contribution::evaluate)
        .fold(
            (NEUTRAL_SCORE, Vec::new()),
            |(total, mut factors), (delta, factor)| {
                factors.push(factor);
                (total + delta, factors)
            },
        );

    let result = RecommendationResult {
        category: RecommendationCategory::from_raw_score(raw_score),
        confidence: confidence_for(factors.len()),
        raw_score,
        factors,
    };

    tracing::debug!(
        %ticker,
        signals = latest_signals.len(),
        has_estimates = estimates.is_some(),
        raw_score = result.raw_score,
        category = %result.category,
        "scored ticker"
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const EPS: f64 = 1e-9;

    fn obs(source: &str, score: Option<f64>, sentiment: Option<Sentiment>) -> SignalObservation {
        SignalObservation {
            ticker: "NVDA".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 10, 12).unwrap(),
            source: source.to_string(),
            score,
            sentiment,
            raw_data: None,
        }
    }

    fn estimates(rec: Option<&str>, growth: Option<f64>) -> AnalystEstimates {
        AnalystEstimates {
            recommendation: rec.map(str::to_string),
            earnings_growth: growth,
            ..Default::default()
        }
    }

    fn delta(c: Contribution<'_>) -> Option<f64> {
        c.evaluate().map(|(d, _)| d)
    }

    #[test]
    fn empty_input_is_neutral_hold_at_confidence_floor() {
        let r = score("NVDA", &[], None, &ScoringConfig::default());
        assert_eq!(r.category, RecommendationCategory::Hold);
        assert!((r.raw_score - 5.0).abs() < EPS);
        assert!((r.confidence - 0.3).abs() < EPS);
        assert!(r.factors.is_empty());
    }

    #[test]
    fn quant_tier_bands() {
        let tier = |score| delta(Contribution::QuantTier { source: "danelfin", score });
        assert_eq!(tier(10.0), Some(2.0));
        assert_eq!(tier(8.0), Some(2.0));
        assert_eq!(tier(7.9), Some(1.0));
        assert_eq!(tier(6.0), Some(1.0));
        assert_eq!(tier(5.5), None);
        assert_eq!(tier(5.0), Some(-1.0));
        assert_eq!(tier(3.1), Some(-1.0));
        assert_eq!(tier(3.0), Some(-2.0));
        assert_eq!(tier(0.0), Some(-2.0));
    }

    #[test]
    fn sentiment_contributions() {
        let s = |sentiment| delta(Contribution::Sentiment { source: "toggle", sentiment });
        assert_eq!(s(Sentiment::Bullish), Some(0.5));
        assert_eq!(s(Sentiment::Bearish), Some(-0.5));
        assert_eq!(s(Sentiment::Neutral), None);
    }

    #[test]
    fn consensus_contributions() {
        let c = |rating: &str| delta(Contribution::Consensus { rating: rating.to_string() });
        assert_eq!(c("strong_buy"), Some(1.0));
        assert_eq!(c("buy"), Some(1.0));
        assert_eq!(c("hold"), None);
        assert_eq!(c("sell"), Some(-1.0));
        assert_eq!(c("strong_sell"), Some(-1.0));
        assert_eq!(c("underperform"), None);
    }

    #[test]
    fn growth_contributions_and_factor_text() {
        let strong = Contribution::EarningsGrowth { growth: 0.25 }.evaluate().unwrap();
        assert_eq!(strong, (0.5, "Strong earnings growth (25%)".to_string()));

        let negative = Contribution::EarningsGrowth { growth: -0.15 }.evaluate().unwrap();
        assert_eq!(negative, (-0.5, "Negative earnings growth (-15%)".to_string()));

        assert_eq!(delta(Contribution::EarningsGrowth { growth: 0.20 }), None);
        assert_eq!(delta(Contribution::EarningsGrowth { growth: -0.10 }), None);
    }

    #[test]
    fn fully_bullish_scenario() {
        let signals = vec![obs("danelfin", Some(9.0), Some(Sentiment::Bullish))];
        let est = estimates(Some("buy"), Some(0.25));

        let r = score("NVDA", &signals, Some(&est), &ScoringConfig::default());
        assert!((r.raw_score - 9.0).abs() < EPS);
        assert_eq!(r.category, RecommendationCategory::StrongBuy);
        assert!((r.confidence - 0.9).abs() < EPS);
        assert_eq!(
            r.factors,
            vec![
                "Strong Danelfin score (9.0/10)",
                "Bullish danelfin sentiment",
                "Analyst consensus: buy",
                "Strong earnings growth (25%)",
            ]
        );
    }

    #[test]
    fn weak_primary_score_alone_is_sell() {
        let signals = vec![obs("danelfin", Some(2.0), None)];
        let r = score("NVDA", &signals, None, &ScoringConfig::default());
        assert!((r.raw_score - 3.0).abs() < EPS);
        assert_eq!(r.category, RecommendationCategory::Sell);
        assert!((r.confidence - 0.45).abs() < EPS);
    }

    #[test]
    fn sentiment_only_primary_skips_tier() {
        let signals = vec![obs("danelfin", None, Some(Sentiment::Bearish))];
        let r = score("NVDA", &signals, None, &ScoringConfig::default());
        assert!((r.raw_score - 4.5).abs() < EPS);
        assert_eq!(r.factors, vec!["Bearish danelfin sentiment"]);
    }

    #[test]
    fn non_primary_scores_are_ignored() {
        let signals = vec![obs("toggle", Some(9.5), None)];
        let r = score("NVDA", &signals, None, &ScoringConfig::default());
        assert!((r.raw_score - 5.0).abs() < EPS);
        assert!(r.factors.is_empty());

        let r = score("NVDA", &signals, None, &ScoringConfig::new("Toggle"));
        assert!((r.raw_score - 7.0).abs() < EPS);
    }

    #[test]
    fn primary_observation_with_both_facets_counts_twice() {
        let signals = vec![obs("danelfin", Some(6.0), Some(Sentiment::Bullish))];
        let r = score("NVDA", &signals, None, &ScoringConfig::default());
        assert_eq!(r.factors.len(), 2);
        assert!((r.raw_score - 6.5).abs() < EPS);
        assert_eq!(r.category, RecommendationCategory::Buy);
    }

    #[test]
    fn factor_order_puts_tier_before_sentiments() {
        let signals = vec![
            obs("analyst_notes", None, Some(Sentiment::Bearish)),
            obs("danelfin", Some(8.5), Some(Sentiment::Bullish)),
            obs("toggle", None, Some(Sentiment::Bullish)),
        ];
        let est = estimates(Some("Strong_Sell"), Some(-0.3));

        let r = score("NVDA", &signals, Some(&est), &ScoringConfig::default());
        assert_eq!(
            r.factors,
            vec![
                "Strong Danelfin score (8.5/10)",
                "Bearish analyst_notes sentiment",
                "Bullish danelfin sentiment",
                "Bullish toggle sentiment",
                "Analyst consensus: strong_sell",
                "Negative earnings growth (-30%)",
            ]
        );
        // 5 + 2 - 0.5 + 0.5 + 0.5 - 1 - 0.5
        assert!((r.raw_score - 6.0).abs() < EPS);
    }

    #[test]
    fn numeric_result_is_order_independent() {
        let mut signals = vec![
            obs("danelfin", Some(4.0), Some(Sentiment::Bullish)),
            obs("toggle", None, Some(Sentiment::Bearish)),
            obs("manual", Some(1.0), Some(Sentiment::Bearish)),
        ];
        let est = estimates(Some("buy"), Some(0.4));
        let cfg = ScoringConfig::default();

        let forward = score("NVDA", &signals, Some(&est), &cfg);
        signals.reverse();
        let backward = score("NVDA", &signals, Some(&est), &cfg);

        assert!((forward.raw_score - backward.raw_score).abs() < EPS);
        assert_eq!(forward.category, backward.category);
        assert!((forward.confidence - backward.confidence).abs() < EPS);
    }

    #[test]
    fn conflicting_signals_still_raise_confidence() {
        let signals = vec![
            obs("toggle", None, Some(Sentiment::Bullish)),
            obs("manual", None, Some(Sentiment::Bearish)),
        ];
        let r = score("NVDA", &signals, None, &ScoringConfig::default());
        assert!((r.raw_score - 5.0).abs() < EPS);
        assert!((r.confidence - 0.6).abs() < EPS);
    }

    #[test]
    fn confidence_is_monotonic_and_capped() {
        let mut prev = 0.0;
        for n in 0..20 {
            let c = confidence_for(n);
            assert!(c >= prev);
            assert!(c <= 0.95 + EPS);
            prev = c;
        }
        assert!((confidence_for(5) - 0.95).abs() < EPS);
        assert!((confidence_for(12) - 0.95).abs() < EPS);
    }

    #[test]
    fn neutral_bands_add_no_factors() {
        let signals = vec![obs("danelfin", Some(5.5), Some(Sentiment::Neutral))];
        let est = estimates(Some("hold"), Some(0.05));
        let r = score("NVDA", &signals, Some(&est), &ScoringConfig::default());
        assert!(r.factors.is_empty());
        assert!((r.confidence - 0.3).abs() < EPS);
    }

    #[test]
    fn tier_factor_names_source_and_keeps_a_decimal() {
        let text = |score| {
            Contribution::QuantTier { source: "danelfin", score }
                .evaluate()
                .map(|(_, t)| t)
        };
        assert_eq!(text(9.0).as_deref(), Some("Strong Danelfin score (9.0/10)"));
        assert_eq!(text(6.25).as_deref(), Some("Good Danelfin score (6.25/10)"));
        assert_eq!(text(0.0).as_deref(), Some("Weak Danelfin score (0.0/10)"));
    }
}
