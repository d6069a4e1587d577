use crate::domain::watchlist::Stance;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EarningsEvent {
    pub ticker: String,
    pub report_date: NaiveDate,
    pub fiscal_quarter: Option<String>,
    pub estimate_eps: Option<f64>,
    pub actual_eps: Option<f64>,
    pub surprise_pct: Option<f64>,
    pub estimate_revenue: Option<f64>,
    pub actual_revenue: Option<f64>,
    pub guidance: Option<String>,
    pub notes: Option<String>,
}

impl EarningsEvent {
    pub fn new(ticker: &str, report_date: NaiveDate) -> Self {
        Self {
            ticker: ticker.to_string(),
            report_date,
            fiscal_quarter: None,
            estimate_eps: None,
            actual_eps: None,
            surprise_pct: None,
            estimate_revenue: None,
            actual_revenue: None,
            guidance: None,
            notes: None,
        }
    }

    /// Recomputes `surprise_pct` from the EPS fields.
    pub fn with_computed_surprise(mut self) -> Self {
        self.surprise_pct = surprise_pct(self.estimate_eps, self.actual_eps);
        self
    }
}

/// `(actual - estimate) / |estimate| * 100`, absent unless both are present and estimate != 0.
pub fn surprise_pct(estimate_eps: Option<f64>, actual_eps: Option<f64>) -> Option<f64> {
    match (estimate_eps, actual_eps) {
        (Some(est), Some(act)) if est != 0.0 => Some((act - est) / est.abs() * 100.0),
        _ => None,
    }
}

/// One row of the upcoming-earnings calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub ticker: String,
    pub name: String,
    pub report_date: NaiveDate,
    pub days_until: i64,
    pub stance: Stance,
}
