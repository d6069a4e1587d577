pub mod calendar;
pub mod domain;
pub mod ingest;
pub mod pipeline;
pub mod scoring;
pub mod storage;
pub mod time;

pub mod config {
    use crate::scoring::aggregator::DEFAULT_PRIMARY_SOURCE;
    use crate::scoring::ScoringConfig;
    use crate::time::market_date::{parse_utc_offset_hours, DEFAULT_UTC_OFFSET_HOURS};
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub data_provider_base_url: Option<String>,
        pub data_provider_api_key: Option<String>,
        pub primary_signal_source: String,
        pub market_utc_offset_hours: i32,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let market_utc_offset_hours = match std::env::var("MARKET_UTC_OFFSET_HOURS") {
                Ok(s) => parse_utc_offset_hours(&s).context("invalid MARKET_UTC_OFFSET_HOURS")?,
                Err(_) => DEFAULT_UTC_OFFSET_HOURS,
            };

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                data_provider_base_url: std::env::var("DATA_PROVIDER_BASE_URL").ok(),
                data_provider_api_key: std::env::var("DATA_PROVIDER_API_KEY").ok(),
                primary_signal_source: std::env::var("PRIMARY_SIGNAL_SOURCE")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_PRIMARY_SOURCE.to_string()),
                market_utc_offset_hours,
            })
        }

        pub fn database_url_or<'a>(&'a self, default: &'a str) -> &'a str {
            self.database_url.as_deref().unwrap_or(default)
        }

        pub fn require_data_provider_base_url(&self) -> anyhow::Result<&str> {
            self.data_provider_base_url
                .as_deref()
                .context("DATA_PROVIDER_BASE_URL is required")
        }

        pub fn scoring_config(&self) -> ScoringConfig {
            ScoringConfig::new(&self.primary_signal_source)
        }
    }
}
