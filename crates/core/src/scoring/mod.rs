pub mod aggregator;
pub mod latest;

pub use aggregator::{contributions, score, Contribution, ScoringConfig};
pub use latest::resolve_latest;
