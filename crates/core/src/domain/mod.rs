pub mod contract;
pub mod earnings;
pub mod error;
pub mod recommendation;
pub mod signal;
pub mod trade;
pub mod watchlist;
