//! Client-side aggregation: geo-key normalization, joining, derived
//! metrics, and top-N ranking.

pub mod geo;
pub mod join;
pub mod metrics;
pub mod presenter;

pub use join::{left_join, JoinedRecord, Source};
pub use metrics::RankMetric;
pub use presenter::{drill_path, rank_top_n, TopN, DEFAULT_TOP_N};
