//! Data models for the market analytics pipeline.
//!
//! This module contains the core data structures shared across the
//! gateway, join, ranking, and report layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical geographic key for a state or a county within a state.
///
/// `statefp` is always a zero-padded 2-character FIPS code. A key with a
/// county identifies `(statefp, county)`; without one it identifies the
/// whole state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeoKey {
    /// Two-character state FIPS code (zero-padded).
    pub statefp: String,
    /// County name, when the key is county-level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
}

impl GeoKey {
    /// Create a state-level key.
    pub fn state(statefp: impl Into<String>) -> Self {
        Self {
            statefp: statefp.into(),
            county: None,
        }
    }

    /// Create a county-level key.
    pub fn county(statefp: impl Into<String>, county: impl Into<String>) -> Self {
        Self {
            statefp: statefp.into(),
            county: Some(county.into()),
        }
    }

    /// Returns true when the key addresses a whole state.
    #[allow(dead_code)] // Utility for callers that branch on key level
    pub fn is_state_level(&self) -> bool {
        self.county.is_none()
    }

    /// Comparison form: padded FIPS plus case-folded county name.
    ///
    /// Source systems disagree on casing ("JEFFERSON COUNTY" vs
    /// "Jefferson County"), so all key matching goes through this.
    pub fn canonical(&self) -> (String, Option<String>) {
        (
            self.statefp.clone(),
            self.county.as_ref().map(|c| c.to_lowercase()),
        )
    }
}

impl fmt::Display for GeoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.county {
            Some(county) => write!(f, "{} ({})", county, self.statefp),
            None => write!(f, "state {}", self.statefp),
        }
    }
}

/// Named numeric metrics for one geography.
///
/// An absent metric is represented by an absent key, never by a sentinel
/// value; callers choose between `get` and `get_or_zero` depending on
/// whether absence is meaningful at the call site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSet {
    values: BTreeMap<String, f64>,
}

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a metric; `None` when the field never arrived.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Look up a metric, defaulting absent values to zero for display math.
    pub fn get_or_zero(&self, name: &str) -> f64 {
        self.get(name).unwrap_or(0.0)
    }

    #[allow(dead_code)] // Utility for presence checks
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Insert only when the metric is not already present (first writer wins).
    pub fn insert_if_absent(&mut self, name: &str, value: f64) {
        self.values.entry(name.to_string()).or_insert(value);
    }

    #[allow(dead_code)] // Utility pair for collection-style callers
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[allow(dead_code)] // Utility for metric dumps
    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.values.iter()
    }
}

/// One geography with its metrics and computed ranking score.
///
/// Constructed fresh from every query response and never mutated after
/// ranking; the score is recomputed from `metrics` on each ranking pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedEntry {
    /// Canonical geographic key.
    pub key: GeoKey,
    /// Textual fields carried through from the source rows
    /// (e.g. `county_name`, `state_name`, `state`).
    pub labels: BTreeMap<String, String>,
    /// Numeric fields merged from all joined sources.
    pub metrics: MetricSet,
    /// Score under the metric the entry was ranked by.
    pub score: f64,
    /// Rank within the state (1 = best), when the source provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_rank: Option<u32>,
    /// National rank (1 = best), when the source provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_rank: Option<u32>,
}

impl RankedEntry {
    /// Human-readable name for report output.
    pub fn display_name(&self) -> String {
        if let Some(county) = &self.key.county {
            match self.state_label() {
                Some(state) => format!("{}, {}", county, state),
                None => county.clone(),
            }
        } else {
            self.labels
                .get("state_name")
                .cloned()
                .unwrap_or_else(|| format!("State {}", self.key.statefp))
        }
    }

    /// State abbreviation or name, from whichever label field is present.
    pub fn state_label(&self) -> Option<&str> {
        self.labels
            .get("state")
            .or_else(|| self.labels.get("state_name"))
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// Metadata about a generated report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Gateway base URL the rows came from.
    pub source: String,
    /// Number of remote queries issued.
    pub queries_issued: usize,
    /// Total rows fetched across all queries.
    pub rows_fetched: usize,
    /// Wall-clock duration of the fetch + aggregation, in seconds.
    pub duration_seconds: f64,
}

/// A complete ranked market report for one view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketReport {
    pub metadata: ReportMetadata,
    /// View title, e.g. "State Market Overview".
    pub title: String,
    /// Label of the metric the entries are ranked by.
    pub metric_label: String,
    /// Ranked entries, best first, already truncated to top N.
    pub entries: Vec<ReportEntry>,
}

/// One row of a rendered report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    /// 1-based rank within this report.
    pub rank: usize,
    pub name: String,
    pub key: GeoKey,
    pub score: f64,
    pub metrics: MetricSet,
    /// Drill-through navigation path; absent when the entry lacks the
    /// identity needed to build one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drill_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_rank: Option<u32>,
}

impl MarketReport {
    /// The single headline entry for compact display.
    pub fn headline(&self) -> Option<&ReportEntry> {
        self.entries.first()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
