//! Top-N ranking and drill-through presentation.
//!
//! Takes joined records, scores them under a chosen metric, and exposes
//! the bounded ranked list two ways: a single headline entry for compact
//! display and the full truncated list for the expanded view. Also builds
//! the drill-through navigation path for each entry.

use crate::analysis::geo;
use crate::analysis::join::JoinedRecord;
use crate::analysis::metrics::RankMetric;
use crate::models::{MetricSet, RankedEntry};
use std::cmp::Ordering;
use tracing::warn;

/// Default bound on ranked entries per report.
pub const DEFAULT_TOP_N: usize = 5;

/// A ranked, truncated list of geographies.
#[derive(Debug, Clone)]
pub struct TopN {
    entries: Vec<RankedEntry>,
}

impl TopN {
    /// The single best entry, for compact display.
    pub fn headline(&self) -> Option<&RankedEntry> {
        self.entries.first()
    }

    /// The full truncated list, for the expanded view.
    #[allow(dead_code)] // Utility for borrowing consumers
    pub fn detail(&self) -> &[RankedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)] // Companion to len
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<RankedEntry> {
        self.entries
    }
}

/// Score and rank records under `metric`, keeping the best `limit`.
///
/// Scores are recomputed from source metrics on every call. The sort is
/// descending and stable: ties keep their encounter order, which the
/// tests rely on for determinism. Truncation happens strictly after
/// sorting.
pub fn rank_top_n(records: Vec<JoinedRecord>, metric: RankMetric, limit: usize) -> TopN {
    let mut entries: Vec<RankedEntry> = records
        .into_iter()
        .map(|record| entry_from_record(record, metric))
        .collect();

    entries.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    entries.truncate(limit);

    TopN { entries }
}

/// Build a ranked entry, backfilling the state label from the FIPS code
/// when the source rows never carried one.
fn entry_from_record(record: JoinedRecord, metric: RankMetric) -> RankedEntry {
    let score = metric.value(&record.metrics);
    let state_rank = rank_field(&record.metrics, "state_rank");
    let national_rank = rank_field(&record.metrics, "national_rank");

    let mut labels = record.labels;
    if !labels.contains_key("state") && !labels.contains_key("state_name") {
        if let Some(abbrev) = geo::abbrev_for_statefp(&record.key.statefp) {
            labels.insert("state".to_string(), abbrev.to_string());
        }
    }

    RankedEntry {
        key: record.key,
        labels,
        metrics: record.metrics,
        score,
        state_rank,
        national_rank,
    }
}

/// Ranks are positive integers, 1 = best; anything else is treated as absent.
fn rank_field(metrics: &MetricSet, name: &str) -> Option<u32> {
    let value = metrics.get(name)?;
    if value >= 1.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        Some(value as u32)
    } else {
        None
    }
}

/// Build the drill-through path for an entry.
///
/// State-level entries navigate to `/state-market-report/{statefp}`.
/// County-level entries navigate to `/market-report/{county}/{state}` and
/// need a state label; when the label is missing but the county name is a
/// composite `"County, ST"` string, it is split as a fallback. With no
/// recoverable state the entry gets no path at all, never a malformed one.
pub fn drill_path(entry: &RankedEntry) -> Option<String> {
    let Some(county) = &entry.key.county else {
        return Some(format!("/state-market-report/{}", entry.key.statefp));
    };

    if let Some(state) = entry.state_label() {
        return Some(format!("/market-report/{}/{}", county, state));
    }

    // Fallback: the county label itself may carry the state.
    if let Some(raw) = entry.labels.get("county_name") {
        if let Some((split_county, state)) = geo::split_county_state(raw) {
            return Some(format!("/market-report/{}/{}", split_county, state));
        }
    }

    warn!("no state label for {}, skipping drill-through", entry.key);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoKey;
    use std::collections::BTreeMap;

    fn record(county: &str, statefp: &str, score: f64) -> JoinedRecord {
        let mut metrics = MetricSet::new();
        metrics.insert("market_score", score);
        JoinedRecord {
            key: GeoKey::county(statefp, county),
            labels: BTreeMap::new(),
            metrics,
        }
    }

    fn bare_entry(key: GeoKey, labels: BTreeMap<String, String>) -> RankedEntry {
        RankedEntry {
            key,
            labels,
            metrics: MetricSet::new(),
            score: 0.0,
            state_rank: None,
            national_rank: None,
        }
    }

    #[test]
    fn test_top_n_stable_tie_break() {
        let records = vec![
            record("A County", "01", 10.0),
            record("B County", "01", 10.0),
            record("C County", "01", 5.0),
        ];

        let top = rank_top_n(records, RankMetric::MarketScore, 2);
        let names: Vec<_> = top
            .detail()
            .iter()
            .map(|e| e.key.county.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["A County", "B County"]);
    }

    #[test]
    fn test_truncation_happens_after_sorting() {
        // The best record appears last; truncating before sorting would lose it.
        let records = vec![
            record("A County", "01", 1.0),
            record("B County", "01", 2.0),
            record("C County", "01", 99.0),
        ];

        let top = rank_top_n(records, RankMetric::MarketScore, 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top.headline().unwrap().key.county.as_deref(), Some("C County"));
    }

    #[test]
    fn test_headline_is_first_detail_entry() {
        let records = vec![record("A County", "01", 3.0), record("B County", "01", 7.0)];
        let top = rank_top_n(records, RankMetric::MarketScore, 5);

        assert_eq!(top.headline().unwrap().key, top.detail()[0].key);
        assert_eq!(top.detail().len(), 2);
    }

    #[test]
    fn test_state_label_backfilled_from_fips() {
        let top = rank_top_n(vec![record("Travis County", "48", 1.0)], RankMetric::MarketScore, 5);
        let entry = top.headline().unwrap();
        assert_eq!(entry.state_label(), Some("TX"));
        assert_eq!(
            drill_path(entry),
            Some("/market-report/Travis County/TX".to_string())
        );
    }

    #[test]
    fn test_drill_path_state_level() {
        let entry = bare_entry(GeoKey::state("06"), BTreeMap::new());
        assert_eq!(drill_path(&entry), Some("/state-market-report/06".to_string()));
    }

    #[test]
    fn test_drill_path_composite_fallback() {
        let mut labels = BTreeMap::new();
        labels.insert("county_name".to_string(), "Jefferson County, AL".to_string());
        let entry = bare_entry(GeoKey::county("01", "Jefferson County"), labels);

        assert_eq!(
            drill_path(&entry),
            Some("/market-report/Jefferson County/AL".to_string())
        );
    }

    #[test]
    fn test_drill_path_declines_without_state() {
        // Unknown FIPS, no state label, no composite name: no path.
        let mut labels = BTreeMap::new();
        labels.insert("county_name".to_string(), "Jefferson County".to_string());
        let entry = bare_entry(GeoKey::county("88", "Jefferson County"), labels);

        assert_eq!(drill_path(&entry), None);
    }

    #[test]
    fn test_rank_field_rejects_non_positive() {
        let mut metrics = MetricSet::new();
        metrics.insert("state_rank", 3.0);
        metrics.insert("national_rank", 0.0);

        assert_eq!(rank_field(&metrics, "state_rank"), Some(3));
        assert_eq!(rank_field(&metrics, "national_rank"), None);
        assert_eq!(rank_field(&metrics, "missing"), None);
    }
}
