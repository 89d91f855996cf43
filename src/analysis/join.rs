//! Geographic left join of independently-fetched row sets.
//!
//! Each remote query returns rows in its own shape; this module merges
//! them into one record per geography, keyed by the canonical [`GeoKey`].
//! The join is a pure, synchronous transform of already-fetched arrays:
//! no caching, no retries.

use crate::gateway::RawRow;
use crate::models::{GeoKey, MetricSet};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Extracts the canonical key from one row of a particular source.
pub type KeyFn = fn(&RawRow) -> Option<GeoKey>;

/// One fetched row set plus the key extractor that matches its shape.
pub struct Source {
    /// Query name, for logging.
    pub name: &'static str,
    pub rows: Vec<RawRow>,
    pub key: KeyFn,
}

impl Source {
    pub fn new(name: &'static str, rows: Vec<RawRow>, key: KeyFn) -> Self {
        Self { name, rows, key }
    }
}

/// One geography with fields merged from every source that matched it.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRecord {
    pub key: GeoKey,
    /// Textual fields (state/county labels and the like).
    pub labels: BTreeMap<String, String>,
    /// Numeric fields, including numerics the warehouse returned as strings.
    pub metrics: MetricSet,
}

/// Left join `primary` with any number of secondary sources.
///
/// Every primary record with a well-formed key appears exactly once in the
/// output, in encounter order. Secondary fields are merged in where the
/// canonical key matches; a missing match leaves those metrics absent.
/// Duplicate keys within a single source keep the first occurrence only.
/// Rows whose key cannot be extracted are excluded entirely.
pub fn left_join(primary: &Source, secondaries: &[Source]) -> Vec<JoinedRecord> {
    let indexes: Vec<HashMap<(String, Option<String>), &RawRow>> =
        secondaries.iter().map(index_source).collect();

    let mut seen: HashSet<(String, Option<String>)> = HashSet::new();
    let mut joined = Vec::new();

    for row in &primary.rows {
        let Some(key) = (primary.key)(row) else {
            debug!("{}: dropping row without a usable geo key", primary.name);
            continue;
        };

        let canonical = key.canonical();
        if !seen.insert(canonical.clone()) {
            debug!("{}: duplicate key {}, keeping first", primary.name, key);
            continue;
        }

        let mut record = JoinedRecord {
            key,
            labels: BTreeMap::new(),
            metrics: MetricSet::new(),
        };
        absorb_row(&mut record, row);

        for index in &indexes {
            if let Some(secondary_row) = index.get(&canonical) {
                absorb_row(&mut record, secondary_row);
            }
        }

        joined.push(record);
    }

    joined
}

/// Index a secondary source by canonical key, first occurrence wins.
fn index_source(source: &Source) -> HashMap<(String, Option<String>), &RawRow> {
    let mut index = HashMap::new();
    for row in &source.rows {
        let Some(key) = (source.key)(row) else {
            continue;
        };
        index.entry(key.canonical()).or_insert(row);
    }
    index
}

/// Merge a row's fields into the record; first writer wins per field name.
fn absorb_row(record: &mut JoinedRecord, row: &RawRow) {
    for (field, value) in row {
        if let Some(number) = value_as_f64(value) {
            record.metrics.insert_if_absent(field, number);
        } else if let Value::String(s) = value {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                record
                    .labels
                    .entry(field.clone())
                    .or_insert_with(|| trimmed.to_string());
            }
        }
    }
}

/// Interpret a JSON value as a number.
///
/// The warehouse serializes some numeric columns as strings (with or
/// without thousands separators); those parse here instead of being lost.
fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    }
}
