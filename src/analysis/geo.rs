//! Canonical geographic key normalization.
//!
//! Upstream row sets disagree on key field names (`STATEFP` vs `statefp`,
//! `COUNTYNAME` vs `county_name`) and sometimes carry a composite
//! `"County, ST"` string instead of separate fields. Every joiner goes
//! through this module so the normalization lives in exactly one place.

use crate::gateway::RawRow;
use crate::models::GeoKey;
use serde_json::Value;

/// State FIPS code to USPS abbreviation, in FIPS order.
const STATE_FIPS: &[(&str, &str)] = &[
    ("01", "AL"),
    ("02", "AK"),
    ("04", "AZ"),
    ("05", "AR"),
    ("06", "CA"),
    ("08", "CO"),
    ("09", "CT"),
    ("10", "DE"),
    ("11", "DC"),
    ("12", "FL"),
    ("13", "GA"),
    ("15", "HI"),
    ("16", "ID"),
    ("17", "IL"),
    ("18", "IN"),
    ("19", "IA"),
    ("20", "KS"),
    ("21", "KY"),
    ("22", "LA"),
    ("23", "ME"),
    ("24", "MD"),
    ("25", "MA"),
    ("26", "MI"),
    ("27", "MN"),
    ("28", "MS"),
    ("29", "MO"),
    ("30", "MT"),
    ("31", "NE"),
    ("32", "NV"),
    ("33", "NH"),
    ("34", "NJ"),
    ("35", "NM"),
    ("36", "NY"),
    ("37", "NC"),
    ("38", "ND"),
    ("39", "OH"),
    ("40", "OK"),
    ("41", "OR"),
    ("42", "PA"),
    ("44", "RI"),
    ("45", "SC"),
    ("46", "SD"),
    ("47", "TN"),
    ("48", "TX"),
    ("49", "UT"),
    ("50", "VT"),
    ("51", "VA"),
    ("53", "WA"),
    ("54", "WV"),
    ("55", "WI"),
    ("56", "WY"),
];

/// Field name variants for the state FIPS code.
const STATEFP_FIELDS: &[&str] = &["statefp", "STATEFP", "state_fp", "p_state_fp"];

/// Field name variants for the county name.
const COUNTY_FIELDS: &[&str] = &["county_name", "COUNTYNAME", "countyname"];

/// Field name variants for a state abbreviation or name.
const STATE_LABEL_FIELDS: &[&str] = &["state", "state_abbr", "state_name"];

/// Field name variants for a metro-area name.
const MSA_FIELDS: &[&str] = &["msa_name", "MSA_NAME", "msa"];

/// Zero-pad a state FIPS code to its canonical 2-character form.
///
/// Returns `None` for empty or non-numeric input.
pub fn pad_statefp(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    match trimmed.len() {
        1 => Some(format!("0{}", trimmed)),
        2 => Some(trimmed.to_string()),
        _ => None,
    }
}

/// Normalize a county name: trim and collapse internal whitespace.
///
/// Returns `None` when nothing remains.
pub fn normalize_county(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Split a composite `"Jefferson County, AL"` string into county and state.
///
/// Splits on the last comma so county names containing commas (rare but
/// observed) keep their full name. Returns `None` unless both halves are
/// non-empty.
pub fn split_county_state(raw: &str) -> Option<(String, String)> {
    let (county_part, state_part) = raw.rsplit_once(',')?;
    let county = normalize_county(county_part)?;
    let state = state_part.trim();
    if state.is_empty() {
        return None;
    }
    Some((county, state.to_string()))
}

/// Look up the FIPS code for a USPS state abbreviation (case-insensitive).
pub fn statefp_for_abbrev(abbrev: &str) -> Option<&'static str> {
    let upper = abbrev.trim().to_uppercase();
    STATE_FIPS
        .iter()
        .find(|(_, ab)| *ab == upper)
        .map(|(fips, _)| *fips)
}

/// Look up the USPS abbreviation for a state FIPS code.
pub fn abbrev_for_statefp(statefp: &str) -> Option<&'static str> {
    STATE_FIPS
        .iter()
        .find(|(fips, _)| *fips == statefp)
        .map(|(_, ab)| *ab)
}

/// Extract a state-level key from a row, tolerating field-name variants.
pub fn state_key(row: &RawRow) -> Option<GeoKey> {
    let statefp = statefp_from_row(row)?;
    Some(GeoKey::state(statefp))
}

/// Extract a county-level key from a row.
///
/// Handles separate `county_name` + `statefp` fields, a composite
/// `"County, ST"` county name, and a state abbreviation standing in for
/// the FIPS code. Rows with neither a usable county nor state yield `None`
/// and are excluded from joins.
pub fn county_key(row: &RawRow) -> Option<GeoKey> {
    let county_raw = first_string(row, COUNTY_FIELDS)?;

    // Composite "County, ST" form: the county field carries the state too.
    if let Some((county, state)) = split_county_state(&county_raw) {
        let statefp = statefp_from_row(row)
            .or_else(|| statefp_for_abbrev(&state).map(String::from))?;
        return Some(GeoKey::county(statefp, county));
    }

    let county = normalize_county(&county_raw)?;
    let statefp = statefp_from_row(row).or_else(|| {
        first_string(row, STATE_LABEL_FIELDS)
            .and_then(|s| statefp_for_abbrev(&s).map(String::from))
    })?;
    Some(GeoKey::county(statefp, county))
}

/// Extract a metro-area key from a row.
///
/// Metro areas are keyed like counties: region name within the principal
/// state. The name may also be a composite `"Metro Name, ST"` string.
pub fn msa_key(row: &RawRow) -> Option<GeoKey> {
    let msa_raw = first_string(row, MSA_FIELDS)?;

    if let Some((msa, state)) = split_county_state(&msa_raw) {
        let statefp = statefp_from_row(row)
            .or_else(|| statefp_for_abbrev(&state).map(String::from))?;
        return Some(GeoKey::county(statefp, msa));
    }

    let msa = normalize_county(&msa_raw)?;
    let statefp = statefp_from_row(row)?;
    Some(GeoKey::county(statefp, msa))
}

/// Pull a padded FIPS code from any of the known field variants.
fn statefp_from_row(row: &RawRow) -> Option<String> {
    for field in STATEFP_FIELDS {
        if let Some(value) = row.get(*field) {
            if let Some(fips) = value_to_statefp(value) {
                return Some(fips);
            }
        }
    }
    None
}

/// Coerce a JSON value into a padded FIPS string.
///
/// The warehouse sometimes returns FIPS codes as numbers, which loses the
/// leading zero.
fn value_to_statefp(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => pad_statefp(s),
        Value::Number(n) => {
            let as_int = n.as_i64()?;
            if (0..=99).contains(&as_int) {
                pad_statefp(&as_int.to_string())
            } else {
                None
            }
        }
        _ => None,
    }
}

/// First non-empty string among the given fields.
fn first_string(row: &RawRow, fields: &[&str]) -> Option<String> {
    for field in fields {
        if let Some(Value::String(s)) = row.get(*field) {
            if !s.trim().is_empty() {
                return Some(s.clone());
            }
        }
    }
    None
}
