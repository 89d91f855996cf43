//! Named stored procedures on the data warehouse.
//!
//! The backend exposes market aggregates as stored procedures; this is
//! the catalog of the ones consumed here, plus their parameter builders.
//! Row shapes are opaque: fields are discovered at join time.

use serde_json::{json, Value};

pub const MARKET_OPPORTUNITIES: &str = "get_market_opportunities";
pub const COMPETITIVE_ANALYSIS: &str = "get_competitive_analysis";
pub const MARKET_TRENDS: &str = "get_market_trends";
pub const ENHANCED_MARKET_SCORES: &str = "get_enhanced_market_scores";
pub const MARKET_GROWTH_METRICS: &str = "get_market_growth_metrics";
pub const UNDERSERVED_REGIONS: &str = "get_underserved_regions";
pub const EMERGING_TALENT_MARKETS: &str = "get_emerging_talent_markets";
pub const FUTURE_SATURATION_RISK: &str = "get_future_saturation_risk";
pub const VALUE_METRICS: &str = "get_value_metrics";
pub const STATE_RANKINGS: &str = "get_state_rankings";
pub const MSA_RANKINGS: &str = "get_msa_rankings";
pub const COMPREHENSIVE_COUNTY_DATA: &str = "get_comprehensive_county_data";
pub const MARKET_SIMILARITY_ANALYSIS: &str = "get_market_similarity_analysis";
pub const SERVICE_DISTRIBUTION: &str = "get_service_distribution";

/// Empty parameter object for procedures that take none.
pub fn no_params() -> Value {
    json!({})
}

/// Scope a procedure to one state.
pub fn state_params(statefp: &str) -> Value {
    json!({ "p_state_fp": statefp })
}

/// Parameters for `get_comprehensive_county_data`.
pub fn county_params(county_name: &str, statefp: &str) -> Value {
    json!({
        "p_county_name": county_name,
        "p_state_fp": statefp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_county_params_shape() {
        let params = county_params("Jefferson County", "01");
        assert_eq!(params["p_county_name"], "Jefferson County");
        assert_eq!(params["p_state_fp"], "01");
    }

    #[test]
    fn test_state_params_shape() {
        assert_eq!(state_params("48")["p_state_fp"], "48");
    }
}
