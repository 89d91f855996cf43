//! Derived metric formulas.
//!
//! Pure functions from a [`MetricSet`] to a derived value. Every formula
//! carries its own zero-denominator policy; nothing here mutates its input
//! or rounds (rounding happens at render time only). Values keep full
//! float precision so repeated calls over the same input are bit-identical.

use crate::models::MetricSet;

/// Metric a report can be ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RankMetric {
    /// Composite market score from the warehouse (0-100).
    #[default]
    MarketScore,
    /// Year-over-year growth rate percentage.
    GrowthRate,
    /// Accounting firms per 10k population.
    FirmsPer10k,
    /// Average firm revenue (payroll / establishments).
    AvgRevenue,
    /// Median household income.
    MedianIncome,
}

impl RankMetric {
    /// Human-readable label for report headers.
    pub fn label(&self) -> &'static str {
        match self {
            RankMetric::MarketScore => "Market Score",
            RankMetric::GrowthRate => "Growth Rate (%)",
            RankMetric::FirmsPer10k => "Firms per 10k Population",
            RankMetric::AvgRevenue => "Avg Firm Revenue",
            RankMetric::MedianIncome => "Median Household Income",
        }
    }

    /// Compute this metric's value for one geography.
    ///
    /// Pre-aggregated fields are used when the warehouse supplied them;
    /// otherwise the value is derived from the raw fields. Absent fields
    /// degrade to zero rather than erroring, per the display contract.
    pub fn value(&self, metrics: &MetricSet) -> f64 {
        match self {
            RankMetric::MarketScore => metrics.get_or_zero("market_score"),
            // Already expressed 0-100 upstream; never re-normalized.
            RankMetric::GrowthRate => {
                metrics.get("growth_rate_percentage").unwrap_or_else(|| {
                    growth_rate(
                        metrics.get_or_zero("current_establishments"),
                        metrics.get_or_zero("previous_establishments"),
                    )
                })
            }
            RankMetric::FirmsPer10k => metrics
                .get("firms_per_10k_population")
                .unwrap_or_else(|| firms_per_10k(metrics)),
            RankMetric::AvgRevenue => metrics
                .get("avg_revenue")
                .unwrap_or_else(|| avg_revenue(metrics)),
            RankMetric::MedianIncome => metrics.get_or_zero("median_income"),
        }
    }
}

/// `numerator / denominator` with a denominator of zero (or anything
/// non-finite) defaulting to 1.
///
/// Yields a deliberately large-but-finite rate instead of `Infinity` when
/// the denominator is missing upstream.
pub fn safe_rate(numerator: f64, denominator: f64) -> f64 {
    let denominator = if denominator == 0.0 || !denominator.is_finite() {
        1.0
    } else {
        denominator
    };
    numerator / denominator
}

/// Average revenue per establishment: total payroll / establishment count.
pub fn avg_revenue(metrics: &MetricSet) -> f64 {
    safe_rate(
        metrics.get_or_zero("total_payroll"),
        metrics.get_or_zero("establishments"),
    )
}

/// Firm density: establishments per 10k population.
pub fn firms_per_10k(metrics: &MetricSet) -> f64 {
    safe_rate(
        metrics.get_or_zero("establishments"),
        metrics.get_or_zero("population"),
    ) * 10_000.0
}

/// Share of a total, as a percentage.
pub fn market_share(value: f64, total: f64) -> f64 {
    safe_rate(value, total) * 100.0
}

/// Percentage growth from `previous` to `current`.
pub fn growth_rate(current: f64, previous: f64) -> f64 {
    safe_rate(current - previous, previous) * 100.0
}
