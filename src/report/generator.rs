//! Markdown and JSON report rendering.
//!
//! All rounding happens here, at render time: the underlying scores keep
//! full float precision. Percentages render with one decimal; counts and
//! currency render as whole units with thousands grouping.

use crate::models::{MarketReport, ReportEntry, ReportMetadata};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &MarketReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("# MarketLens Report — {}\n\n", report.title));
    output.push_str(&generate_metadata_section(&report.metadata));

    if report.is_empty() {
        output.push_str("## Rankings\n\nNo data available for this selection.\n\n");
    } else {
        output.push_str(&generate_headline_section(report));
        output.push_str(&generate_rankings_section(report));
    }

    output.push_str(&generate_footer());
    output
}

/// Generate a JSON report.
pub fn generate_json_report(report: &MarketReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!("- **Queries Issued:** {}\n", metadata.queries_issued));
    section.push_str(&format!("- **Rows Fetched:** {}\n", metadata.rows_fetched));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n\n",
        metadata.duration_seconds
    ));

    section
}

/// The compact headline view: the single top entry with its key metrics.
fn generate_headline_section(report: &MarketReport) -> String {
    let Some(top) = report.headline() else {
        return String::new();
    };

    let mut section = String::new();
    section.push_str(&format!("## Top Market: {}\n\n", top.name));
    section.push_str(&format!(
        "- **{}:** {}\n",
        report.metric_label,
        format_metric_value(&report.metric_label, top.score)
    ));
    if let Some(rank) = top.national_rank {
        section.push_str(&format!("- **National Rank:** #{}\n", rank));
    }
    if let Some(rank) = top.state_rank {
        section.push_str(&format!("- **State Rank:** #{}\n", rank));
    }
    if let Some(path) = &top.drill_path {
        section.push_str(&format!("- **Report:** `{}`\n", path));
    }

    for (name, value) in notable_metrics(top) {
        section.push_str(&format!(
            "- **{}:** {}\n",
            metric_title(&name),
            format_metric_value(&name, value)
        ));
    }

    section.push('\n');
    section
}

/// The expanded view: the full truncated ranking table.
fn generate_rankings_section(report: &MarketReport) -> String {
    let mut section = String::new();

    section.push_str(&format!("## Rankings by {}\n\n", report.metric_label));
    section.push_str(&format!("| # | Market | {} | Report |\n", report.metric_label));
    section.push_str("|---|--------|-------|--------|\n");

    for entry in &report.entries {
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            entry.rank,
            entry.name,
            format_metric_value(&report.metric_label, entry.score),
            entry
                .drill_path
                .as_ref()
                .map(|p| format!("`{}`", p))
                .unwrap_or_else(|| "—".to_string()),
        ));
    }

    section.push('\n');
    section
}

fn generate_footer() -> String {
    format!(
        "---\n\n*Generated by MarketLens v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// A handful of additional metrics worth surfacing for the headline entry.
fn notable_metrics(entry: &ReportEntry) -> Vec<(String, f64)> {
    const NOTABLE: &[&str] = &[
        "median_income",
        "establishments",
        "population",
        "avg_revenue",
        "growth_rate_percentage",
        "firms_per_10k_population",
        "market_share",
    ];

    NOTABLE
        .iter()
        .filter_map(|name| entry.metrics.get(name).map(|v| (name.to_string(), v)))
        .collect()
}

/// Render-time formatting chosen by metric name.
///
/// Percentage-like metrics get one decimal; currency gets a dollar sign;
/// everything else renders as a whole grouped count.
pub fn format_metric_value(name: &str, value: f64) -> String {
    let lower = name.to_lowercase();
    if lower.contains('%')
        || lower.contains("percentage")
        || lower.contains("rate")
        || lower.contains("share")
    {
        format!("{:.1}%", value)
    } else if lower.contains("per 10k") || lower.contains("per_10k") || lower.contains("score") {
        format!("{:.1}", value)
    } else if lower.contains("income") || lower.contains("revenue") || lower.contains("payroll") {
        format!("${}", group_thousands(value.round() as i64))
    } else {
        group_thousands(value.round() as i64)
    }
}

/// Title-case a snake_case field name for display.
fn metric_title(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Locale-style thousands grouping (1234567 -> "1,234,567").
fn group_thousands(value: i64) -> String {
    let negative = value < 0;
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::new();

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if negative {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoKey, MetricSet, ReportMetadata};
    use chrono::Utc;

    fn sample_report(entries: Vec<ReportEntry>) -> MarketReport {
        MarketReport {
            metadata: ReportMetadata {
                generated_at: Utc::now(),
                source: "http://localhost:54321".to_string(),
                queries_issued: 3,
                rows_fetched: entries.len(),
                duration_seconds: 0.4,
            },
            title: "State Market Overview".to_string(),
            metric_label: "Market Score".to_string(),
            entries,
        }
    }

    fn entry(rank: usize, name: &str, score: f64) -> ReportEntry {
        let mut metrics = MetricSet::new();
        metrics.insert("median_income", 61_234.0);
        ReportEntry {
            rank,
            name: name.to_string(),
            key: GeoKey::state("48"),
            score,
            metrics,
            drill_path: Some("/state-market-report/48".to_string()),
            state_rank: None,
            national_rank: Some(1),
        }
    }

    #[test]
    fn test_markdown_report_sections() {
        let report = sample_report(vec![entry(1, "Texas", 92.25)]);
        let output = generate_markdown_report(&report);

        assert!(output.contains("# MarketLens Report — State Market Overview"));
        assert!(output.contains("## Top Market: Texas"));
        assert!(output.contains("| 1 | Texas | 92.3 | `/state-market-report/48` |"));
        assert!(output.contains("**National Rank:** #1"));
        assert!(output.contains("**Median Income:** $61,234"));
    }

    #[test]
    fn test_empty_report_renders_no_data() {
        let output = generate_markdown_report(&sample_report(vec![]));
        assert!(output.contains("No data available for this selection."));
        assert!(!output.contains("## Top Market"));
    }

    #[test]
    fn test_json_report_round_trips() {
        let report = sample_report(vec![entry(1, "Texas", 92.0)]);
        let json = generate_json_report(&report).unwrap();
        let parsed: MarketReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.title, report.title);
    }

    #[test]
    fn test_format_metric_value() {
        assert_eq!(format_metric_value("Growth Rate (%)", 4.25), "4.3%");
        assert_eq!(format_metric_value("growth_rate_percentage", 4.0), "4.0%");
        assert_eq!(format_metric_value("Market Score", 88.46), "88.5");
        assert_eq!(format_metric_value("median_income", 61234.6), "$61,235");
        assert_eq!(format_metric_value("establishments", 1532.0), "1,532");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
        assert_eq!(group_thousands(-12_345), "-12,345");
    }
}
