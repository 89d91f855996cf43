//! Report pipeline: fetch, join, derive, rank, package.
//!
//! Each view issues its planned queries concurrently, joins the row sets
//! by geographic key, ranks the joined records under the chosen metric,
//! and packages a [`MarketReport`]. Queries are independent and
//! unordered; two responses may reflect different warehouse moments,
//! which is accepted for a monitoring view. A failed query degrades to
//! zero rows with a warning instead of failing the report.

use crate::analysis::join::{left_join, KeyFn, Source};
use crate::analysis::{geo, metrics, presenter, RankMetric};
use crate::gateway::{queries, GatewayError, QueryGateway, RawRow};
use crate::models::{MarketReport, ReportEntry, ReportMetadata};
use anyhow::{bail, Result};
use chrono::Utc;
use serde_json::Value;
use std::time::Instant;
use tracing::{info, warn};

/// What kind of remote query to issue.
pub enum QuerySpec {
    /// Named stored procedure call.
    Rpc {
        procedure: &'static str,
        params: Value,
    },
    /// Filtered table read.
    Table {
        table: &'static str,
        columns: &'static str,
        filter: Option<(&'static str, String)>,
    },
}

/// One planned remote query plus the key extractor matching its row
/// shape. The first query in a plan is the primary join side.
pub struct PlannedQuery {
    pub spec: QuerySpec,
    pub key: KeyFn,
}

impl PlannedQuery {
    /// Query name for logging and dry-run output.
    pub fn name(&self) -> &'static str {
        match &self.spec {
            QuerySpec::Rpc { procedure, .. } => procedure,
            QuerySpec::Table { table, .. } => table,
        }
    }

    /// Describe the query's arguments for dry-run output.
    pub fn describe_args(&self) -> String {
        match &self.spec {
            QuerySpec::Rpc { params, .. } => format!("params={}", params),
            QuerySpec::Table {
                columns, filter, ..
            } => match filter {
                Some((column, value)) => {
                    format!("columns={} filter={}=eq.{}", columns, column, value)
                }
                None => format!("columns={}", columns),
            },
        }
    }
}

/// The report views the CLI can produce.
#[derive(Debug, Clone)]
pub enum ReportView {
    /// All states ranked against each other.
    StateOverview,
    /// Counties within one state ranked as acquisition opportunities.
    CountyOpportunities { statefp: String },
    /// One county's profile alongside its most similar markets.
    CountyProfile { county: String, statefp: String },
    /// Metro areas ranked nationally.
    MetroRankings,
}

impl ReportView {
    pub fn title(&self) -> String {
        match self {
            ReportView::StateOverview => "State Market Overview".to_string(),
            ReportView::CountyOpportunities { statefp } => {
                format!("County Opportunities — State {}", statefp)
            }
            ReportView::CountyProfile { county, statefp } => {
                format!("{} ({}) Profile & Similar Markets", county, statefp)
            }
            ReportView::MetroRankings => "Top Metro Markets".to_string(),
        }
    }

    /// The queries this view issues, primary first.
    pub fn plan(&self) -> Vec<PlannedQuery> {
        match self {
            ReportView::StateOverview => vec![
                rpc(queries::ENHANCED_MARKET_SCORES, queries::no_params(), geo::state_key),
                rpc(queries::MARKET_GROWTH_METRICS, queries::no_params(), geo::state_key),
                rpc(queries::STATE_RANKINGS, queries::no_params(), geo::state_key),
                rpc(queries::VALUE_METRICS, queries::no_params(), geo::state_key),
                rpc(queries::MARKET_TRENDS, queries::no_params(), geo::state_key),
                table(
                    "state_market_data",
                    "statefp,state_name,median_income,population,establishments,total_payroll",
                    None,
                    geo::state_key,
                ),
            ],
            ReportView::CountyOpportunities { statefp } => vec![
                rpc(
                    queries::MARKET_OPPORTUNITIES,
                    queries::state_params(statefp),
                    geo::county_key,
                ),
                rpc(
                    queries::UNDERSERVED_REGIONS,
                    queries::state_params(statefp),
                    geo::county_key,
                ),
                rpc(
                    queries::EMERGING_TALENT_MARKETS,
                    queries::state_params(statefp),
                    geo::county_key,
                ),
                rpc(
                    queries::FUTURE_SATURATION_RISK,
                    queries::state_params(statefp),
                    geo::county_key,
                ),
                rpc(
                    queries::COMPETITIVE_ANALYSIS,
                    queries::state_params(statefp),
                    geo::county_key,
                ),
                table(
                    "county_market_data",
                    "statefp,county_name,median_income,population,establishments,total_payroll",
                    Some(("statefp", statefp.clone())),
                    geo::county_key,
                ),
            ],
            ReportView::CountyProfile { county, statefp } => vec![
                rpc(
                    queries::MARKET_SIMILARITY_ANALYSIS,
                    queries::state_params(statefp),
                    geo::county_key,
                ),
                rpc(
                    queries::COMPREHENSIVE_COUNTY_DATA,
                    queries::county_params(county, statefp),
                    geo::county_key,
                ),
                rpc(
                    queries::SERVICE_DISTRIBUTION,
                    queries::county_params(county, statefp),
                    geo::county_key,
                ),
            ],
            ReportView::MetroRankings => vec![rpc(
                queries::MSA_RANKINGS,
                queries::no_params(),
                geo::msa_key,
            )],
        }
    }
}

fn rpc(procedure: &'static str, params: Value, key: KeyFn) -> PlannedQuery {
    PlannedQuery {
        spec: QuerySpec::Rpc { procedure, params },
        key,
    }
}

fn table(
    table: &'static str,
    columns: &'static str,
    filter: Option<(&'static str, String)>,
    key: KeyFn,
) -> PlannedQuery {
    PlannedQuery {
        spec: QuerySpec::Table {
            table,
            columns,
            filter,
        },
        key,
    }
}

/// Drives one view end to end against an injected gateway.
pub struct Pipeline<G: QueryGateway> {
    gateway: G,
    /// Where the rows came from, recorded in report metadata.
    source: String,
}

impl<G: QueryGateway> Pipeline<G> {
    pub fn new(gateway: G, source: impl Into<String>) -> Self {
        Self {
            gateway,
            source: source.into(),
        }
    }

    /// Produce the report for a view.
    ///
    /// Errors only when the gateway is unreachable for every query; any
    /// individual failure degrades that query to zero rows.
    pub async fn run(
        &self,
        view: &ReportView,
        metric: RankMetric,
        top_n: usize,
    ) -> Result<MarketReport> {
        let started = Instant::now();
        let plan = view.plan();
        let queries_issued = plan.len();

        let fetches = plan.iter().map(|query| self.fetch(&query.spec));
        let results: Vec<Result<Vec<RawRow>, GatewayError>> =
            futures::future::join_all(fetches).await;

        if results
            .iter()
            .all(|r| matches!(r, Err(GatewayError::Connect { .. })))
        {
            bail!("gateway unreachable at {}", self.source);
        }

        let mut rows_fetched = 0;
        let mut sources: Vec<Source> = Vec::with_capacity(plan.len());
        for (query, result) in plan.iter().zip(results) {
            let rows = match result {
                Ok(rows) => rows,
                Err(e) => {
                    warn!("{} failed, continuing without it: {}", query.name(), e);
                    Vec::new()
                }
            };
            rows_fetched += rows.len();
            sources.push(Source::new(query.name(), rows, query.key));
        }

        let primary = sources.remove(0);
        let mut joined = left_join(&primary, &sources);
        info!(
            "{}: {} rows across {} queries, {} joined records",
            view.title(),
            rows_fetched,
            queries_issued,
            joined.len()
        );

        // Derived share of all establishments in this result set, recomputed
        // fresh on every run.
        let total_establishments: f64 = joined
            .iter()
            .map(|record| record.metrics.get_or_zero("establishments"))
            .sum();
        for record in &mut joined {
            if let Some(establishments) = record.metrics.get("establishments") {
                record.metrics.insert(
                    "market_share",
                    metrics::market_share(establishments, total_establishments),
                );
            }
        }

        let top = presenter::rank_top_n(joined, metric, top_n);
        info!("kept {} ranked entries", top.len());
        if let Some(headline) = top.headline() {
            info!(
                "headline market: {} ({} = {:.2})",
                headline.display_name(),
                metric.label(),
                headline.score
            );
        }
        let entries = top
            .into_entries()
            .into_iter()
            .enumerate()
            .map(|(index, entry)| ReportEntry {
                rank: index + 1,
                name: entry.display_name(),
                drill_path: presenter::drill_path(&entry),
                key: entry.key,
                score: entry.score,
                metrics: entry.metrics,
                state_rank: entry.state_rank,
                national_rank: entry.national_rank,
            })
            .collect();

        Ok(MarketReport {
            metadata: ReportMetadata {
                generated_at: Utc::now(),
                source: self.source.clone(),
                queries_issued,
                rows_fetched,
                duration_seconds: started.elapsed().as_secs_f64(),
            },
            title: view.title(),
            metric_label: metric.label().to_string(),
            entries,
        })
    }

    async fn fetch(&self, spec: &QuerySpec) -> Result<Vec<RawRow>, GatewayError> {
        match spec {
            QuerySpec::Rpc { procedure, params } => {
                self.gateway.rpc(procedure, params.clone()).await
            }
            QuerySpec::Table {
                table,
                columns,
                filter,
            } => {
                let filters: Vec<(&str, &str)> = filter
                    .as_ref()
                    .map(|(column, value)| vec![(*column, value.as_str())])
                    .unwrap_or_default();
                self.gateway.select(table, columns, &filters).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoKey;
    use serde_json::json;
    use std::collections::HashMap;

    /// In-memory gateway double: canned rows per procedure, optional
    /// forced failures.
    struct StaticGateway {
        responses: HashMap<&'static str, Vec<RawRow>>,
        failures: Vec<&'static str>,
    }

    impl StaticGateway {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
                failures: Vec::new(),
            }
        }

        fn with(mut self, procedure: &'static str, rows: Vec<serde_json::Value>) -> Self {
            self.responses.insert(
                procedure,
                rows.into_iter()
                    .map(|v| v.as_object().unwrap().clone())
                    .collect(),
            );
            self
        }

        fn failing(mut self, procedure: &'static str) -> Self {
            self.failures.push(procedure);
            self
        }
    }

    impl QueryGateway for StaticGateway {
        async fn rpc(
            &self,
            procedure: &str,
            _params: Value,
        ) -> Result<Vec<RawRow>, GatewayError> {
            if self.failures.contains(&procedure) {
                return Err(GatewayError::Api {
                    status: 500,
                    query: procedure.to_string(),
                    message: "forced failure".to_string(),
                });
            }
            Ok(self.responses.get(procedure).cloned().unwrap_or_default())
        }

        async fn select(
            &self,
            table: &str,
            _columns: &str,
            _filters: &[(&str, &str)],
        ) -> Result<Vec<RawRow>, GatewayError> {
            Ok(self.responses.get(table).cloned().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn test_state_overview_joins_and_ranks() {
        let gateway = StaticGateway::new()
            .with(
                queries::ENHANCED_MARKET_SCORES,
                vec![
                    json!({"statefp": "06", "state_name": "California", "market_score": 88}),
                    json!({"statefp": "48", "state_name": "Texas", "market_score": 92}),
                ],
            )
            .with(
                queries::MARKET_GROWTH_METRICS,
                vec![json!({"STATEFP": "48", "growth_rate_percentage": 6.1})],
            );

        let pipeline = Pipeline::new(gateway, "test");
        let report = pipeline
            .run(&ReportView::StateOverview, RankMetric::MarketScore, 5)
            .await
            .unwrap();

        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.entries[0].name, "Texas");
        assert_eq!(report.entries[0].score, 92.0);
        assert_eq!(
            report.entries[0].metrics.get("growth_rate_percentage"),
            Some(6.1)
        );
        assert_eq!(
            report.entries[0].drill_path.as_deref(),
            Some("/state-market-report/48")
        );
        assert_eq!(report.metadata.queries_issued, 6);
        assert_eq!(report.metadata.rows_fetched, 3);
    }

    #[tokio::test]
    async fn test_failed_secondary_degrades_to_absent_metrics() {
        let gateway = StaticGateway::new()
            .with(
                queries::ENHANCED_MARKET_SCORES,
                vec![json!({"statefp": "06", "state_name": "California", "market_score": 88})],
            )
            .failing(queries::MARKET_GROWTH_METRICS);

        let pipeline = Pipeline::new(gateway, "test");
        let report = pipeline
            .run(&ReportView::StateOverview, RankMetric::MarketScore, 5)
            .await
            .unwrap();

        assert_eq!(report.entries.len(), 1);
        assert_eq!(
            report.entries[0].metrics.get("growth_rate_percentage"),
            None
        );
    }

    #[tokio::test]
    async fn test_empty_primary_yields_empty_report() {
        let pipeline = Pipeline::new(StaticGateway::new(), "test");
        let report = pipeline
            .run(
                &ReportView::CountyOpportunities {
                    statefp: "01".to_string(),
                },
                RankMetric::GrowthRate,
                5,
            )
            .await
            .unwrap();

        assert!(report.is_empty());
        assert!(report.headline().is_none());
    }

    #[tokio::test]
    async fn test_county_profile_ranks_similar_markets() {
        let gateway = StaticGateway::new()
            .with(
                queries::MARKET_SIMILARITY_ANALYSIS,
                vec![
                    json!({"county_name": "Jefferson County", "statefp": "01", "similarity_score": 100}),
                    json!({"county_name": "Shelby County", "statefp": "01", "similarity_score": 83}),
                ],
            )
            .with(
                queries::COMPREHENSIVE_COUNTY_DATA,
                vec![json!({"county_name": "Jefferson County", "statefp": "01", "median_income": 61000})],
            );

        let pipeline = Pipeline::new(gateway, "test");
        let view = ReportView::CountyProfile {
            county: "Jefferson County".to_string(),
            statefp: "01".to_string(),
        };
        let report = pipeline.run(&view, RankMetric::MedianIncome, 5).await.unwrap();

        assert_eq!(report.entries.len(), 2);
        // The subject county carries the comprehensive data; its similar
        // market does not, and still survives the left join.
        assert_eq!(report.entries[0].key, GeoKey::county("01", "Jefferson County"));
        assert_eq!(report.entries[0].metrics.get("median_income"), Some(61_000.0));
        assert_eq!(report.entries[1].metrics.get("median_income"), None);
    }

    #[tokio::test]
    async fn test_market_share_derived_across_result_set() {
        let gateway = StaticGateway::new().with(
            queries::MARKET_OPPORTUNITIES,
            vec![
                json!({"county_name": "A County", "statefp": "01", "establishments": 10}),
                json!({"county_name": "B County", "statefp": "01", "establishments": 20}),
                json!({"county_name": "C County", "statefp": "01", "establishments": 30}),
            ],
        );

        let pipeline = Pipeline::new(gateway, "test");
        let view = ReportView::CountyOpportunities {
            statefp: "01".to_string(),
        };
        let report = pipeline.run(&view, RankMetric::MarketScore, 5).await.unwrap();

        let c_county = report
            .entries
            .iter()
            .find(|e| e.key.county.as_deref() == Some("C County"))
            .unwrap();
        assert_eq!(c_county.metrics.get("market_share"), Some(50.0));
    }

    #[test]
    fn test_plans_are_scoped_and_primary_first() {
        let view = ReportView::CountyOpportunities {
            statefp: "48".to_string(),
        };
        let plan = view.plan();
        assert_eq!(plan[0].name(), queries::MARKET_OPPORTUNITIES);
        for query in &plan {
            match &query.spec {
                QuerySpec::Rpc { params, .. } => assert_eq!(params["p_state_fp"], "48"),
                QuerySpec::Table { filter, .. } => {
                    let (column, value) = filter.as_ref().expect("county table is state-scoped");
                    assert_eq!(*column, "statefp");
                    assert_eq!(value, "48");
                }
            }
        }

        assert_eq!(ReportView::StateOverview.plan().len(), 6);
        assert_eq!(ReportView::MetroRankings.plan().len(), 1);
    }

    #[tokio::test]
    async fn test_table_source_joins_into_report() {
        let gateway = StaticGateway::new()
            .with(
                queries::ENHANCED_MARKET_SCORES,
                vec![json!({"statefp": "06", "state_name": "California", "market_score": 88})],
            )
            .with(
                "state_market_data",
                vec![json!({"statefp": "06", "median_income": 84000, "population": 39000000})],
            );

        let pipeline = Pipeline::new(gateway, "test");
        let report = pipeline
            .run(&ReportView::StateOverview, RankMetric::MarketScore, 5)
            .await
            .unwrap();

        assert_eq!(report.entries[0].metrics.get("median_income"), Some(84_000.0));
    }
}
