//! Remote query gateway client.
//!
//! The hosted data backend exposes two query surfaces: named stored
//! procedures (`POST {base}/rest/v1/rpc/{procedure}`) and filtered table
//! reads (`GET {base}/rest/v1/{table}`). Both return JSON row arrays.
//! The gateway is always passed in explicitly (generic parameter), never
//! held as a module-level singleton, so tests can substitute a double.

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// One row as returned by the gateway.
pub type RawRow = serde_json::Map<String, Value>;

/// Structured gateway failure taxonomy.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("cannot connect to gateway at {url}")]
    Connect { url: String },

    #[error("query {query} timed out after {seconds}s")]
    Timeout { query: String, seconds: u64 },

    #[error("query {query} failed: {source}")]
    Transport {
        query: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("gateway returned {status} for {query}: {message}")]
    Api {
        status: u16,
        query: String,
        message: String,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Typed request interface to the managed data backend.
#[allow(async_fn_in_trait)]
pub trait QueryGateway {
    /// Call a named stored procedure with JSON params.
    async fn rpc(&self, procedure: &str, params: Value) -> Result<Vec<RawRow>, GatewayError>;

    /// Read columns from a table with equality filters.
    async fn select(
        &self,
        table: &str,
        columns: &str,
        filters: &[(&str, &str)],
    ) -> Result<Vec<RawRow>, GatewayError>;
}

/// HTTP implementation of [`QueryGateway`] over reqwest.
pub struct HttpGateway {
    base_url: String,
    api_key: Option<String>,
    timeout_seconds: u64,
    client: reqwest::Client,
}

impl HttpGateway {
    /// Build a gateway client with a per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout_seconds: u64,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(GatewayError::Client)?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            timeout_seconds,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn rpc_url(&self, procedure: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, procedure)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Attach auth headers when an API key is configured.
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request
                .header("apikey", key)
                .header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    /// Send a request and decode the row array, mapping errors to the taxonomy.
    async fn execute(
        &self,
        query: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Vec<RawRow>, GatewayError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout {
                    query: query.to_string(),
                    seconds: self.timeout_seconds,
                }
            } else if e.is_connect() {
                GatewayError::Connect {
                    url: self.base_url.clone(),
                }
            } else {
                GatewayError::Transport {
                    query: query.to_string(),
                    source: e,
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                query: query.to_string(),
                message: api_error_message(&body),
            });
        }

        let body: Value = response.json().await.map_err(|e| GatewayError::Transport {
            query: query.to_string(),
            source: e,
        })?;

        Ok(rows_from_body(query, body))
    }
}

impl QueryGateway for HttpGateway {
    async fn rpc(&self, procedure: &str, params: Value) -> Result<Vec<RawRow>, GatewayError> {
        debug!("rpc {} params={}", procedure, params);
        let request = self.authorize(self.client.post(self.rpc_url(procedure)).json(&params));
        self.execute(procedure, request).await
    }

    async fn select(
        &self,
        table: &str,
        columns: &str,
        filters: &[(&str, &str)],
    ) -> Result<Vec<RawRow>, GatewayError> {
        debug!("select {} columns={}", table, columns);
        let mut query: Vec<(String, String)> = vec![("select".to_string(), columns.to_string())];
        for (column, value) in filters {
            query.push((column.to_string(), format!("eq.{}", value)));
        }
        let request = self.authorize(self.client.get(self.table_url(table)).query(&query));
        self.execute(table, request).await
    }
}

/// Interpret a response body as rows.
///
/// A `null` or non-array body means "no data for this selection", not an
/// error; non-object array elements are skipped.
fn rows_from_body(query: &str, body: Value) -> Vec<RawRow> {
    match body {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(row) => Some(row),
                other => {
                    debug!("{}: skipping non-object row: {}", query, other);
                    None
                }
            })
            .collect(),
        Value::Null => Vec::new(),
        other => {
            warn!("{}: expected a row array, got {}; treating as no data", query, other);
            Vec::new()
        }
    }
}

/// Extract the `message` field from a structured error body, or fall back
/// to the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.chars().take(200).collect())
}
