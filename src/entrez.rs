//! NCBI E-utilities client.
//!
//! Implements [`Database`] with two endpoints:
//!
//! - `esearch.fcgi` (JSON mode) for the identifier list
//! - `efetch.fcgi` (XML mode) for one full record per call
//!
//! Every request carries the configured `tool` and `email` so NCBI can contact
//! the caller. Requests are spaced at least `min_interval` apart, which keeps a
//! run of up to 1000 fetches under NCBI's 3 requests per second. Failures are
//! reported as-is; nothing is retried.

use crate::database::{Database, RecordId};
use crate::error::{PubmedError, Result};
use crate::record::RawRecord;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

/// E-utilities base URL
pub const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Tool name reported to NCBI
pub const DEFAULT_TOOL: &str = "pubmed-abstracts";

/// Contact address reported to NCBI when none is configured
pub const DEFAULT_EMAIL: &str = "pubmed-abstracts@example.com";

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default spacing between requests in milliseconds (3 requests per second)
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 334;

/// Connection and identity settings for E-utilities
#[derive(Debug, Clone, PartialEq)]
pub struct EntrezConfig {
    /// Base URL the endpoint names are appended to
    pub base_url: String,
    /// Contact email sent with every request
    pub email: String,
    /// Tool name sent with every request
    pub tool: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Minimum time between the starts of two requests
    pub min_interval: Duration,
}

impl Default for EntrezConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            email: DEFAULT_EMAIL.to_string(),
            tool: DEFAULT_TOOL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            min_interval: Duration::from_millis(DEFAULT_MIN_INTERVAL_MS),
        }
    }
}

impl EntrezConfig {
    /// Check the settings before any request is made
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.base_url)
            .map_err(|e| PubmedError::Input(format!("Invalid base URL {}: {}", self.base_url, e)))?;
        if self.email.trim().is_empty() {
            return Err(PubmedError::Input("Contact email must not be empty".to_string()));
        }
        if self.tool.trim().is_empty() {
            return Err(PubmedError::Input("Tool name must not be empty".to_string()));
        }
        Ok(())
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), name)
    }
}

/// PubMed client over E-utilities
pub struct EntrezClient {
    client: reqwest::Client,
    config: EntrezConfig,
    last_request: Mutex<Option<Instant>>,
}

impl EntrezClient {
    /// Create a new EntrezClient
    pub fn new(config: EntrezConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .user_agent(format!(
                "{}/{} (mailto:{})",
                config.tool,
                env!("CARGO_PKG_VERSION"),
                config.email
            ))
            .timeout(config.timeout)
            .build()
            .map_err(|e| PubmedError::Input(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            last_request: Mutex::new(None),
        })
    }

    /// Wait until `min_interval` has passed since the previous request started.
    ///
    /// The lock is held through the sleep so callers sharing a client queue up.
    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.config.min_interval {
                let wait = self.config.min_interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "Pacing E-utilities request");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// GET an endpoint with identity parameters appended, returning the body
    async fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String> {
        self.wait_for_rate_limit().await;

        let response = self
            .client
            .get(self.config.endpoint(endpoint))
            .query(params)
            .query(&[
                ("tool", self.config.tool.as_str()),
                ("email", self.config.email.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!(endpoint = endpoint, "Rate limited by E-utilities");
            return Err(PubmedError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PubmedError::Api {
                code: status.as_u16(),
                message: format!("{} returned {}: {}", endpoint, status, body.trim()),
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl Database for EntrezClient {
    async fn search(&self, term: &str, max_results: usize) -> Result<Vec<RecordId>> {
        let retmax = max_results.to_string();
        debug!(term = term, retmax = max_results, "esearch");

        let body = self
            .get(
                "esearch.fcgi",
                &[
                    ("db", "pubmed"),
                    ("term", term),
                    ("retmax", retmax.as_str()),
                    ("retmode", "json"),
                ],
            )
            .await?;

        parse_esearch(&body)
    }

    async fn fetch(&self, id: &RecordId) -> Result<RawRecord> {
        debug!(pmid = %id, "efetch");

        let body = self
            .get(
                "efetch.fcgi",
                &[("db", "pubmed"), ("id", id.as_str()), ("retmode", "xml")],
            )
            .await?;

        RawRecord::from_efetch_xml(&body)
    }
}

// === E-utilities Response Types ===

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    #[serde(default)]
    esearchresult: Option<ESearchResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
    #[serde(rename = "ERROR", default)]
    error: Option<String>,
}

/// Extract the identifier list from an esearch JSON body
fn parse_esearch(body: &str) -> Result<Vec<RecordId>> {
    let response: ESearchResponse = serde_json::from_str(body)?;

    if let Some(message) = response.error {
        return Err(PubmedError::Api { code: 200, message });
    }

    let result = response
        .esearchresult
        .ok_or_else(|| PubmedError::Parse("esearch response has no esearchresult".to_string()))?;

    if let Some(message) = result.error {
        return Err(PubmedError::Api { code: 200, message });
    }

    Ok(result.idlist.into_iter().map(RecordId).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_esearch() {
        let body = r#"{"header":{"type":"esearch","version":"0.3"},
            "esearchresult":{"count":"2","retmax":"2","retstart":"0",
            "idlist":["38000002","38000001"],"translationset":[]}}"#;
        let ids = parse_esearch(body).expect("Parse failed");
        assert_eq!(ids, vec![RecordId::from("38000002"), RecordId::from("38000001")]);
    }

    #[test]
    fn test_parse_esearch_empty() {
        let body = r#"{"esearchresult":{"count":"0","idlist":[],
            "warninglist":{"phrasesignored":[],"quotedphrasesnotfound":[],
            "outputmessages":["No items found."]}}}"#;
        assert!(parse_esearch(body).expect("Parse failed").is_empty());
    }

    #[test]
    fn test_parse_esearch_errors() {
        let body = r#"{"esearchresult":{"ERROR":"Invalid query"}}"#;
        assert!(matches!(parse_esearch(body), Err(PubmedError::Api { .. })));

        let body = r#"{"error":"API rate limit exceeded","api-key":"1.2.3.4"}"#;
        assert!(matches!(parse_esearch(body), Err(PubmedError::Api { .. })));

        assert!(matches!(parse_esearch("<html>"), Err(PubmedError::Parse(_))));
        assert!(matches!(parse_esearch("{}"), Err(PubmedError::Parse(_))));
    }

    #[test]
    fn test_config_validate() {
        assert!(EntrezConfig::default().validate().is_ok());

        let config = EntrezConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PubmedError::Input(_))));

        let config = EntrezConfig {
            email: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PubmedError::Input(_))));
    }

    #[test]
    fn test_endpoint() {
        let config = EntrezConfig {
            base_url: "http://localhost:1234/eutils/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.endpoint("esearch.fcgi"),
            "http://localhost:1234/eutils/esearch.fcgi"
        );
    }
}
