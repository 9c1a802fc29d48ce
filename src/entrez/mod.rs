//! NCBI E-utilities client: identifier search (esearch) and article retrieval (efetch).

pub mod types;
pub mod xml;

use std::env;
use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

pub use types::{FetchOutcome, Pmid, Record};
use types::ESearchResponse;

const API_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const TOOL_NAME: &str = "stemscout";
/// efetch batch limit.
pub const MAX_CHUNK_SIZE: usize = 200;
/// Default `retmax` for identifier searches.
pub const DEFAULT_SEARCH_LIMIT: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum EntrezError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("E-utilities rate limit exceeded")]
    RateLimited,

    #[error("E-utilities request failed: status {0}")]
    Status(u16),

    #[error("E-utilities error: {0}")]
    Api(String),

    #[error("invalid E-utilities URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("malformed JSON response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed XML response: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("unexpected XML root element <{0}>")]
    UnexpectedRoot(String),

    #[error("article is missing required field {0}")]
    MissingField(&'static str),
}

impl EntrezError {
    /// Coarse class used in log fields: transport vs. malformed response.
    pub fn kind(&self) -> &'static str {
        match self {
            EntrezError::Network(_)
            | EntrezError::RateLimited
            | EntrezError::Status(_)
            | EntrezError::InvalidUrl(_) => "transport",
            EntrezError::Api(_)
            | EntrezError::Json(_)
            | EntrezError::Xml(_)
            | EntrezError::UnexpectedRoot(_)
            | EntrezError::MissingField(_) => "malformed",
        }
    }
}

/// Looks up record identifiers for a boolean query.
///
/// Failures are absorbed: an empty result means "no matches" or "search failed".
pub trait IdentifierSearch {
    async fn search(&self, query: &str, limit: usize) -> Vec<Pmid>;
}

/// Retrieves title and abstract for a list of identifiers.
pub trait ArticleFetcher {
    async fn fetch(&self, ids: &[Pmid]) -> FetchOutcome;
}

/// Fixed-delay retry: `attempts` tries in total, `delay` between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, EntrezError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EntrezError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    warn!(
                        error = %e,
                        kind = e.kind(),
                        attempt,
                        attempts,
                        "{label} failed, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Split identifiers into ordered batches of at most `size`.
pub fn chunk<T>(items: &[T], size: usize) -> impl Iterator<Item = &[T]> {
    items.chunks(size.max(1))
}

#[derive(Clone)]
struct ApiKey(String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// HTTP client for PubMed over E-utilities.
///
/// Configuration via environment variables:
/// - `NCBI_API_KEY`: raises the NCBI rate limit (optional)
/// - `NCBI_EMAIL`: contact address sent with each request (optional)
/// - `EUTILS_BASE_URL`: alternate E-utilities endpoint (optional)
#[derive(Debug, Clone)]
pub struct EntrezClient {
    http: Client,
    api_key: Option<ApiKey>,
    email: Option<String>,
    base_url: String,
    retry: RetryPolicy,
}

impl EntrezClient {
    pub fn from_env(http: Client, retry: RetryPolicy) -> Self {
        let api_key = non_empty_var("NCBI_API_KEY").map(ApiKey);
        if api_key.is_some() {
            debug!("NCBI API key configured");
        } else {
            info!("NCBI_API_KEY not set; requests are limited to 3 per second");
        }
        Self {
            http,
            api_key,
            email: non_empty_var("NCBI_EMAIL"),
            base_url: non_empty_var("EUTILS_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| API_BASE.to_string()),
            retry,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str, retry: RetryPolicy) -> Self {
        Self {
            http,
            api_key: None,
            email: None,
            base_url: base_url.to_string(),
            retry,
        }
    }

    fn endpoint(&self, name: &str, params: &[(&str, &str)]) -> Result<Url, EntrezError> {
        let mut url = Url::parse_with_params(&format!("{}/{name}", self.base_url), params)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("tool", TOOL_NAME);
            if let Some(ref email) = self.email {
                query.append_pair("email", email);
            }
            if let Some(ref key) = self.api_key {
                query.append_pair("api_key", &key.0);
            }
        }
        Ok(url)
    }

    async fn get_text(&self, url: Url) -> Result<String, EntrezError> {
        let response = self
            .http
            .get(url)
            .header("User-Agent", crate::USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(EntrezError::RateLimited);
        }
        if !status.is_success() {
            return Err(EntrezError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }

    async fn esearch(&self, query: &str, limit: usize) -> Result<Vec<Pmid>, EntrezError> {
        let retmax = limit.to_string();
        let url = self.endpoint(
            "esearch.fcgi",
            &[
                ("db", "pubmed"),
                ("retmode", "json"),
                ("retmax", retmax.as_str()),
                ("term", query),
            ],
        )?;

        let body: ESearchResponse = serde_json::from_str(&self.get_text(url).await?)?;
        if let Some(message) = body.error {
            return Err(EntrezError::Api(message));
        }
        let result = body
            .esearchresult
            .ok_or_else(|| EntrezError::Api("response has no esearchresult".into()))?;
        if let Some(message) = result.error {
            return Err(EntrezError::Api(message));
        }
        Ok(result.idlist.into_iter().map(Pmid).collect())
    }

    async fn efetch(&self, ids: &[Pmid]) -> Result<Vec<Record>, EntrezError> {
        let id_list = ids
            .iter()
            .map(|id| id.0.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let url = self.endpoint(
            "efetch.fcgi",
            &[("db", "pubmed"), ("retmode", "xml"), ("id", id_list.as_str())],
        )?;

        let body = self.get_text(url).await?;
        xml::parse_articles(&body)
    }
}

impl IdentifierSearch for EntrezClient {
    async fn search(&self, query: &str, limit: usize) -> Vec<Pmid> {
        debug!(query, limit, "esearch");
        match self.retry.run("esearch", || self.esearch(query, limit)).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, kind = e.kind(), query, "esearch gave up, treating as no results");
                Vec::new()
            }
        }
    }
}

impl ArticleFetcher for EntrezClient {
    async fn fetch(&self, ids: &[Pmid]) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();
        for batch in chunk(ids, MAX_CHUNK_SIZE) {
            debug!(size = batch.len(), "efetch chunk");
            match self.retry.run("efetch", || self.efetch(batch)).await {
                Ok(records) => outcome.records.extend(records),
                Err(e) => {
                    warn!(
                        error = %e,
                        kind = e.kind(),
                        size = batch.len(),
                        first = %batch[0],
                        "efetch gave up, dropping chunk"
                    );
                    outcome.failed_chunks += 1;
                }
            }
        }
        outcome
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_450_into_200_200_50() {
        let ids: Vec<u32> = (0..450).collect();
        let chunks: Vec<&[u32]> = chunk(&ids, 200).collect();

        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![200, 200, 50]);
        assert_eq!(chunks.concat(), ids);
    }

    #[test]
    fn chunk_empty_yields_nothing() {
        let ids: Vec<Pmid> = Vec::new();
        assert_eq!(chunk(&ids, 200).count(), 0);
    }

    #[test]
    fn error_kinds_follow_taxonomy() {
        assert_eq!(EntrezError::Status(502).kind(), "transport");
        assert_eq!(EntrezError::RateLimited.kind(), "transport");
        assert_eq!(EntrezError::MissingField("PMID").kind(), "malformed");
        assert_eq!(EntrezError::UnexpectedRoot("x".into()).kind(), "malformed");
    }

    #[test]
    fn api_key_is_redacted_in_debug() {
        let client = EntrezClient {
            http: Client::new(),
            api_key: Some(ApiKey("secret-key".into())),
            email: None,
            base_url: API_BASE.to_string(),
            retry: RetryPolicy::default(),
        };
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn retry_policy_stops_after_success() {
        let policy = RetryPolicy {
            attempts: 3,
            delay: Duration::ZERO,
        };
        let mut calls = 0;
        let result = policy
            .run("op", || {
                calls += 1;
                let outcome = if calls < 2 {
                    Err(EntrezError::Status(500))
                } else {
                    Ok(calls)
                };
                async move { outcome }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn retry_policy_zero_attempts_still_runs_once() {
        let policy = RetryPolicy {
            attempts: 0,
            delay: Duration::ZERO,
        };
        let mut calls = 0;
        let result: Result<(), _> = policy
            .run("op", || {
                calls += 1;
                async { Err(EntrezError::RateLimited) }
            })
            .await;

        assert!(matches!(result, Err(EntrezError::RateLimited)));
        assert_eq!(calls, 1);
    }
}
