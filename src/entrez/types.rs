use std::fmt;

use serde::{Deserialize, Serialize};

/// Abstract text used when a PubMed record carries no abstract.
pub const NO_ABSTRACT: &str = "No abstract available";

/// PubMed record identifier. Kept as the decimal string the API returns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pmid(pub String);

impl fmt::Display for Pmid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Pmid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Title and abstract of one fetched article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub pmid: Pmid,
    pub title: String,
    pub abstract_text: String,
}

impl Record {
    /// Lowercased `title abstract`, the text variants are matched against.
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.title, self.abstract_text).to_lowercase()
    }
}

/// Records returned by a fetch, plus the number of chunks that were given up on.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub records: Vec<Record>,
    pub failed_chunks: usize,
}

/// Response body of `esearch.fcgi?retmode=json`.
#[derive(Debug, Deserialize)]
pub struct ESearchResponse {
    pub esearchresult: Option<ESearchResult>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ESearchResult {
    #[serde(default)]
    pub idlist: Vec<String>,
    #[serde(rename = "ERROR")]
    pub error: Option<String>,
}
