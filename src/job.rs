//! A search request's state: both terms' discoveries, owned by the caller and
//! passed explicitly to the report and compose steps.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::entrez::{ArticleFetcher, IdentifierSearch};
use crate::variants::{Discoverer, Discovery, VariantCount, compose, normalize_term};

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("job file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermResult {
    pub query: String,
    pub variants: VariantCount,
    pub rounds: u32,
    pub failed_chunks: usize,
}

impl From<Discovery> for TermResult {
    fn from(d: Discovery) -> Self {
        Self {
            query: d.term,
            variants: d.variants,
            rounds: d.rounds,
            failed_chunks: d.failed_chunks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub term1: TermResult,
    pub term2: TermResult,
}

impl Job {
    /// Normalize both terms and discover their variants, one after the other.
    pub async fn run<S, F>(discoverer: &Discoverer<'_, S, F>, term1: &str, term2: &str) -> Self
    where
        S: IdentifierSearch,
        F: ArticleFetcher,
    {
        let id = Uuid::new_v4();
        let term1 = normalize_term(term1);
        let term2 = normalize_term(term2);
        info!(%id, term1 = %term1, term2 = %term2, "job started");

        let first = TermResult::from(discoverer.discover(&term1).await);
        let second = TermResult::from(discoverer.discover(&term2).await);

        let job = Self {
            id,
            term1: first,
            term2: second,
        };
        if job.is_partial() {
            warn!(
                %id,
                failed_chunks = job.term1.failed_chunks + job.term2.failed_chunks,
                "some article chunks could not be fetched; counts are incomplete"
            );
        }
        info!(
            %id,
            term1_variants = job.term1.variants.len(),
            term2_variants = job.term2.variants.len(),
            "job complete"
        );
        job
    }

    pub fn is_partial(&self) -> bool {
        self.term1.failed_chunks > 0 || self.term2.failed_chunks > 0
    }

    /// Results as `text/event-stream` frames: two summary lines, one JSON
    /// payload with both lists most-frequent-first, and a `DONE` marker.
    pub fn event_lines(&self) -> Vec<String> {
        let payload = serde_json::json!({
            "term1_variants": word_counts(&self.term1.variants),
            "term2_variants": word_counts(&self.term2.variants),
        });
        vec![
            format!(
                "data: Variants for Term 1 ({}): {}\n\n",
                self.term1.query,
                self.term1.variants.len()
            ),
            format!(
                "data: Variants for Term 2 ({}): {}\n\n",
                self.term2.query,
                self.term2.variants.len()
            ),
            format!("data: {payload}\n\n"),
            "data: DONE\n\n".to_string(),
        ]
    }

    /// Proximity query over both variant lists, most frequent first.
    pub fn combined_query(&self, proximity: i32) -> String {
        compose(
            &self.term1.variants.ranked_words(),
            &self.term2.variants.ranked_words(),
            proximity,
        )
    }

    pub fn save(&self, path: &Path) -> Result<(), JobError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!(id = %self.id, path = %path.display(), "job saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, JobError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

fn word_counts(variants: &VariantCount) -> Vec<serde_json::Value> {
    variants
        .most_common()
        .into_iter()
        .map(|(word, count)| serde_json::json!({ "word": word, "count": count }))
        .collect()
}
