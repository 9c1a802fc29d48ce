use std::collections::BTreeSet;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use super::{Stem, VariantCount, exclusion_query};
use crate::entrez::{ArticleFetcher, DEFAULT_SEARCH_LIMIT, IdentifierSearch};

/// Progress notifications sent while a discovery loop runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    RoundStarted {
        term: String,
        round: u32,
        query: String,
    },
    RoundFinished {
        term: String,
        round: u32,
        identifiers: usize,
        records: usize,
        new_variants: usize,
        failed_chunks: usize,
    },
    Finished {
        term: String,
        rounds: u32,
        variants: usize,
    },
}

/// Result of one discovery run.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub term: String,
    pub variants: VariantCount,
    /// Number of identifier searches issued, including the final empty or stale one.
    pub rounds: u32,
    /// efetch chunks dropped after exhausting retries; non-zero means counts are partial.
    pub failed_chunks: usize,
}

/// Expands a root term into the word forms observed in matching titles and abstracts.
///
/// Each round searches, scans every fetched record, and then excludes all
/// forms seen so far from the next query. The loop stops when a search
/// returns nothing or a round turns up no unseen form. Counts accumulate
/// across rounds; identifiers are not de-duplicated between rounds.
pub struct Discoverer<'a, S, F> {
    search: &'a S,
    fetcher: &'a F,
    limit: usize,
    events: Option<UnboundedSender<DiscoveryEvent>>,
}

impl<'a, S: IdentifierSearch, F: ArticleFetcher> Discoverer<'a, S, F> {
    pub fn new(search: &'a S, fetcher: &'a F) -> Self {
        Self {
            search,
            fetcher,
            limit: DEFAULT_SEARCH_LIMIT,
            events: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_events(mut self, events: UnboundedSender<DiscoveryEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn discover(&self, term: &str) -> Discovery {
        let stem = Stem::from_term(term);
        let mut discovered: BTreeSet<String> = BTreeSet::new();
        let mut variants = VariantCount::default();
        let mut query = term.to_string();
        let mut rounds = 0;
        let mut failed_chunks = 0;

        info!(term, stem = stem.as_str(), "discovering variants");

        loop {
            rounds += 1;
            self.emit(DiscoveryEvent::RoundStarted {
                term: term.to_string(),
                round: rounds,
                query: query.clone(),
            });

            let ids = self.search.search(&query, self.limit).await;
            if ids.is_empty() {
                debug!(round = rounds, "no identifiers returned, stopping");
                self.emit(DiscoveryEvent::RoundFinished {
                    term: term.to_string(),
                    round: rounds,
                    identifiers: 0,
                    records: 0,
                    new_variants: 0,
                    failed_chunks: 0,
                });
                break;
            }

            let outcome = self.fetcher.fetch(&ids).await;
            failed_chunks += outcome.failed_chunks;

            let mut new_variants = 0;
            for record in &outcome.records {
                let text = record.searchable_text();
                for word in stem.find_variants(&text) {
                    if discovered.insert(word.to_string()) {
                        new_variants += 1;
                    }
                    variants.increment(word);
                }
            }

            info!(
                round = rounds,
                identifiers = ids.len(),
                records = outcome.records.len(),
                new_variants,
                failed_chunks = outcome.failed_chunks,
                "round complete"
            );
            self.emit(DiscoveryEvent::RoundFinished {
                term: term.to_string(),
                round: rounds,
                identifiers: ids.len(),
                records: outcome.records.len(),
                new_variants,
                failed_chunks: outcome.failed_chunks,
            });

            if new_variants == 0 {
                break;
            }
            query = exclusion_query(term, &discovered);
        }

        self.emit(DiscoveryEvent::Finished {
            term: term.to_string(),
            rounds,
            variants: variants.len(),
        });

        Discovery {
            term: term.to_string(),
            variants,
            rounds,
            failed_chunks,
        }
    }

    fn emit(&self, event: DiscoveryEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(event);
        }
    }
}
