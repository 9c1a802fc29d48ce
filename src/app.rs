use std::time::Duration;

use reqwest::Client;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};

use crate::cli::{Cli, Command, ComposeArgs, DiscoverArgs, JobFileArgs, SearchArgs};
use crate::entrez::{EntrezClient, RetryPolicy};
use crate::job::{Job, JobError};
use crate::variants::{Discoverer, DiscoveryEvent, normalize_term};

/// TCP connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-request timeout; a 200-record efetch can take a while.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("{0} must not be empty")]
    EmptyTerm(&'static str),
}

pub async fn run(cli: Cli) -> Result<(), AppError> {
    let retry = RetryPolicy {
        attempts: cli.retries,
        delay: Duration::from_secs(cli.retry_delay_secs),
    };

    match cli.command {
        Command::Search(args) => {
            let entrez = EntrezClient::from_env(http_client()?, retry);
            search(&entrez, cli.limit, args).await
        }
        Command::Discover(args) => {
            let entrez = EntrezClient::from_env(http_client()?, retry);
            discover(&entrez, cli.limit, args).await
        }
        Command::Report(args) => report(args),
        Command::Compose(args) => compose(args),
    }
}

fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(HTTP_TIMEOUT)
        .build()
}

/// Run both discoveries with live progress on stderr, returning the finished job.
pub async fn submit(
    entrez: &EntrezClient,
    limit: usize,
    term1: &str,
    term2: &str,
) -> Result<Job, AppError> {
    if term1.trim().is_empty() {
        return Err(AppError::EmptyTerm("term1"));
    }
    if term2.trim().is_empty() {
        return Err(AppError::EmptyTerm("term2"));
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_progress(rx));

    let job = {
        let discoverer = Discoverer::new(entrez, entrez)
            .with_limit(limit)
            .with_events(tx);
        Job::run(&discoverer, term1, term2).await
    };

    if let Err(e) = printer.await {
        warn!(error = %e, "progress printer stopped unexpectedly");
    }
    Ok(job)
}

async fn search(entrez: &EntrezClient, limit: usize, args: SearchArgs) -> Result<(), AppError> {
    info!(term1 = %args.term1, term2 = %args.term2, "search");

    let job = submit(entrez, limit, &args.term1, &args.term2).await?;

    for line in job.event_lines() {
        print!("{line}");
    }
    if args.compose {
        println!("{}", job.combined_query(args.proximity));
    }
    if let Some(ref path) = args.save {
        job.save(path)?;
        eprintln!("job {} saved to {}", job.id, path.display());
    }
    if job.is_partial() {
        eprintln!("note: some article batches could not be fetched; counts are incomplete");
    }
    Ok(())
}

async fn discover(entrez: &EntrezClient, limit: usize, args: DiscoverArgs) -> Result<(), AppError> {
    if args.term.trim().is_empty() {
        return Err(AppError::EmptyTerm("term"));
    }
    let term = normalize_term(&args.term);
    info!(term = %term, "discover");

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_progress(rx));
    let discovery = Discoverer::new(entrez, entrez)
        .with_limit(limit)
        .with_events(tx)
        .discover(&term)
        .await;
    if let Err(e) = printer.await {
        warn!(error = %e, "progress printer stopped unexpectedly");
    }

    if discovery.variants.is_empty() {
        eprintln!("no variants of {term} found");
    }
    for (word, count) in discovery.variants.most_common() {
        println!("{word}\t{count}");
    }
    if discovery.failed_chunks > 0 {
        eprintln!(
            "note: {} article batches could not be fetched; counts are incomplete",
            discovery.failed_chunks
        );
    }
    Ok(())
}

fn report(args: JobFileArgs) -> Result<(), AppError> {
    let job = Job::load(&args.job)?;
    for line in job.event_lines() {
        print!("{line}");
    }
    Ok(())
}

fn compose(args: ComposeArgs) -> Result<(), AppError> {
    let job = Job::load(&args.job)?;
    println!("{}", job.combined_query(args.proximity));
    Ok(())
}

async fn print_progress(mut events: UnboundedReceiver<DiscoveryEvent>) {
    while let Some(event) = events.recv().await {
        if let Some(line) = format_event(&event) {
            eprintln!("{line}");
        }
    }
}

fn format_event(event: &DiscoveryEvent) -> Option<String> {
    match event {
        DiscoveryEvent::RoundStarted { term, round, query } => {
            debug!(term = %term, round, query = %query, "round started");
            None
        }
        DiscoveryEvent::RoundFinished {
            term,
            round,
            identifiers,
            records,
            new_variants,
            failed_chunks,
        } => {
            let mut line = format!(
                "{term}: round {round}, {identifiers} ids, {records} records, {new_variants} new variants"
            );
            if *failed_chunks > 0 {
                line.push_str(&format!(" ({failed_chunks} batches failed)"));
            }
            Some(line)
        }
        DiscoveryEvent::Finished {
            term,
            rounds,
            variants,
        } => Some(format!("{term}: {variants} variants after {rounds} rounds")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_started_is_silent() {
        let event = DiscoveryEvent::RoundStarted {
            term: "gene[tiab]".into(),
            round: 1,
            query: "gene[tiab]".into(),
        };
        assert_eq!(format_event(&event), None);
    }

    #[test]
    fn round_finished_mentions_failures_only_when_present() {
        let mut event = DiscoveryEvent::RoundFinished {
            term: "gene[tiab]".into(),
            round: 2,
            identifiers: 150,
            records: 148,
            new_variants: 3,
            failed_chunks: 0,
        };
        assert_eq!(
            format_event(&event).unwrap(),
            "gene[tiab]: round 2, 150 ids, 148 records, 3 new variants"
        );

        if let DiscoveryEvent::RoundFinished { failed_chunks, .. } = &mut event {
            *failed_chunks = 1;
        }
        assert!(format_event(&event).unwrap().ends_with("(1 batches failed)"));
    }

    #[test]
    fn finished_summarizes() {
        let event = DiscoveryEvent::Finished {
            term: "cancer[tiab]".into(),
            rounds: 4,
            variants: 12,
        };
        assert_eq!(
            format_event(&event).unwrap(),
            "cancer[tiab]: 12 variants after 4 rounds"
        );
    }
}
