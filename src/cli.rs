use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::entrez::DEFAULT_SEARCH_LIMIT;
use crate::variants::DEFAULT_PROXIMITY;

#[derive(Parser, Debug)]
#[command(name = "stemscout")]
#[command(
    version,
    about = "Discover PubMed title/abstract variants of two terms and combine them into a proximity query"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Maximum identifiers requested per search round
    #[arg(long, global = true, default_value_t = DEFAULT_SEARCH_LIMIT)]
    pub limit: usize,

    /// Attempts per E-utilities request before giving up
    #[arg(long, global = true, default_value_t = 3)]
    pub retries: u32,

    /// Seconds to wait between attempts
    #[arg(long, global = true, default_value_t = 2)]
    pub retry_delay_secs: u64,

    /// Log per-round queries and debug detail to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Discover variants of two terms and print the result stream
    Search(SearchArgs),

    /// Discover variants of a single term
    Discover(DiscoverArgs),

    /// Replay the result stream of a saved job
    Report(JobFileArgs),

    /// Build the combined proximity query from a saved job
    Compose(ComposeArgs),
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// First search term; `[tiab]` is appended if missing
    pub term1: String,

    /// Second search term; `[tiab]` is appended if missing
    pub term2: String,

    /// Write the job to this file for later `report` or `compose`
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Also print the combined query
    #[arg(long)]
    pub compose: bool,

    /// Maximum word distance in combined clauses
    #[arg(short, long, default_value_t = DEFAULT_PROXIMITY, allow_negative_numbers = true)]
    pub proximity: i32,
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Search term; `[tiab]` is appended if missing
    pub term: String,
}

#[derive(Args, Debug)]
pub struct JobFileArgs {
    /// Job file written by `search --save`
    pub job: PathBuf,
}

#[derive(Args, Debug)]
pub struct ComposeArgs {
    /// Job file written by `search --save`
    pub job: PathBuf,

    /// Maximum word distance in combined clauses
    #[arg(short, long, default_value_t = DEFAULT_PROXIMITY, allow_negative_numbers = true)]
    pub proximity: i32,
}
