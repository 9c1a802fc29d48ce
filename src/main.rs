mod app;
mod cli;
mod entrez;
mod job;
mod variants;

pub const USER_AGENT: &str = concat!("stemscout/", env!("CARGO_PKG_VERSION"));

use clap::Parser;
use cli::Cli;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(log_directive(cli.verbose).parse()?),
        )
        .init();

    debug!(command = ?cli.command, "starting stemscout");

    app::run(cli)
        .await
        .inspect_err(|e| tracing::error!("{e}"))?;
    Ok(())
}

fn log_directive(verbose: bool) -> &'static str {
    if verbose { "stemscout=debug" } else { "stemscout=info" }
}
