//! CLI entry point for segfetch.

use anyhow::{Context, Result};
use clap::Parser;
use segfetch_core::{FetchLoop, HttpTransport, Transport, TransportOptions};
use tokio::io::BufReader;
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // stdout carries the run report, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let plan = args.launch_plan()?;
    info!(
        mode = plan.run.mode.label(),
        folder = %plan.run.folder.display(),
        "segfetch starting"
    );

    let mut transport = select_transport(plan.transport);
    let input = BufReader::new(tokio::io::stdin());
    let mut fetch_loop = FetchLoop::new(&plan.run, transport.as_mut(), input, std::io::stdout());

    let summary = fetch_loop.run(&plan.target).await?;

    if let Some(path) = &args.summary_json {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing run summary to {}", path.display()))?;
        debug!(path = %path.display(), "run summary written");
    }

    Ok(())
}

/// Picks the transport for the run. Chosen once, before connecting.
fn select_transport(options: TransportOptions) -> Box<dyn Transport> {
    Box::new(HttpTransport::new(options))
}
