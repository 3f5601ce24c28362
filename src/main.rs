#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # classtally
//!
//! Command-line entry point for the classroom grade collector. `collect`
//! downloads the submission export, refreshes every stale student from
//! their published autograder logs, and rewrites the dashboard snapshot;
//! `quota` just prints how much API quota is left.

use anyhow::Result;
use bpaf::*;
use classtally::{
    config,
    reconcile,
    remote::{GitHubRemote, Remote},
};
use dotenvy::dotenv;
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Run the full collection pipeline
    Collect,
    /// Print the remaining API quota
    Quota,
}

/// Parse the command line arguments and return a `Cmd` enum
fn options() -> Cmd {
    let collect = pure(Cmd::Collect)
        .to_options()
        .command("collect")
        .help("Download the export and refresh the grade snapshot");

    let quota = pure(Cmd::Quota)
        .to_options()
        .command("quota")
        .help("Show how much API quota is left");

    construct!([collect, quota])
        .to_options()
        .descr("Classroom grade collector")
        .run()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let filter_layer = LevelFilter::from_level(Level::INFO);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    match options() {
        Cmd::Collect => {
            let cfg = config::ensure_initialized()?;
            let remote = GitHubRemote::from_config(&cfg);
            reconcile::collect(&remote, &cfg).await?;
        }
        Cmd::Quota => {
            let cfg = config::ensure_initialized()?;
            let remote = GitHubRemote::from_config(&cfg);
            println!("{}", remote.rate_limit().await?);
        }
    }

    Ok(())
}
