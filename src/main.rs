//! Sumi-Mirror main entry point
//!
//! This is the command-line interface for the Sumi-Mirror offline website mirror.

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use sumi_mirror::config::{load_config_with_hash, Config};
use sumi_mirror::crawler::mirror;
use sumi_mirror::output::print_statistics;
use tracing_subscriber::EnvFilter;

/// Sumi-Mirror: an offline website mirror
///
/// Sumi-Mirror downloads every page and asset below a root URL, rewrites
/// the links inside HTML and CSS so the copy works offline, and writes the
/// files under a directory named after the root URL.
#[derive(Parser, Debug)]
#[command(name = "sumi-mirror")]
#[command(version)]
#[command(about = "An offline website mirror", long_about = None)]
struct Cli {
    /// Root URL of the site to mirror (prompted for when omitted)
    #[arg(value_name = "URL")]
    url: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            match load_config_with_hash(path) {
                Ok((config, hash)) => {
                    tracing::info!("Configuration loaded successfully (hash: {})", hash);
                    config
                }
                Err(e) => {
                    tracing::error!("Failed to load configuration: {}", e);
                    return Err(e.into());
                }
            }
        }
        None => {
            tracing::debug!("No configuration file given, using defaults");
            Config::default()
        }
    };

    let root_url = match cli.url {
        Some(url) => url,
        None => prompt_root_url()?,
    };

    tracing::info!("Mirroring {}", root_url.trim());
    let summary = match mirror(config, &root_url).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("Mirror failed to start: {}", e);
            return Err(e.into());
        }
    };

    if !cli.quiet {
        println!("Site written to: {}\n", summary.site_root.display());
        print_statistics(&summary.stats);
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_mirror=info,warn"),
            1 => EnvFilter::new("sumi_mirror=debug,info"),
            2 => EnvFilter::new("sumi_mirror=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Asks for the root URL on stdin
fn prompt_root_url() -> io::Result<String> {
    print!("Please input the root URL (http://www.example.com): ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;

    let url = line.trim();
    if url.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "no root URL given",
        ));
    }
    Ok(url.to_string())
}
