//! waypoint: resolve, navigate and crawl a declarative route tree.
//!
//! # Architecture Overview
//!
//! ```text
//!   config file ([site] table)
//!        │
//!        ▼
//!   ┌──────────┐     ┌──────────────────────────────────────────┐
//!   │  config  │────▶│ routing: pattern · params · matcher tree │
//!   └──────────┘     └───────────────────┬──────────────────────┘
//!                                        │ resolve()
//!                 ┌──────────────────────┼──────────────────────┐
//!                 ▼                      ▼                      ▼
//!          `resolve` command      ┌────────────┐          ┌──────────┐
//!          (one Route as JSON)    │ navigation │          │ crawler  │
//!                                 │ generations│          │ BFS      │
//!                                 └────────────┘          └──────────┘
//!                                        │                      │
//!                                        ▼                      ▼
//!                                  settled Route             SiteMap
//!
//!   Cross-cutting: observability (tracing, metrics) · lifecycle (shutdown)
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;

use waypoint::config::{load_config, WaypointConfig};
use waypoint::crawler::{crawl, CrawlConfig};
use waypoint::lifecycle::{signals, Shutdown};
use waypoint::navigation::{MemoryHistory, Navigation};
use waypoint::observability::{logging, metrics};
use waypoint::routing::{resolve, Context, Matcher, Url};

#[derive(Parser)]
#[command(name = "waypoint")]
#[command(about = "Resolve and crawl declarative route trees", long_about = None)]
struct Cli {
    /// TOML configuration file with a [site] table.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve one URL and print the route
    Resolve { url: String },
    /// Push URLs through a navigation session and print the settled route
    Navigate {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Crawl the site and print the sitemap
    Crawl {
        /// Start pathname (defaults to crawler.root)
        #[arg(long)]
        root: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => WaypointConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "waypoint starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let tree = config
        .site_tree()?
        .ok_or("configuration has no [site] table; pass --config")?;

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_ctrl_c(shutdown.clone()));
    let mut interrupted = shutdown.subscribe();

    tokio::select! {
        result = run(cli.command, &config, tree, &shutdown) => result?,
        _ = interrupted.recv() => tracing::info!("Interrupted, abandoning in-flight work"),
    }

    shutdown.trigger();
    Ok(())
}

async fn run(
    command: Commands,
    config: &WaypointConfig,
    tree: Matcher,
    shutdown: &Shutdown,
) -> Result<(), Box<dyn std::error::Error>> {
    let context = Context::new();

    match command {
        Commands::Resolve { url } => {
            let url = Url::parse(&url)?;
            let route = resolve(&tree, &url, &context).await;
            print_json(&route)?;
        }
        Commands::Navigate { urls } => {
            let urls = urls.iter().map(|u| Url::parse(u)).collect::<Result<Vec<_>, _>>()?;
            let Some((first, rest)) = urls.split_first() else {
                return Ok(());
            };

            let history = MemoryHistory::new(first.clone());
            let navigation = Navigation::spawn(
                tree,
                first.clone(),
                context,
                &config.navigation,
                shutdown.subscribe(),
            );
            navigation.subscribe(|route| {
                tracing::info!(url = %route.url, status = route.status.as_str(), "Route changed");
            });
            let forwarder = navigation.attach(history.listen());

            for url in rest {
                history.push(url.clone());
            }
            drop(history);
            let _ = forwarder.await;

            let route = navigation.steady().await;
            print_json(&*route)?;
        }
        Commands::Crawl { root } => {
            let root = root.unwrap_or_else(|| config.crawler.root.clone());
            let sitemap = crawl(&tree, &root, &context, &CrawlConfig::from(&config.crawler)).await;
            print_json(&sitemap)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
