//! `rareplanes` - CLI for finding rare aircraft in flight
//!
//! Runs a single scan and prints a table plus writes a map, or with
//! `--serve` runs the live map server.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{debug, warn};

use rareplanes::cli::Cli;
use rareplanes::present::{render_map, render_report, write_map, MapOptions};
use rareplanes::server::{serve, AppState, PageSettings};
use rareplanes::{init_logging, CatalogClient, CatalogSource, Config, Fetcher, HttpFeed, Pipeline};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    if let Err(e) = cli.validate() {
        return Ok(usage_error(&e));
    }
    let mut config = Config::load_from(cli.config.clone())?;
    if let Err(e) = cli.apply(&mut config) {
        if e.is_usage_error() {
            return Ok(usage_error(&e));
        }
        return Err(e.into());
    }

    let pipeline = Pipeline::new(
        Fetcher::new(
            Arc::new(HttpFeed::new(&config.api)?),
            config.fetch.concurrency,
        ),
        cli.regions(),
        config.scan.min_rarity,
    );
    let catalog_source: Arc<dyn CatalogSource> = Arc::new(CatalogClient::new(&config.api)?);

    print_header(&cli, &pipeline);

    if cli.serve {
        run_server(&cli, &config, pipeline, catalog_source).await?;
        return Ok(ExitCode::SUCCESS);
    }
    run_once(&cli, &config, &pipeline, catalog_source.as_ref()).await
}

/// Report a bad flag combination and exit like clap does.
fn usage_error(err: &rareplanes::Error) -> ExitCode {
    debug_assert!(err.is_usage_error());
    eprintln!("error: {err}");
    ExitCode::from(2)
}

fn print_header(cli: &Cli, pipeline: &Pipeline) {
    println!("Rare Plane Finder - {}", Utc::now().format("%Y-%m-%d %H:%M UTC"));
    match cli.bounds {
        Some(bounds) => println!("Searching region {bounds}"),
        None => println!("Searching worldwide ({} regions)", pipeline.regions().len()),
    }
    println!("Minimum rarity: {}", pipeline.min_rarity());
    println!();
}

async fn run_once(
    cli: &Cli,
    config: &Config,
    pipeline: &Pipeline,
    catalog_source: &dyn CatalogSource,
) -> anyhow::Result<ExitCode> {
    let catalog = match catalog_source.load_catalog().await {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("Could not load the rarity catalog: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let scan = pipeline.run(&catalog).await;
    print!(
        "{}",
        render_report(&scan, &cli.challenges, config.scan.max_table_rows)
    );

    if scan.feed_unreachable() {
        return Ok(ExitCode::FAILURE);
    }
    if cli.no_map || scan.matches.is_empty() {
        return Ok(ExitCode::SUCCESS);
    }

    let options = MapOptions {
        title: "Rare Planes",
        min_rarity: scan.min_rarity,
        challenges: &cli.challenges,
        tile_url: &config.map.tile_url,
        tile_attribution: &config.map.tile_attribution,
        live: false,
        generated_at: scan.scanned_at,
    };
    let html = render_map(&scan.matches, &options)?;
    let path = write_map(&config.map.output, &html).context("writing map")?;
    println!("\nMap saved to: {}", path.display());
    Ok(ExitCode::SUCCESS)
}

async fn run_server(
    cli: &Cli,
    config: &Config,
    pipeline: Pipeline,
    catalog_source: Arc<dyn CatalogSource>,
) -> anyhow::Result<()> {
    let addr = config.server_addr()?;
    let page = PageSettings::new(&config.map, cli.challenges.clone());
    let state = Arc::new(AppState::new(pipeline, catalog_source, page));

    if let Err(e) = state.preload().await {
        warn!(error = %e, "Catalog unavailable at startup, will retry per request");
    }

    let url = format!("http://{addr}/");
    println!("Live map at {url} (ctrl-c to stop)");
    if !cli.no_browser {
        if let Err(e) = webbrowser::open(&url) {
            warn!(error = %e, "Failed to open a browser");
        } else {
            debug!(%url, "Opened browser");
        }
    }
    serve(addr, state, config.server_timeout()).await?;
    Ok(())
}
