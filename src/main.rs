mod config;
mod crawler;
mod dedup;
mod feed;
mod listing;
mod parser;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use config::{CrawlConfig, Provider};
use feed::{FetchedPage, ProductRecord, UrlEntry};

#[derive(Parser)]
#[command(name = "luwak_scraper", about = "Amazon.de Luwak coffee product scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the category listing and every product page into a JSON feed
    Crawl {
        /// Max product pages to visit (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        #[arg(short, long, default_value = config::PRODUCT_FEED_PATH)]
        output: PathBuf,
        #[arg(short, long, value_enum, default_value_t = Provider::ScraperApi)]
        provider: Provider,
    },
    /// Collect product page URLs only
    Urls {
        #[arg(short, long, default_value = config::URL_FEED_PATH)]
        output: PathBuf,
        #[arg(short, long, value_enum, default_value_t = Provider::ScraperApi)]
        provider: Provider,
    },
    /// Print a URL feed and how many entries survive deduplication
    Dedup {
        #[arg(default_value = config::URL_FEED_PATH)]
        file: PathBuf,
    },
    /// Extract records from saved product pages (*.html) without fetching
    Extract {
        dir: PathBuf,
        #[arg(short, long, default_value = config::PRODUCT_FEED_PATH)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Crawl {
            limit,
            output,
            provider,
        } => {
            let client = Arc::new(crawler::ProxyClient::new(CrawlConfig::for_products(provider)?)?);
            let urls = crawler::discover_product_urls(&client, limit).await?;
            if urls.is_empty() {
                println!("No product URLs found on the listing.");
                return Ok(());
            }
            println!("Crawling {} product pages...", urls.len());
            let (records, stats) = crawler::crawl_products(client, urls).await?;
            feed::write_feed(&output, &records)?;
            println!(
                "Done: {} pages ({} records, {} fetch errors, {} extraction errors) -> {}",
                stats.total,
                stats.ok,
                stats.fetch_errors,
                stats.extract_errors,
                output.display()
            );
            Ok(())
        }
        Commands::Urls { output, provider } => {
            let client = crawler::ProxyClient::new(CrawlConfig::for_discovery(provider)?)?;
            let urls = crawler::discover_product_urls(&client, None).await?;
            let entries: Vec<UrlEntry> = urls.into_iter().map(UrlEntry::new).collect();
            feed::write_feed(&output, &entries)?;
            println!("Wrote {} URLs to {}", entries.len(), output.display());
            Ok(())
        }
        Commands::Dedup { file } => {
            let entries = feed::read_url_feed(&file)?;
            dedup::report(&entries);
            Ok(())
        }
        Commands::Extract { dir, output } => {
            let pages = load_saved_pages(&dir)?;
            if pages.is_empty() {
                println!("No .html files in {}.", dir.display());
                return Ok(());
            }
            println!("Extracting {} pages...", pages.len());
            let (records, failed) = extract_pages(&pages)?;
            feed::write_feed(&output, &records)?;
            println!(
                "Saved {} records ({} pages without a record) -> {}",
                records.len(),
                failed,
                output.display()
            );
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        info!("Done in {}", format_duration(elapsed));
    }

    result
}

fn load_saved_pages(dir: &Path) -> Result<Vec<FetchedPage>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "html"))
        .collect();
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let html = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(FetchedPage {
                url: path.display().to_string(),
                html,
                final_url: None,
                status: None,
            })
        })
        .collect()
}

/// Run the pipeline over already-fetched pages in parallel. Returns the
/// records (input order) and the number of pages that produced none.
fn extract_pages(pages: &[FetchedPage]) -> Result<(Vec<ProductRecord>, usize)> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let results: Vec<_> = pages
        .par_iter()
        .map(|page| {
            let result = parser::process_page(page, chrono::Local::now().naive_local());
            pb.inc(1);
            (page, result)
        })
        .collect();
    pb.finish_and_clear();

    let mut records = Vec::with_capacity(results.len());
    let mut failed = 0;
    for (page, result) in results {
        match result {
            Ok(record) => records.push(record),
            Err(e) => {
                failed += 1;
                warn!("No record for {}: {}", page.url, e);
            }
        }
    }
    Ok((records, failed))
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
