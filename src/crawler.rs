use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Result};
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::{CrawlConfig, Provider};
use crate::feed::{FetchedPage, ProductRecord};
use crate::listing;
use crate::parser;

const SCRAPER_API_ENDPOINT: &str = "https://api.scraperapi.com/";
const FINAL_URL_HEADER: &str = "sa-final-url";

enum Backend {
    ScraperApi(reqwest::Client),
    Spider(Spider),
}

/// Routes every request through the configured proxy service. Built once per
/// run and shared by reference.
pub struct ProxyClient {
    backend: Backend,
    config: CrawlConfig,
}

/// Crawl stats returned after completion.
pub struct CrawlStats {
    pub total: usize,
    pub ok: usize,
    pub fetch_errors: usize,
    pub extract_errors: usize,
}

impl ProxyClient {
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let backend = match config.provider {
            Provider::ScraperApi => Backend::ScraperApi(
                reqwest::Client::builder().timeout(config.timeout).build()?,
            ),
            Provider::Spider => Backend::Spider(
                Spider::new(Some(config.api_key.clone()))
                    .map_err(|e| anyhow!("Failed to create Spider client: {}", e))?,
            ),
        };
        Ok(Self { backend, config })
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Fetch `url`, retrying transport errors, 408, 429 and 5xx with
    /// exponential backoff.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let max_retries = self.config.max_retries;
        let mut attempt = 0u32;

        loop {
            let reason = match self.fetch_once(url).await {
                Ok(page) => match page.status {
                    Some(status) if is_retryable(status) => format!("HTTP {}", status),
                    Some(status) if status >= 400 => bail!("HTTP {} for {}", status, url),
                    _ => return Ok(page),
                },
                Err(e) => e.to_string(),
            };

            if attempt >= max_retries {
                bail!("Giving up on {} after {} attempts: {}", url, attempt + 1, reason);
            }

            let backoff = Duration::from_millis(self.config.base_backoff_ms * 2u64.pow(attempt));
            warn!(
                "{} on {} (attempt {}/{}), backing off {:.1}s",
                reason,
                url,
                attempt + 1,
                max_retries,
                backoff.as_secs_f64()
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchedPage> {
        let start = Instant::now();
        let page = match &self.backend {
            Backend::ScraperApi(http) => {
                let response = http
                    .get(SCRAPER_API_ENDPOINT)
                    .query(&[
                        ("api_key", self.config.api_key.as_str()),
                        ("url", url),
                        ("country_code", self.config.country_code.as_str()),
                    ])
                    .send()
                    .await?;
                let status = response.status().as_u16();
                let final_url = response
                    .headers()
                    .get(FINAL_URL_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                FetchedPage {
                    url: url.to_string(),
                    html: response.text().await?,
                    final_url,
                    status: Some(status),
                }
            }
            Backend::Spider(spider) => self.fetch_spider(spider, url).await?,
        };
        debug!(
            "Fetched {} ({:?}) in {}ms",
            url,
            page.status,
            start.elapsed().as_millis()
        );
        Ok(page)
    }

    async fn fetch_spider(&self, spider: &Spider, url: &str) -> Result<FetchedPage> {
        let params = RequestParams {
            return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Raw)),
            ..Default::default()
        };

        let value = tokio::time::timeout(
            self.config.timeout,
            spider.scrape_url(url, Some(params), "application/json"),
        )
        .await
        .map_err(|_| anyhow!("Timed out after {}s", self.config.timeout.as_secs()))?
        .map_err(|e| anyhow!("Spider scrape failed: {}", e))?;

        let parsed: serde_json::Value = match value.as_str() {
            Some(s) => serde_json::from_str(s).unwrap_or(value.clone()),
            None => value,
        };
        let first = parsed.as_array().and_then(|arr| arr.first());

        let html = first
            .and_then(|obj| obj.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| anyhow!("No content in spider response"))?
            .to_string();
        let status = first
            .and_then(|obj| obj.get("status"))
            .and_then(|s| s.as_u64())
            .and_then(|s| u16::try_from(s).ok());
        let final_url = first
            .and_then(|obj| obj.get("url"))
            .and_then(|u| u.as_str())
            .map(str::to_string);

        Ok(FetchedPage {
            url: url.to_string(),
            html,
            final_url,
            status,
        })
    }
}

fn is_retryable(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

/// Walk the category search from the start URL, following "next" links until
/// there are none (or `limit` product URLs were found).
pub async fn discover_product_urls(
    client: &ProxyClient,
    limit: Option<usize>,
) -> Result<Vec<String>> {
    let mut next = Some(client.config().start_url.clone());
    let mut visited = HashSet::new();
    let mut urls = Vec::new();

    while let Some(page_url) = next.take() {
        if !visited.insert(page_url.clone()) {
            warn!("Pagination loops back to {}, stopping", page_url);
            break;
        }

        let page = match client.fetch(&page_url).await {
            Ok(page) => page,
            // Nothing found yet: the whole run is pointless.
            Err(e) if urls.is_empty() => return Err(e),
            Err(e) => {
                warn!("Listing page failed, stopping pagination: {}", e);
                break;
            }
        };

        let listing = listing::parse_listing(&page.html);
        info!(
            "Listing page {}: {} products",
            visited.len(),
            listing.product_urls.len()
        );
        urls.extend(listing.product_urls);

        if let Some(n) = limit {
            if urls.len() >= n {
                urls.truncate(n);
                break;
            }
        }
        next = listing.next_page;
    }

    info!("Discovered {} product URLs", urls.len());
    Ok(urls)
}

/// Fetch detail pages concurrently and run the extraction pipeline on each as
/// it arrives. Failed pages are logged and counted, never fatal.
pub async fn crawl_products(
    client: Arc<ProxyClient>,
    urls: Vec<String>,
) -> Result<(Vec<ProductRecord>, CrawlStats)> {
    let concurrency = client.config().concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let total = urls.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Channel: workers send fetched pages, main loop extracts
    let (tx, mut rx) =
        tokio::sync::mpsc::channel::<(String, Result<FetchedPage>)>(concurrency * 2);

    for url in urls {
        let client = Arc::clone(&client);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let result = client.fetch(&url).await;
            let _ = tx.send((url, result)).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut records = Vec::with_capacity(total);
    let mut fetch_errors = 0usize;
    let mut extract_errors = 0usize;

    while let Some((url, result)) = rx.recv().await {
        match result {
            Ok(page) => match parser::process_page(&page, Local::now().naive_local()) {
                Ok(record) => records.push(record),
                Err(e) => {
                    extract_errors += 1;
                    warn!("No record for {}: {}", url, e);
                }
            },
            Err(e) => {
                fetch_errors += 1;
                warn!("Fetch failed for {}: {}", url, e);
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    let stats = CrawlStats {
        total,
        ok: records.len(),
        fetch_errors,
        extract_errors,
    };
    info!(
        "Crawled {} pages ({} records, {} fetch errors, {} extraction errors)",
        stats.total, stats.ok, stats.fetch_errors, stats.extract_errors
    );

    Ok((records, stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable(429));
        assert!(is_retryable(503));
        assert!(is_retryable(408));
        assert!(!is_retryable(404));
        assert!(!is_retryable(200));
    }

    #[test]
    fn client_is_built_from_config() {
        let config = CrawlConfig::new(Provider::ScraperApi, "test-key".into());
        let client = ProxyClient::new(config).unwrap();
        assert_eq!(client.config().api_key, "test-key");
        assert!(matches!(client.backend, Backend::ScraperApi(_)));
    }
}
