use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;

pub const SITE_ORIGIN: &str = "https://www.amazon.de";
pub const START_URL: &str = "https://www.amazon.de/s?k=luwak+kaffee&__mk_de_DE=%C3%85M%C3%85%C5%BD%C3%95%C3%91&crid=2I075LUJM396D&sprefix=luwak+kaffee%2Caps%2C97&ref=nb_sb_noss_1";
pub const COUNTRY_CODE: &str = "de";

pub const PRODUCT_FEED_PATH: &str = "product_info.json";
pub const URL_FEED_PATH: &str = "pdp_urls.json";

const CONCURRENCY: usize = 5;
const PRODUCT_RETRIES: u32 = 3;
const DISCOVERY_RETRIES: u32 = 5;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const BASE_BACKOFF_MS: u64 = 2000;

/// Proxy/crawl service the requests are routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    /// ScraperAPI rotating proxies (`SCRAPER_API_KEY`)
    ScraperApi,
    /// spider.cloud (`SPIDER_API_KEY`)
    Spider,
}

impl Provider {
    pub fn key_var(self) -> &'static str {
        match self {
            Provider::ScraperApi => "SCRAPER_API_KEY",
            Provider::Spider => "SPIDER_API_KEY",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub provider: Provider,
    pub api_key: String,
    pub start_url: String,
    pub country_code: String,
    pub concurrency: usize,
    pub max_retries: u32,
    pub timeout: Duration,
    pub base_backoff_ms: u64,
}

impl CrawlConfig {
    /// Settings for the product crawl. The credential is the only value
    /// taken from the environment.
    pub fn for_products(provider: Provider) -> Result<Self> {
        let api_key = std::env::var(provider.key_var())
            .with_context(|| format!("{} environment variable must be set", provider.key_var()))?;
        Ok(Self::new(provider, api_key))
    }

    /// The URL-only pass retries harder.
    pub fn for_discovery(provider: Provider) -> Result<Self> {
        let mut config = Self::for_products(provider)?;
        config.max_retries = DISCOVERY_RETRIES;
        Ok(config)
    }

    pub fn new(provider: Provider, api_key: String) -> Self {
        Self {
            provider,
            api_key,
            start_url: START_URL.to_string(),
            country_code: COUNTRY_CODE.to_string(),
            concurrency: CONCURRENCY,
            max_retries: PRODUCT_RETRIES,
            timeout: REQUEST_TIMEOUT,
            base_backoff_ms: BASE_BACKOFF_MS,
        }
    }
}
