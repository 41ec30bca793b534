//! Configuration defaults for the data source, the cache and batch runs

use std::path::PathBuf;
use std::time::Duration;

/// SGS time-series API of the central bank
pub const DEFAULT_BCB_BASE_URL: &str = "https://api.bcb.gov.br/dados/serie/bcdata.sgs";

/// Longest window the SGS API answers in a single request
pub const MAX_WINDOW_YEARS: u32 = 10;

/// Cap on the "latest N values" endpoint
pub const LATEST_LIMIT: usize = 20;

/// Hours before a cached series is considered stale
pub const CACHE_TTL_HOURS: i64 = 24;

/// Default location of the persisted index cache
pub const DEFAULT_CACHE_PATH: &str = "data/index_cache.json";

/// Years of history fetched by a cache preload
pub const PRELOAD_YEARS: u32 = 5;

/// Index data source settings
#[derive(Debug, Clone)]
pub struct BcbConfig {
    pub base_url: String,
    pub max_window_years: u32,
    pub latest_limit: usize,
    /// Per-request timeout of the HTTP client
    pub timeout: Duration,
}

impl Default for BcbConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BCB_BASE_URL.to_string(),
            max_window_years: MAX_WINDOW_YEARS,
            latest_limit: LATEST_LIMIT,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Index cache settings
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: chrono::Duration,
    /// File the cache is loaded from and flushed to. `None` keeps it in memory.
    pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: chrono::Duration::hours(CACHE_TTL_HOURS),
            path: Some(PathBuf::from(DEFAULT_CACHE_PATH)),
        }
    }
}

impl CacheConfig {
    /// In-memory cache with the default TTL
    pub fn in_memory() -> Self {
        Self {
            path: None,
            ..Default::default()
        }
    }
}

/// Batch run settings
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Claimants calculated at the same time. 1 runs them one after another.
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}
