//! Expiring local cache of index series
//!
//! Entries are keyed by index. Each key has its own lock, and a lookup that
//! misses runs check, fetch, merge and store while holding it, so two
//! requests for the same index never overwrite each other's additions.
//! Different indices are fetched in parallel.
//!
//! - Fresh entry covering the window: served from memory
//! - Otherwise: fetched from the source and merged into the entry
//! - Source failure: the cached points for the window are served, however old

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{CorrectionIndex, IndexSeries, IndexSource};
use crate::config::{CacheConfig, PRELOAD_YEARS};
use crate::error::CalcResult;

/// Cached points for one index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSeries {
    pub series: IndexSeries,

    /// When the entry was last refreshed from the source
    pub updated_at: DateTime<Utc>,

    /// Date span known to be fully fetched
    #[serde(default)]
    pub coverage: Option<(NaiveDate, NaiveDate)>,
}

impl CachedSeries {
    pub fn new(series: IndexSeries, updated_at: DateTime<Utc>) -> Self {
        let coverage = series.first_date().zip(series.last_date());
        Self {
            series,
            updated_at,
            coverage,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.updated_at > ttl
    }

    /// Whether `[start, end]` lies inside the fetched span
    pub fn covers(&self, start: NaiveDate, end: NaiveDate) -> bool {
        matches!(self.coverage, Some((from, to)) if from <= start && end <= to)
    }

    /// Merge freshly fetched points for `[start, end]` into the entry.
    /// Fresh values replace cached ones for the same date.
    fn absorb(&mut self, fresh: &IndexSeries, start: NaiveDate, end: NaiveDate, now: DateTime<Utc>) {
        // `fresh` is the receiver, so republished values replace cached ones
        self.series = fresh.merge(&self.series);
        self.updated_at = now;
        self.coverage = Some(match self.coverage {
            // Overlapping or adjacent spans join; a disjoint span replaces the old one
            Some((from, to)) if start <= to.succ_opt().unwrap_or(to) && from <= end.succ_opt().unwrap_or(end) => {
                (from.min(start), to.max(end))
            }
            _ => (start, end),
        });
    }
}

/// Summary of one cache entry
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntryInfo {
    pub index: CorrectionIndex,
    pub records: usize,
    pub updated_at: DateTime<Utc>,
}

/// Index cache in front of an [`IndexSource`]
pub struct IndexCache {
    source: Arc<dyn IndexSource>,
    config: CacheConfig,
    slots: HashMap<CorrectionIndex, Mutex<Option<CachedSeries>>>,
}

impl IndexCache {
    /// Empty cache in front of `source`
    pub fn new(source: Arc<dyn IndexSource>, config: CacheConfig) -> Self {
        let slots = CorrectionIndex::ALL
            .iter()
            .map(|&index| (index, Mutex::new(None)))
            .collect();
        Self {
            source,
            config,
            slots,
        }
    }

    /// Create the cache and load the persisted file, if configured and present
    pub async fn open(source: Arc<dyn IndexSource>, config: CacheConfig) -> CalcResult<Self> {
        let cache = Self::new(source, config);
        if let Some(path) = cache.config.path.clone() {
            cache.load_from(&path).await?;
        }
        Ok(cache)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn slot(&self, index: CorrectionIndex) -> &Mutex<Option<CachedSeries>> {
        // Every index has a slot from construction
        &self.slots[&index]
    }

    /// Series for `[start, end]`, from the cache when fresh, from the source otherwise
    pub async fn fetch(
        &self,
        index: CorrectionIndex,
        start: NaiveDate,
        end: NaiveDate,
        force_refresh: bool,
    ) -> CalcResult<IndexSeries> {
        let mut slot = self.slot(index).lock().await;
        let now = Utc::now();

        if !force_refresh {
            if let Some(entry) = slot.as_ref() {
                if !entry.is_expired(now, self.config.ttl) && entry.covers(start, end) {
                    debug!("Cache hit for {}", index);
                    return Ok(entry.series.window(start, end));
                }
            }
        }

        debug!("Cache miss for {}, querying source", index);
        match self.source.fetch_series(index, start, end).await {
            Ok(fresh) => {
                match slot.as_mut() {
                    Some(entry) => entry.absorb(&fresh, start, end, now),
                    None => {
                        let mut entry = CachedSeries::new(IndexSeries::empty(), now);
                        entry.absorb(&fresh, start, end, now);
                        *slot = Some(entry);
                    }
                }
                Ok(fresh)
            }
            Err(e) => match slot.as_ref() {
                Some(entry) => {
                    warn!("Using stale cache for {} after source error: {}", index, e);
                    Ok(entry.series.window(start, end))
                }
                None => Err(e),
            },
        }
    }

    /// Put a series in the cache as if fetched at `updated_at`
    pub async fn insert(&self, index: CorrectionIndex, series: IndexSeries, updated_at: DateTime<Utc>) {
        *self.slot(index).lock().await = Some(CachedSeries::new(series, updated_at));
    }

    /// Mark every entry stale so the next fetch of each index goes to the
    /// source. The data stays available as a fallback.
    pub async fn expire_all(&self) {
        for slot in self.slots.values() {
            if let Some(entry) = slot.lock().await.as_mut() {
                entry.updated_at = DateTime::<Utc>::UNIX_EPOCH;
            }
        }
    }

    /// Drop every entry and the persisted file
    pub async fn clear(&self) -> CalcResult<()> {
        for slot in self.slots.values() {
            *slot.lock().await = None;
        }
        if let Some(path) = &self.config.path {
            if tokio::fs::try_exists(path).await? {
                tokio::fs::remove_file(path).await?;
            }
        }
        info!("Index cache cleared");
        Ok(())
    }

    /// Record count and last update per cached index
    pub async fn info(&self) -> Vec<CacheEntryInfo> {
        let mut infos = Vec::new();
        for index in CorrectionIndex::ALL {
            if let Some(entry) = self.slot(index).lock().await.as_ref() {
                infos.push(CacheEntryInfo {
                    index,
                    records: entry.series.len(),
                    updated_at: entry.updated_at,
                });
            }
        }
        infos
    }

    /// Refresh the commonly used indices over the last few years.
    /// Failures are logged and skipped.
    pub async fn preload(&self, today: NaiveDate) -> usize {
        let start = today
            .checked_sub_months(chrono::Months::new(PRELOAD_YEARS * 12))
            .unwrap_or(today);
        let mut loaded = 0;

        for index in [
            CorrectionIndex::Ipca,
            CorrectionIndex::Inpc,
            CorrectionIndex::IgpM,
            CorrectionIndex::Selic,
        ] {
            match self.fetch(index, start, today, true).await {
                Ok(series) => {
                    info!("Preloaded {} ({} records)", index, series.len());
                    loaded += 1;
                }
                Err(e) => warn!("Failed to preload {}: {}", index, e),
            }
        }

        loaded
    }

    /// Snapshot of all entries, keyed by index
    async fn snapshot(&self) -> BTreeMap<CorrectionIndex, CachedSeries> {
        let mut map = BTreeMap::new();
        for index in CorrectionIndex::ALL {
            if let Some(entry) = self.slot(index).lock().await.as_ref() {
                map.insert(index, entry.clone());
            }
        }
        map
    }

    /// Load entries from a JSON file. A missing file leaves the cache empty.
    pub async fn load_from(&self, path: &Path) -> CalcResult<()> {
        if !tokio::fs::try_exists(path).await? {
            debug!("No cache file at {}", path.display());
            return Ok(());
        }

        let bytes = tokio::fs::read(path).await?;
        let entries: BTreeMap<CorrectionIndex, CachedSeries> = match serde_json::from_slice(&bytes) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                return Ok(());
            }
        };

        let count = entries.len();
        for (index, entry) in entries {
            *self.slot(index).lock().await = Some(entry);
        }
        info!("Loaded {} cached series from {}", count, path.display());
        Ok(())
    }

    /// Write all entries to a JSON file
    pub async fn save_to(&self, path: &Path) -> CalcResult<()> {
        let snapshot = self.snapshot().await;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_vec_pretty(&snapshot)?;
        tokio::fs::write(path, json).await?;
        debug!("Saved {} cached series to {}", snapshot.len(), path.display());
        Ok(())
    }

    /// Persist to the configured file, if any
    pub async fn flush(&self) -> CalcResult<()> {
        match &self.config.path {
            Some(path) => self.save_to(path).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IndexSource for IndexCache {
    async fn fetch_series(
        &self,
        index: CorrectionIndex,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CalcResult<IndexSeries> {
        self.fetch(index, start, end, false).await
    }

    async fn is_online(&self) -> bool {
        self.source.is_online().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::add_months;
    use crate::indices::{IndexPoint, StaticSource};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn monthly(start: NaiveDate, values: &[f64]) -> IndexSeries {
        IndexSeries::new(
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| IndexPoint::new(add_months(start, i as u32), v))
                .collect(),
        )
    }

    fn ipca_source() -> Arc<StaticSource> {
        Arc::new(StaticSource::new().with_series(
            CorrectionIndex::Ipca,
            monthly(d(2020, 1, 1), &[0.5, 0.6, 0.4, 0.3, 0.2, 0.1]),
        ))
    }

    #[tokio::test]
    async fn test_second_request_is_served_from_cache() {
        let source = ipca_source();
        let cache = IndexCache::new(source.clone(), CacheConfig::in_memory());

        let first = cache.fetch(CorrectionIndex::Ipca, d(2020, 1, 1), d(2020, 3, 1), false).await.unwrap();
        let second = cache.fetch(CorrectionIndex::Ipca, d(2020, 2, 1), d(2020, 3, 1), false).await.unwrap();

        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 2);
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_wider_window_refetches_and_merges() {
        let source = ipca_source();
        let cache = IndexCache::new(source.clone(), CacheConfig::in_memory());

        cache.fetch(CorrectionIndex::Ipca, d(2020, 1, 1), d(2020, 2, 1), false).await.unwrap();
        let wide = cache.fetch(CorrectionIndex::Ipca, d(2020, 1, 1), d(2020, 6, 1), false).await.unwrap();

        assert_eq!(wide.len(), 6);
        assert_eq!(source.fetch_count(), 2);
        assert_eq!(cache.info().await[0].records, 6);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let source = ipca_source();
        let cache = IndexCache::new(source.clone(), CacheConfig::in_memory());

        cache.fetch(CorrectionIndex::Ipca, d(2020, 1, 1), d(2020, 3, 1), false).await.unwrap();
        cache.fetch(CorrectionIndex::Ipca, d(2020, 1, 1), d(2020, 3, 1), true).await.unwrap();
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refreshed() {
        let source = ipca_source();
        let cache = IndexCache::new(source.clone(), CacheConfig::in_memory());
        let stale = Utc::now() - Duration::hours(25);
        cache.insert(CorrectionIndex::Ipca, monthly(d(2020, 1, 1), &[9.9, 9.9, 9.9]), stale).await;

        let s = cache.fetch(CorrectionIndex::Ipca, d(2020, 1, 1), d(2020, 3, 1), false).await.unwrap();
        assert_eq!(source.fetch_count(), 1);
        assert_eq!(s.points()[0].value, 0.5);

        // The refreshed values replace the stale ones
        let again = cache.fetch(CorrectionIndex::Ipca, d(2020, 1, 1), d(2020, 3, 1), false).await.unwrap();
        assert_eq!(source.fetch_count(), 1);
        assert_eq!(again.points()[0].value, 0.5);
    }

    #[tokio::test]
    async fn test_expire_all_refetches_once() {
        let source = ipca_source();
        let cache = IndexCache::new(source.clone(), CacheConfig::in_memory());
        cache.fetch(CorrectionIndex::Ipca, d(2020, 1, 1), d(2020, 3, 1), false).await.unwrap();
        assert_eq!(source.fetch_count(), 1);

        cache.expire_all().await;
        cache.fetch(CorrectionIndex::Ipca, d(2020, 1, 1), d(2020, 3, 1), false).await.unwrap();
        cache.fetch(CorrectionIndex::Ipca, d(2020, 1, 1), d(2020, 3, 1), false).await.unwrap();
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_source_failure_falls_back_to_stale_entry() {
        let source = Arc::new(StaticSource::offline());
        let cache = IndexCache::new(source, CacheConfig::in_memory());
        let stale = Utc::now() - Duration::days(30);
        cache.insert(CorrectionIndex::Ipca, monthly(d(2020, 1, 1), &[0.5, 0.6, 0.4, 0.3]), stale).await;

        let s = cache.fetch(CorrectionIndex::Ipca, d(2020, 2, 1), d(2020, 3, 1), false).await.unwrap();
        assert_eq!(s.len(), 2);
    }

    #[tokio::test]
    async fn test_source_failure_without_entry_propagates() {
        let cache = IndexCache::new(Arc::new(StaticSource::offline()), CacheConfig::in_memory());
        let err = cache
            .fetch(CorrectionIndex::Selic, d(2020, 1, 1), d(2020, 3, 1), false)
            .await
            .unwrap_err();
        assert!(err.is_data_source());
    }

    #[tokio::test]
    async fn test_concurrent_requests_for_one_index_keep_all_points() {
        let source = ipca_source();
        let cache = Arc::new(IndexCache::new(source, CacheConfig::in_memory()));

        let a = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache.fetch(CorrectionIndex::Ipca, d(2020, 1, 1), d(2020, 3, 1), true).await
            })
        };
        let b = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache.fetch(CorrectionIndex::Ipca, d(2020, 4, 1), d(2020, 6, 1), true).await
            })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let info = cache.info().await;
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].records, 6);
    }

    #[tokio::test]
    async fn test_persistence_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        let config = CacheConfig {
            path: Some(path.clone()),
            ..CacheConfig::default()
        };

        let cache = IndexCache::new(ipca_source(), config.clone());
        cache.fetch(CorrectionIndex::Ipca, d(2020, 1, 1), d(2020, 6, 1), false).await.unwrap();
        cache.flush().await.unwrap();
        assert!(path.exists());

        // Reopened offline, the persisted entry still answers
        let reopened = IndexCache::open(Arc::new(StaticSource::offline()), config).await.unwrap();
        let s = reopened.fetch(CorrectionIndex::Ipca, d(2020, 1, 1), d(2020, 6, 1), false).await.unwrap();
        assert_eq!(s.len(), 6);

        reopened.clear().await.unwrap();
        assert!(reopened.info().await.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_preload_counts_successes() {
        let cache = IndexCache::new(ipca_source(), CacheConfig::in_memory());
        assert_eq!(cache.preload(d(2024, 1, 1)).await, 4);

        let offline = IndexCache::new(Arc::new(StaticSource::offline()), CacheConfig::in_memory());
        assert_eq!(offline.preload(d(2024, 1, 1)).await, 0);
    }

    #[test]
    fn test_coverage_joins_adjacent_spans() {
        let now = Utc::now();
        let mut entry = CachedSeries::new(IndexSeries::empty(), now);
        entry.absorb(&IndexSeries::empty(), d(2020, 1, 1), d(2020, 3, 31), now);
        entry.absorb(&IndexSeries::empty(), d(2020, 4, 1), d(2020, 6, 30), now);
        assert!(entry.covers(d(2020, 2, 1), d(2020, 5, 1)));

        entry.absorb(&IndexSeries::empty(), d(2022, 1, 1), d(2022, 2, 1), now);
        assert!(!entry.covers(d(2020, 2, 1), d(2020, 5, 1)));
        assert!(entry.covers(d(2022, 1, 1), d(2022, 2, 1)));
    }
}
