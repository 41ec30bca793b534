//! Economic index series, their data source, and the local cache

mod series;
pub mod bcb;
pub mod cache;

pub use series::{IndexPoint, IndexSeries};
pub use bcb::BcbClient;
pub use cache::{CacheEntryInfo, IndexCache};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{CalcError, CalcResult};

/// Named index series published by the central bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum CorrectionIndex {
    /// Broad consumer price index
    #[default]
    #[serde(rename = "IPCA")]
    Ipca,
    /// National consumer price index
    #[serde(rename = "INPC")]
    Inpc,
    /// General market price index
    #[serde(rename = "IGP-M")]
    IgpM,
    /// Policy (reference) rate, accumulated per month
    #[serde(rename = "SELIC")]
    Selic,
    /// Reference rate
    #[serde(rename = "TR")]
    Tr,
}

impl CorrectionIndex {
    pub const ALL: [CorrectionIndex; 5] = [
        CorrectionIndex::Ipca,
        CorrectionIndex::Inpc,
        CorrectionIndex::IgpM,
        CorrectionIndex::Selic,
        CorrectionIndex::Tr,
    ];

    /// SGS time-series code
    pub fn sgs_code(&self) -> u32 {
        match self {
            CorrectionIndex::Ipca => 433,
            CorrectionIndex::Inpc => 188,
            CorrectionIndex::IgpM => 189,
            CorrectionIndex::Selic => 4390,
            CorrectionIndex::Tr => 226,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionIndex::Ipca => "IPCA",
            CorrectionIndex::Inpc => "INPC",
            CorrectionIndex::IgpM => "IGP-M",
            CorrectionIndex::Selic => "SELIC",
            CorrectionIndex::Tr => "TR",
        }
    }

    /// Long name for report headers
    pub fn display_name(&self) -> &'static str {
        match self {
            CorrectionIndex::Ipca => "IPCA (Índice de Preços ao Consumidor Amplo)",
            CorrectionIndex::Inpc => "INPC (Índice Nacional de Preços ao Consumidor)",
            CorrectionIndex::IgpM => "IGP-M (Índice Geral de Preços do Mercado)",
            CorrectionIndex::Selic => "Taxa Selic",
            CorrectionIndex::Tr => "TR (Taxa Referencial)",
        }
    }
}

impl fmt::Display for CorrectionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CorrectionIndex {
    type Err = CalcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IPCA" | "IPCA-E" => Ok(CorrectionIndex::Ipca),
            "INPC" => Ok(CorrectionIndex::Inpc),
            "IGP-M" | "IGPM" => Ok(CorrectionIndex::IgpM),
            "SELIC" => Ok(CorrectionIndex::Selic),
            "TR" => Ok(CorrectionIndex::Tr),
            other => Err(CalcError::Parse(format!("unknown correction index: {}", other))),
        }
    }
}

/// Anything that can supply an index series for a date window.
///
/// The engine only ever sees this trait, so tests inject an in-memory source
/// and production injects the cache wrapping the HTTP client.
#[async_trait]
pub trait IndexSource: Send + Sync {
    /// Points of `index` dated within `[start, end]`, ascending
    async fn fetch_series(
        &self,
        index: CorrectionIndex,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CalcResult<IndexSeries>;

    /// Whether the source is currently reachable
    async fn is_online(&self) -> bool {
        true
    }
}

/// In-memory index source
///
/// Serves fixed series filtered to the requested window. An `offline` source
/// fails every fetch, which lets a cache serve whatever it already holds.
#[derive(Debug, Default)]
pub struct StaticSource {
    series: HashMap<CorrectionIndex, IndexSeries>,
    offline: bool,
    fetches: AtomicUsize,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source that is never reachable
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    pub fn with_series(mut self, index: CorrectionIndex, series: IndexSeries) -> Self {
        self.series.insert(index, series);
        self
    }

    /// Number of fetches served or refused so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexSource for StaticSource {
    async fn fetch_series(
        &self,
        index: CorrectionIndex,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CalcResult<IndexSeries> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.offline {
            return Err(CalcError::unavailable(index, "source is offline"));
        }
        Ok(self
            .series
            .get(&index)
            .map(|s| s.window(start, end))
            .unwrap_or_default())
    }

    async fn is_online(&self) -> bool {
        !self.offline
    }
}
