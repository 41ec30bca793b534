//! Central bank SGS time-series client
//!
//! The SGS API answers at most ten years per request, so longer windows are
//! split into consecutive sub-windows and the answers concatenated.

use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{CorrectionIndex, IndexPoint, IndexSeries, IndexSource};
use crate::config::BcbConfig;
use crate::dates::{add_months, format_br_date, parse_br_date};
use crate::error::{CalcError, CalcResult};

/// Raw SGS record. Values arrive as strings.
#[derive(Debug, Deserialize)]
struct SgsRecord {
    data: String,
    valor: String,
}

impl SgsRecord {
    fn to_point(&self) -> CalcResult<IndexPoint> {
        let date = parse_br_date(&self.data)?;
        let value: f64 = self
            .valor
            .trim()
            .parse()
            .map_err(|_| CalcError::Parse(format!("invalid index value '{}'", self.valor)))?;
        Ok(IndexPoint::new(date, value))
    }
}

fn parse_records(records: &[SgsRecord]) -> CalcResult<Vec<IndexPoint>> {
    records.iter().map(SgsRecord::to_point).collect()
}

/// Split `[start, end]` into consecutive windows of at most `years` years.
/// Each window after the first starts the day after the previous one ends.
pub fn split_windows(start: NaiveDate, end: NaiveDate, years: u32) -> Vec<(NaiveDate, NaiveDate)> {
    if start > end {
        return Vec::new();
    }

    let span_months = years.max(1) * 12;
    let mut windows = Vec::new();
    let mut current = start;

    while current <= end {
        let limit = add_months(current, span_months);
        let window_end = limit.pred_opt().unwrap_or(limit).min(end);
        windows.push((current, window_end));
        match window_end.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }

    windows
}

/// HTTP client for the SGS API
#[derive(Debug, Clone)]
pub struct BcbClient {
    http: Client,
    config: BcbConfig,
}

impl BcbClient {
    /// Create a client with default settings
    pub fn new() -> CalcResult<Self> {
        Self::with_config(BcbConfig::default())
    }

    pub fn with_config(config: BcbConfig) -> CalcResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CalcError::Client(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &BcbConfig {
        &self.config
    }

    fn series_url(&self, index: CorrectionIndex) -> String {
        format!("{}.{}/dados", self.config.base_url, index.sgs_code())
    }

    /// Fetch one window (assumed within the API limit)
    async fn fetch_window(
        &self,
        index: CorrectionIndex,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CalcResult<Vec<IndexPoint>> {
        let start_s = format_br_date(start);
        let end_s = format_br_date(end);
        debug!("Fetching {} from {} to {}", index, start_s, end_s);

        let response = self
            .http
            .get(self.series_url(index))
            .query(&[
                ("formato", "json"),
                ("dataInicial", start_s.as_str()),
                ("dataFinal", end_s.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CalcError::unavailable(index, e))?;

        // SGS answers 404 when the window has no published values
        if response.status() == StatusCode::NOT_FOUND {
            debug!("No {} values between {} and {}", index, start_s, end_s);
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(CalcError::unavailable(
                index,
                format!("HTTP {} fetching series {}", response.status(), index.sgs_code()),
            ));
        }

        let records: Vec<SgsRecord> = response
            .json()
            .await
            .map_err(|e| CalcError::unavailable(index, e))?;
        parse_records(&records)
    }

    /// Fetch `[start, end]`, splitting into windows the API accepts
    pub async fn fetch(
        &self,
        index: CorrectionIndex,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CalcResult<IndexSeries> {
        let windows = split_windows(start, end, self.config.max_window_years);
        if windows.len() > 1 {
            debug!("Splitting {} request into {} windows", index, windows.len());
        }

        let mut points = Vec::new();
        for (window_start, window_end) in windows {
            points.extend(self.fetch_window(index, window_start, window_end).await?);
        }

        Ok(IndexSeries::new(points))
    }

    /// Latest `count` values of an index (capped by the API limit)
    pub async fn fetch_latest(&self, index: CorrectionIndex, count: usize) -> CalcResult<IndexSeries> {
        let count = count.clamp(1, self.config.latest_limit);
        let url = format!("{}/ultimos/{}", self.series_url(index), count);

        let response = self
            .http
            .get(url)
            .query(&[("formato", "json")])
            .send()
            .await
            .map_err(|e| CalcError::unavailable(index, e))?;
        if !response.status().is_success() {
            return Err(CalcError::unavailable(
                index,
                format!("HTTP {} fetching latest values", response.status()),
            ));
        }

        let records: Vec<SgsRecord> = response
            .json()
            .await
            .map_err(|e| CalcError::unavailable(index, e))?;
        Ok(IndexSeries::new(parse_records(&records)?))
    }

    /// Connectivity probe: asks for the last IPCA value
    pub async fn probe(&self) -> bool {
        let url = format!("{}/ultimos/1", self.series_url(CorrectionIndex::Ipca));
        match self.http.get(url).query(&[("formato", "json")]).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("Index data source unreachable: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl IndexSource for BcbClient {
    async fn fetch_series(
        &self,
        index: CorrectionIndex,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CalcResult<IndexSeries> {
        self.fetch(index, start, end).await
    }

    async fn is_online(&self) -> bool {
        self.probe().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_short_range_is_one_window() {
        let w = split_windows(d(2015, 1, 1), d(2020, 6, 30), 10);
        assert_eq!(w, vec![(d(2015, 1, 1), d(2020, 6, 30))]);
    }

    #[test]
    fn test_long_range_is_split_consecutively() {
        let w = split_windows(d(2000, 1, 1), d(2024, 12, 31), 10);
        assert_eq!(w.len(), 3);
        assert_eq!(w[0], (d(2000, 1, 1), d(2009, 12, 31)));
        assert_eq!(w[1], (d(2010, 1, 1), d(2019, 12, 31)));
        assert_eq!(w[2], (d(2020, 1, 1), d(2024, 12, 31)));

        for pair in w.windows(2) {
            assert_eq!(pair[0].1.succ_opt().unwrap(), pair[1].0);
        }
    }

    #[test]
    fn test_inverted_range_has_no_windows() {
        assert!(split_windows(d(2021, 1, 1), d(2020, 1, 1), 10).is_empty());
    }

    #[test]
    fn test_parse_sgs_records() {
        let json = r#"[{"data":"01/01/2020","valor":"0.21"},{"data":"01/02/2020","valor":"0.25"}]"#;
        let records: Vec<SgsRecord> = serde_json::from_str(json).unwrap();
        let points = parse_records(&records).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].date, d(2020, 2, 1));
        assert_eq!(points[1].value, 0.25);

        let bad: Vec<SgsRecord> = serde_json::from_str(r#"[{"data":"01/01/2020","valor":"n/a"}]"#).unwrap();
        assert!(parse_records(&bad).is_err());
    }

    #[test]
    fn test_series_url() {
        let client = BcbClient::new().unwrap();
        assert_eq!(
            client.series_url(CorrectionIndex::Ipca),
            "https://api.bcb.gov.br/dados/serie/bcdata.sgs.433/dados"
        );
    }
}
