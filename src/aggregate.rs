//! Batch calculation over every claimant of a case, and the grand totals
//!
//! Claimants are filtered and validated up front, then calculated with at
//! most `BatchConfig::concurrency` in flight. Results keep input order. The
//! first calculation error fails the whole batch.

use chrono::NaiveDate;
use futures::stream::{self, StreamExt, TryStreamExt};
use log::info;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;

use crate::claims::{valid_claimants, validate_claimants, CaseParameters, Claimant};
use crate::config::BatchConfig;
use crate::dates::br_date;
use crate::engine::{ClaimantResult, CorrectionEngine};
use crate::error::CalcResult;
use crate::indices::IndexSource;

/// Runs one engine over many claimants
#[derive(Clone)]
pub struct BatchRunner {
    engine: CorrectionEngine,
    config: BatchConfig,
}

impl BatchRunner {
    pub fn new(source: Arc<dyn IndexSource>) -> Self {
        Self::with_config(source, BatchConfig::default())
    }

    pub fn with_config(source: Arc<dyn IndexSource>, config: BatchConfig) -> Self {
        Self {
            engine: CorrectionEngine::new(source),
            config,
        }
    }

    pub fn engine(&self) -> &CorrectionEngine {
        &self.engine
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Calculate every claimant with a positive amount, in input order
    pub async fn run(
        &self,
        claimants: &[Claimant],
        case: &CaseParameters,
        end: NaiveDate,
    ) -> CalcResult<Vec<ClaimantResult>> {
        let valid = valid_claimants(claimants);
        if valid.len() < claimants.len() {
            info!("Skipping {} claimants without an amount", claimants.len() - valid.len());
        }
        let resolved = validate_claimants(&valid, case)?;

        let concurrency = self.config.concurrency.max(1);
        info!("Calculating {} claimants ({} at a time)", valid.len(), concurrency);

        stream::iter(valid.iter().zip(resolved.iter()))
            .map(|(claimant, portions)| self.engine.calculate_resolved(claimant, portions, end))
            .buffered(concurrency)
            .try_collect()
            .await
    }
}

/// Sums over a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrandTotals {
    pub claimants: usize,
    pub principal: f64,
    pub corrected: f64,
    pub interest: f64,
    pub total: f64,
    /// Total (corrected plus interest) of material damages
    pub material: f64,
    /// Total (corrected plus interest) of moral damages
    pub moral: f64,
}

impl GrandTotals {
    pub fn from_results(results: &[ClaimantResult]) -> Self {
        results.iter().fold(Self::default(), |mut acc, r| {
            acc.claimants += 1;
            acc.principal += r.principal;
            acc.corrected += r.corrected;
            acc.interest += r.interest;
            acc.total += r.total;
            acc.material += r.material().map_or(0.0, |p| p.total);
            acc.moral += r.moral().map_or(0.0, |p| p.total);
            acc
        })
    }

    pub fn has_split(&self) -> bool {
        self.material > 0.0 || self.moral > 0.0
    }
}

/// One exported line: a breakdown month of one claimant's part
#[derive(Debug, Serialize)]
struct BreakdownCsvRow<'a> {
    claimant: &'a str,
    portion: &'a str,
    index: &'a str,
    #[serde(with = "br_date")]
    period: NaiveDate,
    index_value: f64,
    cumulative_factor: f64,
    corrected_value: f64,
    interest: f64,
}

/// Write every breakdown row of every claimant as CSV
pub fn write_breakdown_csv<W: Write>(results: &[ClaimantResult], writer: W) -> CalcResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for result in results {
        for portion in result.portions() {
            for row in &portion.rows {
                csv.serialize(BreakdownCsvRow {
                    claimant: &result.claimant.name,
                    portion: portion.portion.label(),
                    index: portion.index.as_str(),
                    period: row.period,
                    index_value: row.index_value,
                    cumulative_factor: row.cumulative_factor,
                    corrected_value: row.corrected_value,
                    interest: row.interest,
                })?;
            }
        }
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{CaseDates, SubClaim};
    use crate::dates::add_months;
    use crate::indices::{CorrectionIndex, IndexPoint, IndexSeries, StaticSource};
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn source() -> Arc<StaticSource> {
        let start = d(2019, 1, 1);
        let points = (0..36)
            .map(|i| IndexPoint::new(add_months(start, i), 0.3 + (i % 5) as f64 * 0.1))
            .collect();
        Arc::new(StaticSource::new().with_series(CorrectionIndex::Ipca, IndexSeries::new(points)))
    }

    fn case() -> CaseParameters {
        CaseParameters {
            dates: CaseDates {
                filing: Some(d(2019, 2, 1)),
                judgment: Some(d(2020, 6, 1)),
                citation: Some(d(2019, 4, 1)),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn claimants() -> Vec<Claimant> {
        vec![
            Claimant::unified("1", "Ana", 1000.0),
            Claimant::split("2", "Bruno", Some(SubClaim::new(5000.0)), Some(SubClaim::new(3000.0))),
            Claimant::unified("3", "Carla", 0.0),
            Claimant::split("4", "Davi", None, Some(SubClaim::new(2000.0))),
        ]
    }

    #[tokio::test]
    async fn test_run_skips_zero_amount_and_keeps_order() {
        let runner = BatchRunner::new(source());
        let results = runner.run(&claimants(), &case(), d(2021, 6, 30)).await.unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.claimant.name.as_str()).collect();
        assert_eq!(names, vec!["Ana", "Bruno", "Davi"]);
    }

    #[tokio::test]
    async fn test_concurrent_run_matches_sequential() {
        let sequential = BatchRunner::new(source())
            .run(&claimants(), &case(), d(2021, 6, 30))
            .await
            .unwrap();
        let concurrent = BatchRunner::with_config(source(), BatchConfig { concurrency: 4 })
            .run(&claimants(), &case(), d(2021, 6, 30))
            .await
            .unwrap();
        assert_eq!(sequential, concurrent);
    }

    #[tokio::test]
    async fn test_grand_totals_sum_claimants() {
        let results = BatchRunner::new(source())
            .run(&claimants(), &case(), d(2021, 6, 30))
            .await
            .unwrap();
        let totals = GrandTotals::from_results(&results);

        assert_eq!(totals.claimants, 3);
        assert_relative_eq!(totals.principal, 11000.0, epsilon = 1e-9);
        assert_relative_eq!(totals.total, results.iter().map(|r| r.total).sum::<f64>(), epsilon = 1e-9);
        assert_relative_eq!(totals.total, totals.corrected + totals.interest, epsilon = 1e-6);

        let split_total: f64 = results[1].total + results[2].total;
        assert_relative_eq!(totals.material + totals.moral, split_total, epsilon = 1e-9);
        assert!(totals.has_split());
    }

    #[tokio::test]
    async fn test_offline_source_fails_batch() {
        let runner = BatchRunner::new(Arc::new(StaticSource::offline()));
        let err = runner.run(&claimants(), &case(), d(2021, 6, 30)).await.unwrap_err();
        assert!(err.is_data_source());
    }

    #[tokio::test]
    async fn test_nothing_to_calculate_is_a_validation_error() {
        let runner = BatchRunner::new(source());
        let only_zero = vec![Claimant::unified("1", "Zé", 0.0)];
        assert!(runner.run(&only_zero, &case(), d(2021, 6, 30)).await.is_err());
    }

    #[tokio::test]
    async fn test_breakdown_csv_has_a_line_per_month() {
        let results = BatchRunner::new(source())
            .run(&claimants()[..1], &case(), d(2019, 12, 31))
            .await
            .unwrap();
        let mut out = Vec::new();
        write_breakdown_csv(&results, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        // Header, then April..December 2019 from the citation date
        assert_eq!(lines.len(), 1 + 9);
        assert!(lines[0].starts_with("claimant,portion,index,period"));
        assert!(lines[1].starts_with("Ana,Principal,IPCA,01/04/2019"));
    }

    #[test]
    fn test_empty_totals() {
        let totals = GrandTotals::from_results(&[]);
        assert_eq!(totals, GrandTotals::default());
        assert!(!totals.has_split());
    }
}
