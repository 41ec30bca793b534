//! Correction engine: corrects a principal by an index and applies interest

use chrono::NaiveDate;
use log::{debug, warn};
use std::sync::Arc;

use crate::claims::{CaseParameters, Claimant, PortionParams};
use crate::dates::format_br_date;
use crate::error::CalcResult;
use crate::indices::{IndexSeries, IndexSource};

use super::results::{BreakdownRow, ClaimantResult, PortionResult};

/// Main calculation engine
///
/// Holds the index source it reads from; everything else comes in with
/// each call, so one engine serves a whole batch.
#[derive(Clone)]
pub struct CorrectionEngine {
    source: Arc<dyn IndexSource>,
}

impl CorrectionEngine {
    pub fn new(source: Arc<dyn IndexSource>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<dyn IndexSource> {
        &self.source
    }

    /// Correct one principal up to `end` and apply its interest policy.
    ///
    /// A correction start after `end` applies no correction (factor 1) and
    /// logs a warning; an interest start after `end` likewise yields no
    /// interest.
    pub async fn calculate_portion(&self, params: &PortionParams, end: NaiveDate) -> CalcResult<PortionResult> {
        let series = if params.correction_start > end {
            warn!(
                "{}: correction start {} is after calculation date {}; no correction applied",
                params.portion,
                format_br_date(params.correction_start),
                format_br_date(end)
            );
            IndexSeries::empty()
        } else {
            self.source
                .fetch_series(params.index, params.correction_start, end)
                .await?
        };

        let accumulation_factor = series.accumulation_factor();
        let corrected = params.principal * accumulation_factor;

        let outcome = params
            .policy
            .evaluate(self.source.as_ref(), params.interest_start, end)
            .await?;
        let interest = corrected * outcome.percentage;

        let mut result = PortionResult {
            portion: params.portion,
            index: params.index,
            policy: params.policy,
            correction_start: params.correction_start,
            interest_start: params.interest_start,
            end,
            principal: params.principal,
            accumulation_factor,
            corrected,
            interest_percentage: outcome.percentage,
            interest_months: outcome.months,
            interest,
            total: corrected + interest,
            rows: Vec::with_capacity(series.len()),
        };

        let mut cumulative = 1.0;
        for point in &series {
            cumulative *= point.factor();
            result.add_row(BreakdownRow {
                period: point.date,
                index_value: point.value,
                cumulative_factor: cumulative,
                corrected_value: params.principal * cumulative,
                interest: 0.0,
            });
        }
        if let Some(last) = result.rows.last_mut() {
            last.interest = interest;
        }

        debug!(
            "{}: factor {:.6}, interest {:.4}% over {} months",
            params,
            accumulation_factor,
            outcome.percentage * 100.0,
            outcome.months
        );

        Ok(result)
    }

    /// Calculate a claimant whose parts are already resolved
    pub async fn calculate_resolved(
        &self,
        claimant: &Claimant,
        portions: &[PortionParams],
        end: NaiveDate,
    ) -> CalcResult<ClaimantResult> {
        let mut results = Vec::with_capacity(portions.len());
        for params in portions {
            results.push(self.calculate_portion(params, end).await?);
        }
        Ok(ClaimantResult::from_portions(claimant.clone(), results))
    }

    /// Resolve a claimant's dates against the case and calculate every part
    pub async fn calculate_claimant(
        &self,
        claimant: &Claimant,
        case: &CaseParameters,
        end: NaiveDate,
    ) -> CalcResult<ClaimantResult> {
        let portions = claimant.resolve(case)?;
        self.calculate_resolved(claimant, &portions, end).await
    }
}
