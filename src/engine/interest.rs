//! Moratory interest policies
//!
//! Every policy maps (interest start, calculation end) to an accumulated
//! fraction of the corrected principal: 0.12 means 12%.

use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::dates::{format_br_date, whole_months_between};
use crate::error::{CalcError, CalcResult};
use crate::indices::{CorrectionIndex, IndexSeries, IndexSource};

/// Simple interest per whole month under the fixed policy
pub const FIXED_MONTHLY_RATE: f64 = 0.01;

/// Interest regime set by the judgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum InterestPolicy {
    /// 1% per whole month, simple
    #[default]
    #[serde(rename = "1_PORCENTO")]
    FixedMonthly,
    /// Policy rate compounded month by month
    #[serde(rename = "SELIC")]
    ReferenceRate,
    /// Policy rate net of inflation (Fisher), compounded, never below zero
    #[serde(rename = "SELIC_MENOS_IPCA")]
    RealRate,
}

/// Accumulated interest and the number of months it spans
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterestOutcome {
    pub percentage: f64,
    pub months: u32,
}

impl InterestOutcome {
    pub fn zero() -> Self {
        Self {
            percentage: 0.0,
            months: 0,
        }
    }
}

impl InterestPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterestPolicy::FixedMonthly => "1_PORCENTO",
            InterestPolicy::ReferenceRate => "SELIC",
            InterestPolicy::RealRate => "SELIC_MENOS_IPCA",
        }
    }

    /// Name for report headers
    pub fn display_name(&self) -> &'static str {
        match self {
            InterestPolicy::FixedMonthly => "1% ao mês",
            InterestPolicy::ReferenceRate => "Taxa Selic",
            InterestPolicy::RealRate => "Selic - IPCA",
        }
    }

    /// Whether monthly rates compound
    pub fn is_compounding(&self) -> bool {
        !matches!(self, InterestPolicy::FixedMonthly)
    }

    /// Accumulated interest between `start` and `end`.
    ///
    /// A start after the end yields zero and a warning rather than an error.
    pub async fn evaluate(
        &self,
        source: &dyn IndexSource,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CalcResult<InterestOutcome> {
        if start > end {
            warn!(
                "Interest start {} is after calculation date {}; no interest applied",
                format_br_date(start),
                format_br_date(end)
            );
            return Ok(InterestOutcome::zero());
        }

        match self {
            InterestPolicy::FixedMonthly => Ok(fixed_monthly(start, end)),
            InterestPolicy::ReferenceRate => {
                let nominal = source.fetch_series(CorrectionIndex::Selic, start, end).await?;
                Ok(reference_rate(&nominal))
            }
            InterestPolicy::RealRate => {
                let (nominal, inflation) = tokio::try_join!(
                    source.fetch_series(CorrectionIndex::Selic, start, end),
                    source.fetch_series(CorrectionIndex::Ipca, start, end),
                )?;
                Ok(real_rate(&nominal, &inflation))
            }
        }
    }
}

/// `whole months x 1%`, with the day of month ignored. Zero if `start` is in a later month.
pub fn fixed_monthly(start: NaiveDate, end: NaiveDate) -> InterestOutcome {
    let months = whole_months_between(start, end).max(0) as u32;
    InterestOutcome {
        percentage: months as f64 * FIXED_MONTHLY_RATE,
        months,
    }
}

/// `prod(1 + rate/100) - 1` over the policy-rate series
pub fn reference_rate(nominal: &IndexSeries) -> InterestOutcome {
    InterestOutcome {
        percentage: nominal.compounded_rate(),
        months: nominal.len() as u32,
    }
}

/// Real interest by Fisher's equation, paired on calendar month.
///
/// Each month of the nominal series contributes `(1 + n/100) / (1 + i/100)`;
/// a month with no inflation value counts inflation as zero. Negative real
/// interest is floored at zero.
pub fn real_rate(nominal: &IndexSeries, inflation: &IndexSeries) -> InterestOutcome {
    let inflation_by_month = inflation.by_month();
    let nominal_by_month = nominal.by_month();

    let factor = nominal_by_month.iter().fold(1.0, |acc, (month, n)| {
        let i = inflation_by_month.get(month).copied().unwrap_or(0.0);
        acc * (1.0 + n / 100.0) / (1.0 + i / 100.0)
    });

    InterestOutcome {
        percentage: (factor - 1.0).max(0.0),
        months: nominal_by_month.len() as u32,
    }
}

impl fmt::Display for InterestPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterestPolicy {
    type Err = CalcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1_PORCENTO" | "1%" | "FIXED" | "FIXED_MONTHLY" => Ok(InterestPolicy::FixedMonthly),
            "SELIC" | "REFERENCE" | "REFERENCE_RATE" => Ok(InterestPolicy::ReferenceRate),
            "SELIC_MENOS_IPCA" | "REAL" | "REAL_RATE" => Ok(InterestPolicy::RealRate),
            other => Err(CalcError::Parse(format!("unknown interest policy: {}", other))),
        }
    }
}
