//! Calculation output structures

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::claims::{Claimant, Portion};
use crate::dates::br_date;
use crate::indices::CorrectionIndex;

use super::InterestPolicy;

/// One month of the correction breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownRow {
    #[serde(with = "br_date")]
    pub period: NaiveDate,
    /// Published index value for the month, in percent
    pub index_value: f64,
    /// Product of `1 + value/100` up to and including this month
    pub cumulative_factor: f64,
    pub corrected_value: f64,
    /// Interest is only attributed at the final period
    pub interest: f64,
}

/// Result of correcting one principal and applying interest to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortionResult {
    pub portion: Portion,
    pub index: CorrectionIndex,
    pub policy: InterestPolicy,
    #[serde(with = "br_date")]
    pub correction_start: NaiveDate,
    #[serde(with = "br_date")]
    pub interest_start: NaiveDate,
    #[serde(with = "br_date")]
    pub end: NaiveDate,

    pub principal: f64,
    pub accumulation_factor: f64,
    pub corrected: f64,
    /// Accumulated interest as a fraction (0.12 = 12%)
    pub interest_percentage: f64,
    pub interest_months: u32,
    pub interest: f64,
    pub total: f64,

    pub rows: Vec<BreakdownRow>,
}

impl PortionResult {
    /// Add a breakdown row
    pub fn add_row(&mut self, row: BreakdownRow) {
        self.rows.push(row);
    }

    /// Correction gained over the principal
    pub fn correction_gain(&self) -> f64 {
        self.corrected - self.principal
    }
}

/// How a claimant's result is broken down
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ClaimantBreakdown {
    Unified(PortionResult),
    Split {
        material: Option<PortionResult>,
        moral: Option<PortionResult>,
    },
}

/// Everything calculated for one claimant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimantResult {
    pub claimant: Claimant,
    pub breakdown: ClaimantBreakdown,

    pub principal: f64,
    pub corrected: f64,
    pub interest: f64,
    pub total: f64,
    /// `corrected / principal` over all parts
    pub accumulation_factor: f64,
    /// `interest / corrected` over all parts
    pub interest_percentage: f64,
}

impl ClaimantResult {
    /// Combine the parts calculated for a claimant
    pub fn from_portions(claimant: Claimant, portions: Vec<PortionResult>) -> Self {
        let principal: f64 = portions.iter().map(|p| p.principal).sum();
        let corrected: f64 = portions.iter().map(|p| p.corrected).sum();
        let interest: f64 = portions.iter().map(|p| p.interest).sum();
        let total: f64 = portions.iter().map(|p| p.total).sum();

        let breakdown = if claimant.is_split() {
            let mut material = None;
            let mut moral = None;
            for portion in portions {
                match portion.portion {
                    Portion::Material => material = Some(portion),
                    Portion::Moral => moral = Some(portion),
                    Portion::Unified => {}
                }
            }
            ClaimantBreakdown::Split { material, moral }
        } else {
            match portions.into_iter().next() {
                Some(p) => ClaimantBreakdown::Unified(p),
                None => ClaimantBreakdown::Split {
                    material: None,
                    moral: None,
                },
            }
        };

        Self {
            claimant,
            breakdown,
            principal,
            corrected,
            interest,
            total,
            accumulation_factor: if principal > 0.0 { corrected / principal } else { 1.0 },
            interest_percentage: if corrected > 0.0 { interest / corrected } else { 0.0 },
        }
    }

    pub fn material(&self) -> Option<&PortionResult> {
        match &self.breakdown {
            ClaimantBreakdown::Split { material, .. } => material.as_ref(),
            ClaimantBreakdown::Unified(_) => None,
        }
    }

    pub fn moral(&self) -> Option<&PortionResult> {
        match &self.breakdown {
            ClaimantBreakdown::Split { moral, .. } => moral.as_ref(),
            ClaimantBreakdown::Unified(_) => None,
        }
    }

    /// Every calculated part, material before moral
    pub fn portions(&self) -> Vec<&PortionResult> {
        match &self.breakdown {
            ClaimantBreakdown::Unified(p) => vec![p],
            ClaimantBreakdown::Split { material, moral } => {
                material.iter().chain(moral.iter()).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::SubClaim;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn portion(portion: Portion, principal: f64, factor: f64, rate: f64) -> PortionResult {
        let corrected = principal * factor;
        let interest = corrected * rate;
        PortionResult {
            portion,
            index: CorrectionIndex::Ipca,
            policy: InterestPolicy::FixedMonthly,
            correction_start: d(2020, 1, 1),
            interest_start: d(2020, 1, 1),
            end: d(2021, 1, 1),
            principal,
            accumulation_factor: factor,
            corrected,
            interest_percentage: rate,
            interest_months: 12,
            interest,
            total: corrected + interest,
            rows: Vec::new(),
        }
    }

    #[test]
    fn test_no_portions_gives_neutral_ratios() {
        let result = ClaimantResult::from_portions(Claimant::unified("1", "Ana", 0.0), Vec::new());

        assert_eq!(result.principal, 0.0);
        assert_eq!(result.corrected, 0.0);
        assert_eq!(result.total, 0.0);
        assert_eq!(result.accumulation_factor, 1.0);
        assert_eq!(result.interest_percentage, 0.0);
        assert!(result.portions().is_empty());
    }

    #[test]
    fn test_split_ratios_are_weighted_by_amount() {
        let claimant = Claimant::split("2", "Bruno", Some(SubClaim::new(1000.0)), Some(SubClaim::new(3000.0)));
        let result = ClaimantResult::from_portions(
            claimant,
            vec![
                portion(Portion::Material, 1000.0, 1.2, 0.10),
                portion(Portion::Moral, 3000.0, 1.0, 0.05),
            ],
        );

        assert_relative_eq!(result.principal, 4000.0, epsilon = 1e-9);
        assert_relative_eq!(result.corrected, 4200.0, epsilon = 1e-9);
        assert_relative_eq!(result.accumulation_factor, 4200.0 / 4000.0, epsilon = 1e-12);
        assert_relative_eq!(result.interest_percentage, (120.0 + 150.0) / 4200.0, epsilon = 1e-12);
        assert_relative_eq!(result.total, result.corrected + result.interest, epsilon = 1e-9);
        assert_eq!(result.material().map(|p| p.principal), Some(1000.0));
        assert_eq!(result.moral().map(|p| p.principal), Some(3000.0));
    }

    #[test]
    fn test_correction_gain() {
        let p = portion(Portion::Unified, 500.0, 1.1, 0.0);
        assert_relative_eq!(p.correction_gain(), 50.0, epsilon = 1e-9);
    }
}
