//! Claimants, their claims, and the case-level fallback dates
//!
//! A claimant either has one unified principal or separate material and
//! moral damages. Each part is resolved into [`PortionParams`] before it
//! reaches the engine, filling missing dates from the case according to the
//! court precedents for each kind of damage.

pub mod loader;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dates::format_br_date;
use crate::engine::InterestPolicy;
use crate::error::{CalcError, CalcResult};
use crate::indices::CorrectionIndex;

pub use loader::{load_case, load_claimants_csv, parse_case, Case};

/// Which part of a claim a calculation refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Portion {
    Unified,
    Material,
    Moral,
}

impl Portion {
    pub fn label(&self) -> &'static str {
        match self {
            Portion::Unified => "Principal",
            Portion::Material => "Dano material",
            Portion::Moral => "Dano moral",
        }
    }
}

impl fmt::Display for Portion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where moratory interest starts when a claim does not say
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterestStartRule {
    /// Contractual liability: interest from citation
    #[default]
    #[serde(alias = "citacao")]
    Citation,
    /// Extra-contractual liability (Súmula 54): interest from the tortious event
    #[serde(alias = "evento_danoso")]
    TortiousEvent,
}

/// Dates extracted from the case documents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseDates {
    pub filing: Option<NaiveDate>,
    pub judgment: Option<NaiveDate>,
    pub citation: Option<NaiveDate>,
    pub tortious_event: Option<NaiveDate>,
    /// Single base date of older extractions, used for unified claims
    pub base: Option<NaiveDate>,
}

/// Case-wide parameters shared by every claimant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseParameters {
    pub process_number: Option<String>,
    pub court: Option<String>,
    pub chamber: Option<String>,
    pub dates: CaseDates,
    /// Index for unified claims and for split claims that name none
    pub index: CorrectionIndex,
    /// Interest policy for unified claims and for split claims that name none
    pub policy: InterestPolicy,
    pub interest_start_rule: InterestStartRule,
}

impl CaseParameters {
    /// Default interest start under the case's interest rule
    pub fn default_interest_start(&self) -> Option<NaiveDate> {
        match self.interest_start_rule {
            InterestStartRule::Citation => self.dates.citation,
            InterestStartRule::TortiousEvent => self.dates.tortious_event.or(self.dates.citation),
        }
    }

    fn interest_start_field(&self) -> &'static str {
        match self.interest_start_rule {
            InterestStartRule::Citation => "citation date",
            InterestStartRule::TortiousEvent => "tortious event date",
        }
    }
}

/// One part (material or moral) of a split claim
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubClaim {
    pub principal: f64,
    pub correction_start: Option<NaiveDate>,
    pub index: Option<CorrectionIndex>,
    pub interest_start: Option<NaiveDate>,
    pub policy: Option<InterestPolicy>,
}

impl SubClaim {
    pub fn new(principal: f64) -> Self {
        Self {
            principal,
            ..Default::default()
        }
    }

    /// Only parts with a positive amount are calculated
    pub fn is_active(&self) -> bool {
        self.principal > 0.0
    }
}

/// A single principal corrected from one date
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedClaim {
    pub principal: f64,
    pub correction_start: Option<NaiveDate>,
    pub interest_start: Option<NaiveDate>,
}

/// How a claimant's amount is structured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ClaimMode {
    Unified(UnifiedClaim),
    Split {
        material: Option<SubClaim>,
        moral: Option<SubClaim>,
    },
}

/// A party whose award is calculated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claimant {
    pub id: String,
    pub name: String,
    /// CPF or CNPJ as written in the documents
    pub tax_id: Option<String>,
    pub claim: ClaimMode,
}

/// Fully resolved inputs for one engine calculation
#[derive(Debug, Clone, PartialEq)]
pub struct PortionParams {
    pub portion: Portion,
    pub principal: f64,
    pub correction_start: NaiveDate,
    pub index: CorrectionIndex,
    pub interest_start: NaiveDate,
    pub policy: InterestPolicy,
}

impl Claimant {
    pub fn unified(id: impl Into<String>, name: impl Into<String>, principal: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tax_id: None,
            claim: ClaimMode::Unified(UnifiedClaim {
                principal,
                ..Default::default()
            }),
        }
    }

    pub fn split(
        id: impl Into<String>,
        name: impl Into<String>,
        material: Option<SubClaim>,
        moral: Option<SubClaim>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tax_id: None,
            claim: ClaimMode::Split { material, moral },
        }
    }

    /// Amount claimed before correction, summed over active parts
    pub fn principal(&self) -> f64 {
        match &self.claim {
            ClaimMode::Unified(u) => u.principal.max(0.0),
            ClaimMode::Split { material, moral } => [material, moral]
                .into_iter()
                .flatten()
                .filter(|s| s.is_active())
                .map(|s| s.principal)
                .sum(),
        }
    }

    /// Whether there is anything to calculate
    pub fn has_amount(&self) -> bool {
        self.principal() > 0.0
    }

    pub fn is_split(&self) -> bool {
        matches!(self.claim, ClaimMode::Split { .. })
    }

    /// Resolve every active part into engine inputs.
    ///
    /// Material damages default to the filing date for correction, moral
    /// damages to the judgment date (Súmula 362). Interest defaults to the
    /// case's interest rule. A unified claim corrects from its own date,
    /// then the legacy base date, then the citation date.
    pub fn resolve(&self, case: &CaseParameters) -> CalcResult<Vec<PortionParams>> {
        if !self.has_amount() {
            return Err(CalcError::Validation(format!(
                "{}: no positive amount to calculate",
                self.name
            )));
        }

        match &self.claim {
            ClaimMode::Unified(u) => {
                let correction_start = u
                    .correction_start
                    .or(case.dates.base)
                    .or(case.dates.citation)
                    .ok_or_else(|| self.missing("correction start date (base or citation date)"))?;
                let interest_start = u
                    .interest_start
                    .or_else(|| case.default_interest_start())
                    .ok_or_else(|| self.missing(case.interest_start_field()))?;

                Ok(vec![PortionParams {
                    portion: Portion::Unified,
                    principal: u.principal,
                    correction_start,
                    index: case.index,
                    interest_start,
                    policy: case.policy,
                }])
            }
            ClaimMode::Split { material, moral } => {
                let mut portions = Vec::with_capacity(2);
                if let Some(m) = material.as_ref().filter(|m| m.is_active()) {
                    portions.push(self.resolve_part(Portion::Material, m, case, case.dates.filing, "filing date")?);
                }
                if let Some(m) = moral.as_ref().filter(|m| m.is_active()) {
                    portions.push(self.resolve_part(Portion::Moral, m, case, case.dates.judgment, "judgment date")?);
                }
                Ok(portions)
            }
        }
    }

    fn resolve_part(
        &self,
        portion: Portion,
        part: &SubClaim,
        case: &CaseParameters,
        default_correction: Option<NaiveDate>,
        default_field: &str,
    ) -> CalcResult<PortionParams> {
        let correction_start = part
            .correction_start
            .or(default_correction)
            .ok_or_else(|| self.missing(&format!("{} correction start ({})", portion.label(), default_field)))?;
        let interest_start = part
            .interest_start
            .or_else(|| case.default_interest_start())
            .ok_or_else(|| {
                self.missing(&format!("{} interest start ({})", portion.label(), case.interest_start_field()))
            })?;

        Ok(PortionParams {
            portion,
            principal: part.principal,
            correction_start,
            index: part.index.unwrap_or(case.index),
            interest_start,
            policy: part.policy.unwrap_or(case.policy),
        })
    }

    fn missing(&self, field: &str) -> CalcError {
        CalcError::Validation(format!("{}: missing {}", self.name, field))
    }
}

/// Claimants with a positive amount, in input order
pub fn valid_claimants(claimants: &[Claimant]) -> Vec<Claimant> {
    claimants.iter().filter(|c| c.has_amount()).cloned().collect()
}

/// Resolve every claimant, reporting all problems at once
pub fn validate_claimants(
    claimants: &[Claimant],
    case: &CaseParameters,
) -> CalcResult<Vec<Vec<PortionParams>>> {
    if claimants.is_empty() {
        return Err(CalcError::Validation("no claimant with a positive amount".to_string()));
    }

    let mut resolved = Vec::with_capacity(claimants.len());
    let mut problems = Vec::new();
    for claimant in claimants {
        match claimant.resolve(case) {
            Ok(portions) => resolved.push(portions),
            Err(CalcError::Validation(msg)) => problems.push(msg),
            Err(e) => return Err(e),
        }
    }

    if problems.is_empty() {
        Ok(resolved)
    } else {
        Err(CalcError::Validation(problems.join("; ")))
    }
}

impl fmt::Display for PortionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.2} by {} from {}, interest {} from {}",
            self.portion,
            self.principal,
            self.index,
            format_br_date(self.correction_start),
            self.policy,
            format_br_date(self.interest_start)
        )
    }
}
