//! Load cases from extraction JSON and claimants from CSV
//!
//! The JSON shape is the structured record produced by document extraction,
//! keyed in Portuguese. English keys are accepted as aliases. Dates may be
//! `DD/MM/YYYY`, `MM/YYYY` or ISO; amounts may be numbers or Brazilian-formatted
//! strings.

use chrono::NaiveDate;
use csv::Reader;
use log::{debug, warn};
use serde::Deserialize;
use std::path::Path;

use super::{CaseDates, CaseParameters, ClaimMode, Claimant, InterestStartRule, SubClaim, UnifiedClaim};
use crate::dates::{parse_br_date, parse_br_number};
use crate::engine::InterestPolicy;
use crate::error::{CalcError, CalcResult};
use crate::indices::CorrectionIndex;

/// A case ready for calculation
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub parameters: CaseParameters,
    pub claimants: Vec<Claimant>,
    /// Calculation date named in the record, if any
    pub calculation_date: Option<NaiveDate>,
}

/// Amount given either as a JSON number or as text
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(f64),
    Text(String),
}

impl RawAmount {
    fn value(&self) -> CalcResult<f64> {
        match self {
            RawAmount::Number(n) => Ok(*n),
            RawAmount::Text(s) => parse_br_number(s),
        }
    }
}

fn amount(raw: &Option<RawAmount>) -> CalcResult<f64> {
    raw.as_ref().map(RawAmount::value).unwrap_or(Ok(0.0))
}

/// Blank or `null` means absent. Any other text must be a valid date.
fn optional_date(raw: &Option<String>, owner: &str, field: &str) -> CalcResult<Option<NaiveDate>> {
    let s = match raw.as_deref().map(str::trim) {
        None => return Ok(None),
        Some(s) if s.is_empty() || s.eq_ignore_ascii_case("null") => return Ok(None),
        Some(s) => s,
    };
    parse_br_date(s).map(Some).map_err(|e| {
        warn!("Rejecting {} '{}' of {}: {}", field, s, owner, e);
        CalcError::Validation(format!("{}: invalid {} '{}'", owner, field, s))
    })
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[derive(Debug, Deserialize)]
struct RawSubClaim {
    #[serde(rename = "valor", alias = "amount")]
    amount: Option<RawAmount>,
    #[serde(rename = "dataInicioCorrecao", alias = "correctionStart")]
    correction_start: Option<String>,
    #[serde(rename = "indiceCorrecao", alias = "index")]
    index: Option<CorrectionIndex>,
    #[serde(rename = "dataInicioJuros", alias = "interestStart")]
    interest_start: Option<String>,
    #[serde(rename = "tipoJuros", alias = "interestPolicy")]
    policy: Option<InterestPolicy>,
}

impl RawSubClaim {
    /// `None` when the amount is not positive
    fn into_sub_claim(self, owner: &str, part: &str) -> CalcResult<Option<SubClaim>> {
        let principal = amount(&self.amount)?;
        if principal <= 0.0 {
            return Ok(None);
        }
        Ok(Some(SubClaim {
            principal,
            correction_start: optional_date(
                &self.correction_start,
                owner,
                &format!("{} correction start date", part),
            )?,
            index: self.index,
            interest_start: optional_date(&self.interest_start, owner, &format!("{} interest start date", part))?,
            policy: self.policy,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct RawClaimant {
    id: Option<String>,
    #[serde(rename = "nome", alias = "name", default)]
    name: String,
    #[serde(rename = "cpf", alias = "taxId")]
    tax_id: Option<String>,
    #[serde(rename = "valorPrincipal", alias = "principal")]
    principal: Option<RawAmount>,
    #[serde(rename = "danoMaterial", alias = "material")]
    material: Option<RawSubClaim>,
    #[serde(rename = "danoMoral", alias = "moral")]
    moral: Option<RawSubClaim>,
    /// Older records carry split amounts without per-part settings
    #[serde(rename = "valorDanoMaterial")]
    legacy_material: Option<RawAmount>,
    #[serde(rename = "valorDanoMoral")]
    legacy_moral: Option<RawAmount>,
    #[serde(rename = "dataInicioCorrecao", alias = "correctionStart")]
    correction_start: Option<String>,
    #[serde(rename = "dataInicioJuros", alias = "interestStart")]
    interest_start: Option<String>,
}

impl RawClaimant {
    /// Split settings take precedence over the unified principal when both exist
    fn into_claimant(self, position: usize) -> CalcResult<Claimant> {
        let id = non_blank(self.id).unwrap_or_else(|| format!("autor-{}", position + 1));
        let name = self.name.trim().to_string();

        let owner = if name.is_empty() { id.as_str() } else { name.as_str() };
        let mut material = self
            .material
            .map(|m| m.into_sub_claim(owner, "material"))
            .transpose()?
            .flatten();
        let mut moral = self
            .moral
            .map(|m| m.into_sub_claim(owner, "moral"))
            .transpose()?
            .flatten();

        if material.is_none() && moral.is_none() {
            let legacy_material = amount(&self.legacy_material)?;
            let legacy_moral = amount(&self.legacy_moral)?;
            if legacy_material > 0.0 {
                material = Some(SubClaim::new(legacy_material));
            }
            if legacy_moral > 0.0 {
                moral = Some(SubClaim::new(legacy_moral));
            }
        }

        let claim = if material.is_some() || moral.is_some() {
            ClaimMode::Split { material, moral }
        } else {
            ClaimMode::Unified(UnifiedClaim {
                principal: amount(&self.principal)?,
                correction_start: optional_date(&self.correction_start, owner, "correction start date")?,
                interest_start: optional_date(&self.interest_start, owner, "interest start date")?,
            })
        };

        Ok(Claimant {
            id,
            name,
            tax_id: non_blank(self.tax_id),
            claim,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawCase {
    #[serde(rename = "autores", alias = "claimants", default)]
    claimants: Vec<RawClaimant>,
    #[serde(rename = "dataAjuizamento", alias = "filingDate")]
    filing: Option<String>,
    #[serde(rename = "dataSentenca", alias = "judgmentDate")]
    judgment: Option<String>,
    #[serde(rename = "dataCitacao", alias = "citationDate")]
    citation: Option<String>,
    #[serde(rename = "dataEventoDanoso", alias = "tortiousEventDate")]
    tortious_event: Option<String>,
    #[serde(rename = "dataBase", alias = "baseDate")]
    base: Option<String>,
    #[serde(rename = "dataCalculo", alias = "calculationDate")]
    calculation_date: Option<String>,
    #[serde(rename = "indiceCorrecao", alias = "index")]
    index: Option<CorrectionIndex>,
    #[serde(rename = "tipoJuros", alias = "interestPolicy")]
    policy: Option<InterestPolicy>,
    #[serde(rename = "regraJuros", alias = "interestStartRule")]
    interest_start_rule: Option<InterestStartRule>,
    #[serde(rename = "tribunal", alias = "court")]
    court: Option<String>,
    #[serde(rename = "numeroProcesso", alias = "processNumber")]
    process_number: Option<String>,
    #[serde(rename = "vara", alias = "chamber")]
    chamber: Option<String>,
}

/// Owner named in errors about case-level fields
const CASE: &str = "case";

impl RawCase {
    fn into_case(self) -> CalcResult<Case> {
        let base = optional_date(&self.base, CASE, "base date")?;
        let dates = CaseDates {
            filing: optional_date(&self.filing, CASE, "filing date")?,
            judgment: optional_date(&self.judgment, CASE, "judgment date")?,
            // Older records only carry a base date; it stands in for citation
            citation: optional_date(&self.citation, CASE, "citation date")?.or(base),
            tortious_event: optional_date(&self.tortious_event, CASE, "tortious event date")?,
            base,
        };
        let calculation_date = optional_date(&self.calculation_date, CASE, "calculation date")?;

        let claimants = self
            .claimants
            .into_iter()
            .enumerate()
            .map(|(i, raw)| raw.into_claimant(i))
            .collect::<CalcResult<Vec<_>>>()?;

        Ok(Case {
            parameters: CaseParameters {
                process_number: non_blank(self.process_number),
                court: non_blank(self.court),
                chamber: non_blank(self.chamber),
                dates,
                index: self.index.unwrap_or_default(),
                policy: self.policy.unwrap_or_default(),
                interest_start_rule: self.interest_start_rule.unwrap_or_default(),
            },
            claimants,
            calculation_date,
        })
    }
}

/// Parse a case from its JSON text
pub fn parse_case(json: &str) -> CalcResult<Case> {
    let raw: RawCase = serde_json::from_str(json)?;
    raw.into_case()
}

/// Load a case from a JSON file
pub fn load_case<P: AsRef<Path>>(path: P) -> CalcResult<Case> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let case = parse_case(&text)?;
    debug!(
        "Loaded case {} with {} claimants from {}",
        case.parameters.process_number.as_deref().unwrap_or("(no number)"),
        case.claimants.len(),
        path.as_ref().display()
    );
    Ok(case)
}

/// Raw CSV row of a claimant list
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "nome", alias = "name")]
    name: String,
    #[serde(rename = "cpf", alias = "tax_id", default)]
    tax_id: Option<String>,
    #[serde(rename = "valor_principal", alias = "principal", default)]
    principal: Option<String>,
    #[serde(rename = "dano_material", alias = "material", default)]
    material: Option<String>,
    #[serde(rename = "dano_moral", alias = "moral", default)]
    moral: Option<String>,
}

impl CsvRow {
    fn to_claimant(self, position: usize) -> CalcResult<Claimant> {
        let parse = |v: &Option<String>| v.as_deref().map(parse_br_number).unwrap_or(Ok(0.0));
        let material = parse(&self.material)?;
        let moral = parse(&self.moral)?;

        let claim = if material > 0.0 || moral > 0.0 {
            ClaimMode::Split {
                material: (material > 0.0).then(|| SubClaim::new(material)),
                moral: (moral > 0.0).then(|| SubClaim::new(moral)),
            }
        } else {
            ClaimMode::Unified(UnifiedClaim {
                principal: parse(&self.principal)?,
                ..Default::default()
            })
        };

        Ok(Claimant {
            id: format!("autor-{}", position + 1),
            name: self.name.trim().to_string(),
            tax_id: non_blank(self.tax_id),
            claim,
        })
    }
}

/// Load claimants from a CSV file
pub fn load_claimants_csv<P: AsRef<Path>>(path: P) -> CalcResult<Vec<Claimant>> {
    let reader = Reader::from_path(path)?;
    read_claimants(reader)
}

/// Load claimants from any reader (e.g., string buffer)
pub fn load_claimants_from_reader<R: std::io::Read>(reader: R) -> CalcResult<Vec<Claimant>> {
    read_claimants(Reader::from_reader(reader))
}

fn read_claimants<R: std::io::Read>(mut reader: Reader<R>) -> CalcResult<Vec<Claimant>> {
    let mut claimants = Vec::new();
    for (i, result) in reader.deserialize().enumerate() {
        let row: CsvRow = result?;
        claimants.push(row.to_claimant(i)?);
    }
    if claimants.is_empty() {
        return Err(CalcError::Validation("claimant file has no rows".to_string()));
    }
    Ok(claimants)
}
