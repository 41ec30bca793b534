//! Monetary Correction - judgment award correction and moratory interest engine
//!
//! This library provides:
//! - Monetary correction of principals by official price indices (IPCA, INPC, IGP-M, SELIC, TR)
//! - Moratory interest at 1% per month, at the policy rate, or at the real (inflation-adjusted) rate
//! - Unified or split (material/moral damages) claims with precedent-based default dates
//! - A central bank SGS client behind a persistent 24-hour index cache
//! - Batch calculation over every claimant of a case, with grand totals

pub mod aggregate;
pub mod claims;
pub mod config;
pub mod dates;
pub mod engine;
pub mod error;
pub mod indices;

// Re-export commonly used types
pub use aggregate::{BatchRunner, GrandTotals};
pub use claims::{Case, CaseParameters, Claimant, ClaimMode, PortionParams, SubClaim};
pub use engine::{ClaimantResult, CorrectionEngine, InterestPolicy, PortionResult};
pub use error::{CalcError, CalcResult};
pub use indices::{BcbClient, CorrectionIndex, IndexCache, IndexPoint, IndexSeries, IndexSource, StaticSource};
