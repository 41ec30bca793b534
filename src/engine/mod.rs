//! Correction and interest engine

mod calculator;
pub mod interest;
mod results;

pub use calculator::CorrectionEngine;
pub use interest::{InterestOutcome, InterestPolicy};
pub use results::{BreakdownRow, ClaimantBreakdown, ClaimantResult, PortionResult};
