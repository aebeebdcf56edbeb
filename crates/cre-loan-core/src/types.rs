use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CreLoanError;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Whether each payment falls at the end (ordinary annuity) or the beginning
/// (annuity-due) of its period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTiming {
    #[default]
    End,
    Begin,
}

impl PaymentTiming {
    /// The 0/1 factor the annuity formulas apply to one period of interest.
    pub fn multiplier(self) -> Decimal {
        match self {
            PaymentTiming::End => Decimal::ZERO,
            PaymentTiming::Begin => Decimal::ONE,
        }
    }
}

impl TryFrom<i64> for PaymentTiming {
    type Error = CreLoanError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PaymentTiming::End),
            1 => Ok(PaymentTiming::Begin),
            other => Err(CreLoanError::invalid(
                "timing",
                other,
                "must be 0 (end of period) or 1 (beginning of period)",
            )),
        }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
