pub mod annuity;
pub mod error;
pub mod rounding;
pub mod time_value;
pub mod types;

#[cfg(feature = "loan_sizing")]
pub mod loan_sizing;

#[cfg(feature = "investment_analysis")]
pub mod investment_analysis;

pub use error::{Contextual, CreLoanError, ErrorKind};
pub use types::*;

/// Standard result type for all cre-loan operations
pub type CreLoanResult<T> = Result<T, CreLoanError>;
