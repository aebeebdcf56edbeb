pub mod annuity;
pub mod investment;
pub mod loan_sizing;
