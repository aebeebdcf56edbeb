pub mod sizer;

pub use sizer::{
    size_loan, BindingConstraint, LoanSizer, LoanSizerInput, LoanSizingOutput,
    PaymentDistribution, SizingConstraints,
};
