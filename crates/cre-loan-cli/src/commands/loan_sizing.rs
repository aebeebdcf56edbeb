use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use cre_loan_core::loan_sizing::{self, LoanSizerInput};

use crate::input;

/// Arguments for loan sizing
#[derive(Args)]
pub struct SizeLoanArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Maximum loan-to-value (e.g. 0.70)
    #[arg(long)]
    pub max_ltv: Option<Decimal>,

    /// Minimum debt service coverage ratio (e.g. 1.25)
    #[arg(long)]
    pub min_dscr: Option<Decimal>,

    #[arg(long)]
    pub amortization: Option<u32>,

    #[arg(long)]
    pub term: Option<u32>,

    /// Leading interest-only periods
    #[arg(long, default_value_t = 0)]
    pub io_periods: u32,

    /// Periodic interest rate
    #[arg(long)]
    pub rate: Option<Decimal>,

    #[arg(long)]
    pub property_value: Option<Decimal>,

    /// Net operating income per period
    #[arg(long)]
    pub noi: Option<Decimal>,

    /// Amount requested; defaults to the property value
    #[arg(long)]
    pub requested: Option<Decimal>,

    #[arg(long)]
    pub origination_fee_rate: Option<Decimal>,
}

pub fn run_size_loan(args: SizeLoanArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let sizer_input: LoanSizerInput = match input::read_structured(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => LoanSizerInput {
            max_ltv: args
                .max_ltv
                .ok_or("--max-ltv is required (or provide --input)")?,
            min_dscr: args
                .min_dscr
                .ok_or("--min-dscr is required (or provide --input)")?,
            amortization_periods: args
                .amortization
                .ok_or("--amortization is required (or provide --input)")?,
            term_periods: args.term.ok_or("--term is required (or provide --input)")?,
            io_periods: args.io_periods,
            rate: args.rate.ok_or("--rate is required (or provide --input)")?,
            property_value: args
                .property_value
                .ok_or("--property-value is required (or provide --input)")?,
            noi: args.noi.ok_or("--noi is required (or provide --input)")?,
            requested_loan_amount: args.requested.unwrap_or_default(),
            origination_fee_rate: args.origination_fee_rate.unwrap_or_default(),
        },
    };

    let result = loan_sizing::size_loan(&sizer_input)?;
    Ok(serde_json::to_value(result)?)
}
