use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use cre_loan_core::annuity::{self, AmortizationInput};
use cre_loan_core::PaymentTiming;

use crate::input;

/// Arguments for the interest-only payment
#[derive(Args)]
pub struct IoPaymentArgs {
    /// Periodic interest rate (e.g. 0.0045)
    #[arg(long)]
    pub rate: Decimal,

    /// Outstanding principal
    #[arg(long, allow_hyphen_values = true)]
    pub present_value: Decimal,
}

/// Arguments for the level payment
#[derive(Args)]
pub struct PaymentArgs {
    /// Periodic interest rate
    #[arg(long)]
    pub rate: Decimal,

    /// Number of payment periods
    #[arg(long)]
    pub periods: u32,

    /// Amount disbursed at t=0
    #[arg(long, allow_hyphen_values = true)]
    pub present_value: Decimal,

    /// Balance left after the last period
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub future_value: Decimal,

    /// 0 = payments at period end, 1 = at period start
    #[arg(long, default_value_t = 0)]
    pub timing: i64,
}

/// Arguments for the present value of a payment stream
#[derive(Args)]
pub struct PresentValueArgs {
    /// Periodic interest rate
    #[arg(long)]
    pub rate: Decimal,

    /// Number of payment periods
    #[arg(long)]
    pub periods: u32,

    /// Level payment per period (negative = paid out)
    #[arg(long, allow_hyphen_values = true)]
    pub payment: Decimal,

    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub future_value: Decimal,

    /// 0 = payments at period end, 1 = at period start
    #[arg(long, default_value_t = 0)]
    pub timing: i64,
}

/// Arguments for a full amortization table
#[derive(Args)]
pub struct AmortizeArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    #[arg(long)]
    pub rate: Option<Decimal>,

    #[arg(long)]
    pub periods: Option<u32>,

    #[arg(long, allow_hyphen_values = true)]
    pub present_value: Option<Decimal>,

    #[arg(long, allow_hyphen_values = true)]
    pub future_value: Option<Decimal>,

    /// 0 = payments at period end, 1 = at period start
    #[arg(long)]
    pub timing: Option<i64>,
}

pub fn run_io_payment(args: IoPaymentArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let payment = annuity::interest_only_payment(args.rate, args.present_value);
    Ok(json!({ "result": { "io_payment": payment } }))
}

pub fn run_payment(args: PaymentArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let timing = PaymentTiming::try_from(args.timing)?;
    let payment = annuity::payment(
        args.rate,
        args.periods,
        args.present_value,
        args.future_value,
        timing,
    )?;
    Ok(json!({ "result": { "payment": payment } }))
}

pub fn run_present_value(args: PresentValueArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let timing = PaymentTiming::try_from(args.timing)?;
    let pv = annuity::present_value(
        args.rate,
        args.periods,
        args.payment,
        args.future_value,
        timing,
    )?;
    Ok(json!({ "result": { "present_value": pv } }))
}

pub fn run_amortize(args: AmortizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let amortization_input: AmortizationInput =
        match input::read_structured(args.input.as_deref())? {
            Some(parsed) => parsed,
            None => {
                let rate = args.rate.ok_or("--rate is required (or provide --input)")?;
                let periods = args
                    .periods
                    .ok_or("--periods is required (or provide --input)")?;
                let present_value = args
                    .present_value
                    .ok_or("--present-value is required (or provide --input)")?;
                let timing = PaymentTiming::try_from(args.timing.unwrap_or(0))?;

                AmortizationInput {
                    rate,
                    periods,
                    present_value,
                    future_value: args.future_value.unwrap_or_default(),
                    timing,
                }
            }
        };

    let result = annuity::build_amortization_schedule(&amortization_input)?;
    Ok(serde_json::to_value(result)?)
}
