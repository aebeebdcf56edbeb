use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use cre_loan_core::loan_sizing::{LoanSizer, LoanSizerInput};
use cre_loan_core::PaymentTiming;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse_decimal(field: &str, raw: &str) -> NapiResult<Decimal> {
    Decimal::from_str(raw).map_err(|e| to_napi_error(format!("{field}: {e}")))
}

// ---------------------------------------------------------------------------
// Annuity
// ---------------------------------------------------------------------------

/// Level payment; decimals are passed as strings to keep full precision.
#[napi]
pub fn payment(
    rate: String,
    periods: u32,
    present_value: String,
    future_value: Option<String>,
    timing: Option<i64>,
) -> NapiResult<String> {
    let rate = parse_decimal("rate", &rate)?;
    let pv = parse_decimal("present_value", &present_value)?;
    let fv = match future_value {
        Some(raw) => parse_decimal("future_value", &raw)?,
        None => Decimal::ZERO,
    };
    let timing = PaymentTiming::try_from(timing.unwrap_or(0)).map_err(to_napi_error)?;
    let pmt = cre_loan_core::annuity::payment(rate, periods, pv, fv, timing)
        .map_err(to_napi_error)?;
    Ok(pmt.to_string())
}

#[napi]
pub fn amortization_schedule(input_json: String) -> NapiResult<String> {
    let input: cre_loan_core::annuity::AmortizationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        cre_loan_core::annuity::build_amortization_schedule(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Loan sizing
// ---------------------------------------------------------------------------

#[napi]
pub fn size_loan(input_json: String) -> NapiResult<String> {
    let input: LoanSizerInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = cre_loan_core::loan_sizing::size_loan(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[derive(Deserialize)]
struct BalloonRequest {
    #[serde(flatten)]
    loan: LoanSizerInput,
    period: u32,
}

/// Outstanding balance after `period` periods, as a decimal string.
#[napi]
pub fn balloon_payment_at(input_json: String) -> NapiResult<String> {
    let request: BalloonRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let sizer = LoanSizer::new(request.loan).map_err(to_napi_error)?;
    let balloon = sizer
        .balloon_payment_at(request.period)
        .map_err(to_napi_error)?;
    Ok(balloon.to_string())
}

// ---------------------------------------------------------------------------
// Investment analysis
// ---------------------------------------------------------------------------

#[napi]
pub fn project_investment(input_json: String) -> NapiResult<String> {
    let input: cre_loan_core::investment_analysis::InvestmentInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = cre_loan_core::investment_analysis::project_investment(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
