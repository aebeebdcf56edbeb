use log::warn;
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::{Contextual, CreLoanError};
use crate::rounding::round_currency;
use crate::types::{with_metadata, ComputationOutput, Money, PaymentTiming, Rate};
use crate::CreLoanResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A fixed-rate, fixed-term cash flow to amortize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationInput {
    /// Periodic interest rate (e.g. annual rate / 12 for monthly periods)
    pub rate: Rate,
    /// Number of payment periods
    pub periods: u32,
    /// Amount disbursed at t=0; a positive loan yields negative payments
    pub present_value: Money,
    /// Balance still owed after the last period (0 = fully amortizing)
    #[serde(default)]
    pub future_value: Money,
    /// End (ordinary annuity) or Begin (annuity-due)
    #[serde(default)]
    pub timing: PaymentTiming,
}

/// Level payment plus its per-period interest/principal split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSchedule {
    /// Level payment from the closed-form annuity formula
    pub payment: Money,
    /// Interest portion per period, index 0 = first period
    pub interest: Vec<Money>,
    /// Principal portion per period, index 0 = first period
    pub principal: Vec<Money>,
    /// Balance after the last period; always equals the future value
    pub closing_balance: Money,
}

impl PaymentSchedule {
    pub fn len(&self) -> usize {
        self.principal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principal.is_empty()
    }
}

/// One row of an amortization table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationPeriod {
    pub period: u32,
    pub opening_balance: Money,
    pub interest: Money,
    pub principal: Money,
    pub payment: Money,
    pub closing_balance: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationOutput {
    pub payment: Money,
    pub periods: Vec<AmortizationPeriod>,
    pub total_interest: Money,
    pub total_principal: Money,
    pub total_paid: Money,
    pub closing_balance: Money,
}

// ---------------------------------------------------------------------------
// Formulas
// ---------------------------------------------------------------------------

/// Interest-only payment for one period: `-present_value * rate`.
pub fn interest_only_payment(rate: Rate, present_value: Money) -> Money {
    round_currency(-present_value * rate)
}

/// Constant payment that takes `present_value` to `future_value` over
/// `periods` at a fixed `rate`.
pub fn payment(
    rate: Rate,
    periods: u32,
    present_value: Money,
    future_value: Money,
    timing: PaymentTiming,
) -> CreLoanResult<Money> {
    validate_periods(periods)?;

    let overflow = || out_of_range(rate, periods);

    if rate.is_zero() {
        let total = (-present_value)
            .checked_sub(future_value)
            .ok_or_else(overflow)?;
        return Ok(round_currency(total / Decimal::from(periods)));
    }

    let factor = compound_factor(rate, periods)?;

    let numerator = present_value
        .checked_mul(factor)
        .and_then(|grown| (-future_value).checked_sub(grown))
        .and_then(|n| n.checked_mul(rate))
        .ok_or_else(overflow)?;
    let denominator = (Decimal::ONE + rate * timing.multiplier())
        .checked_mul(factor - Decimal::ONE)
        .ok_or_else(overflow)?;

    if denominator.is_zero() {
        return Err(CreLoanError::DivisionByZero {
            context: "payment annuity factor".into(),
        });
    }
    let pmt = numerator.checked_div(denominator).ok_or_else(overflow)?;

    Ok(round_currency(pmt))
}

/// Present value of a level payment stream; the inverse of [`payment`].
pub fn present_value(
    rate: Rate,
    periods: u32,
    payment: Money,
    future_value: Money,
    timing: PaymentTiming,
) -> CreLoanResult<Money> {
    validate_periods(periods)?;

    let overflow = || out_of_range(rate, periods);

    if rate.is_zero() {
        let pv = payment
            .checked_mul(Decimal::from(periods))
            .and_then(|paid| (-future_value).checked_sub(paid))
            .ok_or_else(overflow)?;
        return Ok(round_currency(pv));
    }

    let factor = compound_factor(rate, periods)?;

    let numerator = (factor - Decimal::ONE)
        .checked_div(rate)
        .and_then(|annuity_factor| {
            (-payment)
                .checked_mul(Decimal::ONE + rate * timing.multiplier())?
                .checked_mul(annuity_factor)
        })
        .and_then(|n| n.checked_sub(future_value))
        .ok_or_else(overflow)?;

    if factor.is_zero() {
        return Err(CreLoanError::DivisionByZero {
            context: "present value discount factor".into(),
        });
    }
    let pv = numerator.checked_div(factor).ok_or_else(overflow)?;

    Ok(round_currency(pv))
}

/// Split the level payment into interest and principal for every period.
///
/// Per-period rounding to the cent drifts away from the closed-form payment,
/// so the last period is never taken from the level payment: it pays the
/// interest on, and retires, whatever capital is left. The closing balance
/// must then equal `future_value` to the cent, otherwise the schedule is
/// rejected with [`CreLoanError::Reconciliation`].
pub fn interest_and_principal_schedule(
    rate: Rate,
    periods: u32,
    present_value: Money,
    future_value: Money,
    timing: PaymentTiming,
) -> CreLoanResult<PaymentSchedule> {
    let level = payment(rate, periods, present_value, future_value, timing).context("payment")?;

    let mut interest = Vec::with_capacity(periods as usize);
    let mut principal = Vec::with_capacity(periods as usize);
    let mut capital = present_value;

    for period in 1..periods {
        // An annuity-due pays before the first period accrues anything.
        let period_interest = if timing == PaymentTiming::Begin && period == 1 {
            Decimal::ZERO
        } else {
            round_currency(-capital * rate)
        };
        let period_principal = round_currency(level - period_interest);
        capital = round_currency(capital + period_principal);

        interest.push(period_interest);
        principal.push(period_principal);
    }

    let last_interest = round_currency(-capital * rate);
    let last_principal = round_currency(-capital + future_value);
    capital = round_currency(capital + last_principal);
    interest.push(last_interest);
    principal.push(last_principal);

    // TODO: non-zero future values only reconcile when given in whole cents;
    // revisit once there are reference schedules for balloon-style targets.
    if capital != future_value {
        warn!("schedule closed at capital {capital}, expected future value {future_value}");
        return Err(CreLoanError::Reconciliation {
            field: "capital".into(),
            actual: capital,
            expected: future_value,
        });
    }

    Ok(PaymentSchedule {
        payment: level,
        interest,
        principal,
        closing_balance: capital,
    })
}

/// Principal portion of every period.
pub fn principal_schedule(
    rate: Rate,
    periods: u32,
    present_value: Money,
    future_value: Money,
    timing: PaymentTiming,
) -> CreLoanResult<Vec<Money>> {
    interest_and_principal_schedule(rate, periods, present_value, future_value, timing)
        .context("interest and principal schedule")
        .map(|s| s.principal)
}

/// Interest portion of every period.
pub fn interest_schedule(
    rate: Rate,
    periods: u32,
    present_value: Money,
    future_value: Money,
    timing: PaymentTiming,
) -> CreLoanResult<Vec<Money>> {
    interest_and_principal_schedule(rate, periods, present_value, future_value, timing)
        .context("interest and principal schedule")
        .map(|s| s.interest)
}

// ---------------------------------------------------------------------------
// Amortization table
// ---------------------------------------------------------------------------

/// Build a period-by-period amortization table with opening and closing
/// balances.
pub fn build_amortization_schedule(
    input: &AmortizationInput,
) -> CreLoanResult<ComputationOutput<AmortizationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if !input.future_value.is_zero() {
        warnings.push(format!(
            "Future value {} is non-zero; last-period reconciliation is only verified for fully amortizing schedules",
            input.future_value
        ));
    }
    if input.rate < Decimal::ZERO {
        warnings.push(format!("Periodic rate {} is negative", input.rate));
    }

    let schedule = interest_and_principal_schedule(
        input.rate,
        input.periods,
        input.present_value,
        input.future_value,
        input.timing,
    )?;

    let mut periods = Vec::with_capacity(schedule.len());
    let mut balance = input.present_value;
    for (i, (interest, principal)) in schedule
        .interest
        .iter()
        .zip(schedule.principal.iter())
        .enumerate()
    {
        let opening_balance = balance;
        balance = round_currency(balance + principal);
        periods.push(AmortizationPeriod {
            period: i as u32 + 1,
            opening_balance,
            interest: *interest,
            principal: *principal,
            payment: round_currency(interest + principal),
            closing_balance: balance,
        });
    }

    let total_interest: Money = schedule.interest.iter().copied().sum();
    let total_principal: Money = schedule.principal.iter().copied().sum();

    let output = AmortizationOutput {
        payment: schedule.payment,
        periods,
        total_interest,
        total_principal,
        total_paid: total_interest + total_principal,
        closing_balance: schedule.closing_balance,
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Level-payment amortization with last-period reconciliation",
        input,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_periods(periods: u32) -> CreLoanResult<()> {
    if periods == 0 {
        return Err(CreLoanError::invalid(
            "periods",
            periods,
            "must be greater than 0",
        ));
    }
    Ok(())
}

/// `(1 + rate)^periods`, refusing to overflow the decimal range.
fn compound_factor(rate: Rate, periods: u32) -> CreLoanResult<Decimal> {
    (Decimal::ONE + rate)
        .checked_powi(i64::from(periods))
        .ok_or_else(|| out_of_range(rate, periods))
}

/// Compounding over `periods` at `rate` pushes the annuity out of the decimal range.
fn out_of_range(rate: Rate, periods: u32) -> CreLoanError {
    CreLoanError::invalid(
        "periods",
        periods,
        format!("compounding at {rate} over {periods} periods exceeds the decimal range"),
    )
}
