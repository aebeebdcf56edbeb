use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::CreLoanError;
use crate::types::{Money, Rate};
use crate::CreLoanResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const MAX_NEWTON_ITERATIONS: u32 = 50;
const MAX_BISECTION_ITERATIONS: u32 = 200;

/// Bracket searched when Newton-Raphson leaves the feasible range.
const BRACKET_LOW: Rate = dec!(-0.95);
const BRACKET_HIGH: Rate = dec!(10);

/// Net present value of evenly spaced cash flows, the first at t=0.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> CreLoanResult<Money> {
    if rate <= dec!(-1) {
        return Err(CreLoanError::invalid(
            "rate",
            rate,
            "discount rate must be greater than -100%",
        ));
    }

    npv_and_slope(rate, cash_flows)
        .map(|(value, _)| value)
        .ok_or_else(|| CreLoanError::DivisionByZero {
            context: format!("NPV discount factor at rate {rate}"),
        })
}

/// Internal rate of return of evenly spaced cash flows.
///
/// Newton-Raphson from `guess`; if it stalls or leaves the decimal range the
/// root is bisected inside [-95%, 1000%]. The flows must change sign.
pub fn irr(cash_flows: &[Money], guess: Rate) -> CreLoanResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(CreLoanError::invalid(
            "cash_flows",
            cash_flows.len(),
            "IRR requires at least 2 cash flows",
        ));
    }
    let has_outflow = cash_flows.iter().any(|cf| cf.is_sign_negative() && !cf.is_zero());
    let has_inflow = cash_flows.iter().any(|cf| cf.is_sign_positive() && !cf.is_zero());
    if !(has_outflow && has_inflow) {
        return Err(CreLoanError::invalid(
            "cash_flows",
            cash_flows.len(),
            "IRR needs at least one outflow and one inflow",
        ));
    }

    let mut rate = guess;
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let Some((value, slope)) = npv_and_slope(rate, cash_flows) else {
            break;
        };
        if value.abs() < CONVERGENCE_THRESHOLD {
            return Ok(rate);
        }
        let Some(step) = value.checked_div(slope) else {
            break;
        };
        rate -= step;
        if rate <= BRACKET_LOW || rate >= BRACKET_HIGH {
            break;
        }
    }

    debug!("IRR Newton iteration did not settle from guess {guess}, bisecting");
    bisect(cash_flows)
}

fn bisect(cash_flows: &[Money]) -> CreLoanResult<Rate> {
    let failure = |iterations: u32, last_delta: Decimal| CreLoanError::ConvergenceFailure {
        function: "IRR".into(),
        iterations,
        last_delta,
    };

    let mut low = BRACKET_LOW;
    let mut high = BRACKET_HIGH;
    let value_at = |rate: Rate| npv_and_slope(rate, cash_flows).map(|(value, _)| value);

    let (Some(mut f_low), Some(f_high)) = (value_at(low), value_at(high)) else {
        return Err(failure(0, Decimal::MAX));
    };
    if f_low.is_sign_negative() == f_high.is_sign_negative() {
        // No root inside the bracket.
        return Err(failure(0, f_low));
    }

    let mut mid = low;
    let mut f_mid = f_low;
    for _ in 0..MAX_BISECTION_ITERATIONS {
        mid = (low + high) / dec!(2);
        f_mid = value_at(mid).ok_or_else(|| failure(0, Decimal::MAX))?;
        if f_mid.abs() < CONVERGENCE_THRESHOLD {
            return Ok(mid);
        }
        if f_mid.is_sign_negative() == f_low.is_sign_negative() {
            low = mid;
            f_low = f_mid;
        } else {
            high = mid;
        }
    }

    debug!("IRR bisection stopped at {mid} with residual {f_mid}");
    Err(failure(MAX_BISECTION_ITERATIONS, f_mid))
}

/// NPV and its derivative with respect to the rate, or None when a discount
/// factor leaves the decimal range.
fn npv_and_slope(rate: Rate, cash_flows: &[Money]) -> Option<(Money, Decimal)> {
    let v = Decimal::ONE.checked_div(Decimal::ONE + rate)?;
    let mut factor = Decimal::ONE;
    let mut value = Decimal::ZERO;
    let mut slope = Decimal::ZERO;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            factor = factor.checked_mul(v)?;
        }
        let term = cf.checked_mul(factor)?;
        value = value.checked_add(term)?;
        // d/dr of cf * (1 + r)^-t
        let d = Decimal::from(t as u64).checked_mul(term)?.checked_mul(v)?;
        slope = slope.checked_sub(d)?;
    }

    Some((value, slope))
}
