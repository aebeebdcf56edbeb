use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter;
use std::time::Instant;

use crate::annuity::{
    interest_and_principal_schedule, interest_only_payment, payment, present_value,
    principal_schedule,
};
use crate::error::{Contextual, CreLoanError};
use crate::rounding::{round_currency, round_rate};
use crate::types::{with_metadata, ComputationOutput, Money, PaymentTiming, Rate};
use crate::CreLoanResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Underwriting terms for sizing a commercial real-estate loan.
///
/// All period counts and the rate share one period length (months or years).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanSizerInput {
    /// Maximum loan-to-value ratio (0 to 1)
    pub max_ltv: Rate,
    /// Minimum debt service coverage ratio (>= 1.0)
    pub min_dscr: Decimal,
    /// Length of the amortization schedule in periods
    pub amortization_periods: u32,
    /// Contractual term in periods; the balance left at term is the balloon
    pub term_periods: u32,
    /// Leading interest-only periods within the term
    #[serde(default)]
    pub io_periods: u32,
    /// Periodic interest rate (0 to 1)
    pub rate: Rate,
    /// Appraised property value
    pub property_value: Money,
    /// Net operating income per period, the DSCR payment capacity
    pub noi: Money,
    /// Amount asked for by the borrower; 0 means the property value
    #[serde(default)]
    pub requested_loan_amount: Money,
    /// Origination fee as a fraction of the loan amount
    #[serde(default)]
    pub origination_fee_rate: Rate,
}

/// Which underwriting constraint set the maximum loan amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingConstraint {
    Ltv,
    Dscr,
    Requested,
}

impl fmt::Display for BindingConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingConstraint::Ltv => write!(f, "LTV"),
            BindingConstraint::Dscr => write!(f, "DSCR"),
            BindingConstraint::Requested => write!(f, "requested amount"),
        }
    }
}

/// The three candidate loan amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingConstraints {
    /// floor(max_ltv * property_value)
    pub ltv_amount: Money,
    /// floor(PV of NOI / min_dscr over the amortization)
    pub dscr_amount: Money,
    /// Requested amount, or the property value when none was requested
    pub requested_amount: Money,
    /// The most restrictive of the three (ties resolve LTV, DSCR, requested)
    pub binding: BindingConstraint,
}

impl SizingConstraints {
    pub fn maximum_loan_amount(&self) -> Money {
        match self.binding {
            BindingConstraint::Ltv => self.ltv_amount,
            BindingConstraint::Dscr => self.dscr_amount,
            BindingConstraint::Requested => self.requested_amount,
        }
    }
}

/// Principal and interest per period over the contractual term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDistribution {
    pub principal: Vec<Money>,
    pub interest: Vec<Money>,
}

impl PaymentDistribution {
    pub fn len(&self) -> usize {
        self.principal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principal.is_empty()
    }

    /// Principal plus interest for each period.
    pub fn debt_service(&self) -> Vec<Money> {
        self.principal
            .iter()
            .zip(self.interest.iter())
            .map(|(p, i)| round_currency(p + i))
            .collect()
    }
}

/// One-shot sizing report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanSizingOutput {
    pub constraints: SizingConstraints,
    pub maximum_loan_amount: Money,
    /// Payment during the interest-only window
    pub io_payment: Money,
    /// Level amortizing payment
    pub loan_payment: Money,
    pub origination_fee: Money,
    pub payment_distribution: PaymentDistribution,
    /// Outstanding balance due at the end of the term
    pub balloon_payment: Money,
    /// Achieved loan-to-value (None without a property value)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_to_value: Option<Rate>,
    /// Achieved coverage on the amortizing payment (None when it is zero)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debt_service_coverage: Option<Decimal>,
}

/// A validated set of loan terms. Only obtainable through [`LoanSizer::new`].
#[derive(Debug, Clone, Serialize)]
pub struct LoanSizer {
    input: LoanSizerInput,
}

// ---------------------------------------------------------------------------
// Sizing
// ---------------------------------------------------------------------------

impl LoanSizer {
    pub fn new(input: LoanSizerInput) -> CreLoanResult<Self> {
        validate_input(&input)?;
        Ok(LoanSizer { input })
    }

    pub fn input(&self) -> &LoanSizerInput {
        &self.input
    }

    /// Largest loan the LTV ceiling allows.
    pub fn ltv_constrained_amount(&self) -> Money {
        (self.input.max_ltv * self.input.property_value).floor()
    }

    /// Largest loan whose level payment NOI covers at the minimum DSCR.
    pub fn dscr_constrained_amount(&self) -> CreLoanResult<Money> {
        let target_payment = -self.input.noi / self.input.min_dscr;
        let amount = present_value(
            self.input.rate,
            self.input.amortization_periods,
            target_payment,
            Decimal::ZERO,
            PaymentTiming::End,
        )
        .context("present value")?;
        Ok(amount.floor())
    }

    /// The borrower's request. No request (0) caps the loan at the property
    /// value rather than sizing it to zero.
    pub fn requested_amount(&self) -> Money {
        if self.input.requested_loan_amount.is_zero() {
            self.input.property_value
        } else {
            self.input.requested_loan_amount
        }
    }

    pub fn constraints(&self) -> CreLoanResult<SizingConstraints> {
        let ltv_amount = self.ltv_constrained_amount();
        let dscr_amount = self
            .dscr_constrained_amount()
            .context("dscr constrained amount")?;
        let requested_amount = self.requested_amount();

        let binding = if ltv_amount <= dscr_amount && ltv_amount <= requested_amount {
            BindingConstraint::Ltv
        } else if dscr_amount <= requested_amount {
            BindingConstraint::Dscr
        } else {
            BindingConstraint::Requested
        };

        debug!(
            "sizing candidates ltv={ltv_amount} dscr={dscr_amount} requested={requested_amount}, {binding} binds"
        );

        Ok(SizingConstraints {
            ltv_amount,
            dscr_amount,
            requested_amount,
            binding,
        })
    }

    /// The minimum of the LTV, DSCR and requested candidates.
    pub fn maximum_loan_amount(&self) -> CreLoanResult<Money> {
        Ok(self.constraints()?.maximum_loan_amount())
    }

    pub fn origination_fee(&self) -> CreLoanResult<Money> {
        let loan_amount = self.maximum_loan_amount()?;
        Ok(round_currency(self.input.origination_fee_rate * loan_amount))
    }

    /// Payment during the interest-only window.
    pub fn io_payment(&self) -> CreLoanResult<Money> {
        let loan_amount = self.maximum_loan_amount().context("maximum loan amount")?;
        Ok(interest_only_payment(self.input.rate, loan_amount))
    }

    /// Level amortizing payment on the maximum loan amount.
    pub fn loan_payment(&self) -> CreLoanResult<Money> {
        let loan_amount = self.maximum_loan_amount().context("maximum loan amount")?;
        payment(
            self.input.rate,
            self.input.amortization_periods,
            loan_amount,
            Decimal::ZERO,
            PaymentTiming::End,
        )
        .context("payment")
    }

    /// Principal and interest per period over the term.
    ///
    /// The schedule runs over the full amortization; the interest-only
    /// window is spliced in front of it and everything past the term is
    /// dropped, since that remainder is the balloon.
    pub fn payment_distribution(&self) -> CreLoanResult<PaymentDistribution> {
        let loan_amount = self.maximum_loan_amount().context("maximum loan amount")?;
        let schedule = interest_and_principal_schedule(
            self.input.rate,
            self.input.amortization_periods,
            loan_amount,
            Decimal::ZERO,
            PaymentTiming::End,
        )
        .context("interest and principal schedule")?;

        let io_periods = self.input.io_periods as usize;
        let term = self.input.term_periods as usize;
        let io_payment = interest_only_payment(self.input.rate, loan_amount);

        let principal = iter::repeat(Decimal::ZERO)
            .take(io_periods)
            .chain(schedule.principal)
            .take(term)
            .collect();
        let interest = iter::repeat(io_payment)
            .take(io_periods)
            .chain(schedule.interest)
            .take(term)
            .collect();

        Ok(PaymentDistribution {
            principal,
            interest,
        })
    }

    /// Balance owed at the end of the term, due as a lump sum.
    pub fn balloon_payment(&self) -> CreLoanResult<Money> {
        self.balloon_payment_at(self.input.term_periods)
    }

    /// Balance owed after `period` periods, e.g. at a sale before maturity.
    pub fn balloon_payment_at(&self, period: u32) -> CreLoanResult<Money> {
        if period > self.input.term_periods {
            return Err(CreLoanError::invalid(
                "period",
                period,
                format!(
                    "cannot exceed term_periods ({})",
                    self.input.term_periods
                ),
            ));
        }

        let loan_amount = self.maximum_loan_amount().context("maximum loan amount")?;
        let principal = self.io_adjusted_principal(loan_amount)?;

        let repaid: Money = principal.iter().take(period as usize).copied().sum();
        Ok(round_currency(loan_amount + repaid))
    }

    /// Amortizing principal with zero entries for the interest-only window.
    fn io_adjusted_principal(&self, loan_amount: Money) -> CreLoanResult<Vec<Money>> {
        let amortizing = principal_schedule(
            self.input.rate,
            self.input.amortization_periods,
            loan_amount,
            Decimal::ZERO,
            PaymentTiming::End,
        )
        .context("principal schedule")?;

        let io_periods = self.input.io_periods as usize;
        let mut principal = Vec::with_capacity(io_periods + amortizing.len());
        principal.resize(io_periods, Decimal::ZERO);
        principal.extend(amortizing);
        Ok(principal)
    }
}

/// Size a loan and report every derived figure in one envelope.
pub fn size_loan(input: &LoanSizerInput) -> CreLoanResult<ComputationOutput<LoanSizingOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let sizer = LoanSizer::new(input.clone())?;

    let constraints = sizer.constraints().context("constraints")?;
    let maximum_loan_amount = constraints.maximum_loan_amount();
    let io_payment = sizer.io_payment().context("io payment")?;
    let loan_payment = sizer.loan_payment().context("loan payment")?;
    let origination_fee = sizer.origination_fee().context("origination fee")?;
    let payment_distribution = sizer
        .payment_distribution()
        .context("payment distribution")?;
    let balloon_payment = sizer.balloon_payment().context("balloon payment")?;

    let loan_to_value = if input.property_value > Decimal::ZERO {
        Some(round_rate(maximum_loan_amount / input.property_value))
    } else {
        None
    };
    let debt_service_coverage = if loan_payment.is_zero() {
        None
    } else {
        Some(round_rate(input.noi / loan_payment.abs()))
    };

    // --- Warnings ---
    if maximum_loan_amount.is_zero() {
        warnings.push("Maximum loan amount is zero; check property value and NOI".into());
    } else if !input.requested_loan_amount.is_zero()
        && constraints.binding != BindingConstraint::Requested
        && maximum_loan_amount < constraints.requested_amount
    {
        warnings.push(format!(
            "Requested {} reduced to {} by the {} constraint",
            constraints.requested_amount, maximum_loan_amount, constraints.binding
        ));
    }

    if input.io_periods > 0 && input.io_periods == input.term_periods {
        warnings.push("Interest-only window covers the whole term; no principal amortizes".into());
    }

    if !maximum_loan_amount.is_zero() && balloon_payment / maximum_loan_amount > dec!(0.5) {
        warnings.push(format!(
            "Balloon of {} is {:.1}% of the loan amount: refinancing risk at maturity",
            balloon_payment,
            balloon_payment / maximum_loan_amount * dec!(100)
        ));
    }

    let output = LoanSizingOutput {
        constraints,
        maximum_loan_amount,
        io_payment,
        loan_payment,
        origination_fee,
        payment_distribution,
        balloon_payment,
        loan_to_value,
        debt_service_coverage,
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "CRE loan sizing (min of LTV, DSCR and requested amount)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_input(input: &LoanSizerInput) -> CreLoanResult<()> {
    if input.max_ltv < Decimal::ZERO || input.max_ltv > Decimal::ONE {
        return Err(CreLoanError::invalid(
            "max_ltv",
            input.max_ltv,
            "must be between 0 and 1",
        ));
    }

    if input.min_dscr < Decimal::ONE {
        return Err(CreLoanError::invalid(
            "min_dscr",
            input.min_dscr,
            "must be at least 1.0",
        ));
    }

    if input.amortization_periods == 0 {
        return Err(CreLoanError::invalid(
            "amortization_periods",
            input.amortization_periods,
            "must be greater than 0",
        ));
    }

    if input.term_periods == 0 {
        return Err(CreLoanError::invalid(
            "term_periods",
            input.term_periods,
            "must be greater than 0",
        ));
    }

    if input.term_periods > input.amortization_periods {
        return Err(CreLoanError::invalid(
            "term_periods",
            input.term_periods,
            format!(
                "cannot exceed amortization_periods ({})",
                input.amortization_periods
            ),
        ));
    }

    if input.io_periods > input.term_periods {
        return Err(CreLoanError::invalid(
            "io_periods",
            input.io_periods,
            format!("cannot exceed term_periods ({})", input.term_periods),
        ));
    }

    if input.rate < Decimal::ZERO || input.rate > Decimal::ONE {
        return Err(CreLoanError::invalid(
            "rate",
            input.rate,
            "must be between 0 and 1",
        ));
    }

    if input.property_value < Decimal::ZERO {
        return Err(CreLoanError::invalid(
            "property_value",
            input.property_value,
            "cannot be negative",
        ));
    }

    if input.noi < Decimal::ZERO {
        return Err(CreLoanError::invalid(
            "noi",
            input.noi,
            "cannot be negative",
        ));
    }

    if input.requested_loan_amount < Decimal::ZERO {
        return Err(CreLoanError::invalid(
            "requested_loan_amount",
            input.requested_loan_amount,
            "cannot be negative",
        ));
    }

    if input.origination_fee_rate < Decimal::ZERO || input.origination_fee_rate > Decimal::ONE {
        return Err(CreLoanError::invalid(
            "origination_fee_rate",
            input.origination_fee_rate,
            "must be between 0 and 1",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rust_decimal_macros::dec;

    fn sample_input() -> LoanSizerInput {
        LoanSizerInput {
            max_ltv: dec!(0.70),
            min_dscr: dec!(1.40),
            amortization_periods: 30,
            term_periods: 10,
            io_periods: 3,
            rate: dec!(0.0045),
            property_value: dec!(1000),
            noi: dec!(500),
            requested_loan_amount: dec!(900),
            origination_fee_rate: dec!(0.001),
        }
    }

    fn sizer(input: LoanSizerInput) -> LoanSizer {
        LoanSizer::new(input).unwrap()
    }

    // --- Validation ---

    #[test]
    fn test_rejects_ltv_above_one() {
        let mut input = sample_input();
        input.max_ltv = dec!(1.2);
        let err = LoanSizer::new(input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.field(), Some("max_ltv"));
    }

    #[test]
    fn test_rejects_dscr_below_one() {
        let mut input = sample_input();
        input.min_dscr = dec!(0.9);
        assert_eq!(LoanSizer::new(input).unwrap_err().field(), Some("min_dscr"));
    }

    #[test]
    fn test_rejects_term_beyond_amortization() {
        let mut input = sample_input();
        input.term_periods = 31;
        assert_eq!(
            LoanSizer::new(input).unwrap_err().field(),
            Some("term_periods")
        );
    }

    #[test]
    fn test_rejects_io_beyond_term() {
        let mut input = sample_input();
        input.io_periods = 11;
        assert_eq!(LoanSizer::new(input).unwrap_err().field(), Some("io_periods"));
    }

    #[test]
    fn test_rejects_negative_amounts() {
        let mut input = sample_input();
        input.property_value = dec!(-1);
        assert_eq!(
            LoanSizer::new(input).unwrap_err().field(),
            Some("property_value")
        );

        let mut input = sample_input();
        input.requested_loan_amount = dec!(-5);
        assert_eq!(
            LoanSizer::new(input).unwrap_err().field(),
            Some("requested_loan_amount")
        );
    }

    #[test]
    fn test_rejects_zero_amortization() {
        let mut input = sample_input();
        input.amortization_periods = 0;
        input.term_periods = 0;
        input.io_periods = 0;
        assert_eq!(
            LoanSizer::new(input).unwrap_err().field(),
            Some("amortization_periods")
        );
    }

    // --- Candidates ---

    #[test]
    fn test_ltv_binds() {
        let s = sizer(sample_input());
        let c = s.constraints().unwrap();
        assert_eq!(c.ltv_amount, dec!(700));
        assert_eq!(c.dscr_amount, dec!(10001));
        assert_eq!(c.requested_amount, dec!(900));
        assert_eq!(c.binding, BindingConstraint::Ltv);
        assert_eq!(s.maximum_loan_amount().unwrap(), dec!(700));
    }

    #[test]
    fn test_dscr_binds() {
        let mut input = sample_input();
        input.noi = dec!(10);
        let c = sizer(input).constraints().unwrap();
        assert_eq!(c.dscr_amount, dec!(200));
        assert_eq!(c.binding, BindingConstraint::Dscr);
    }

    #[test]
    fn test_requested_binds() {
        let mut input = sample_input();
        input.noi = dec!(400);
        input.requested_loan_amount = dec!(400);
        let s = sizer(input);
        assert_eq!(s.constraints().unwrap().binding, BindingConstraint::Requested);
        assert_eq!(s.maximum_loan_amount().unwrap(), dec!(400));
    }

    #[test]
    fn test_zero_request_falls_back_to_property_value() {
        let mut input = sample_input();
        input.requested_loan_amount = dec!(0);
        input.max_ltv = dec!(1);
        input.noi = dec!(5000);
        let s = sizer(input);
        assert_eq!(s.requested_amount(), dec!(1000));
        assert_eq!(s.maximum_loan_amount().unwrap(), dec!(1000));
    }

    #[test]
    fn test_zero_request_is_not_a_zero_loan() {
        let mut input = sample_input();
        input.requested_loan_amount = dec!(0);
        let s = sizer(input.clone());
        let c = s.constraints().unwrap();
        assert_eq!(c.requested_amount, dec!(1000));
        assert_eq!(c.binding, BindingConstraint::Ltv);
        assert_eq!(s.maximum_loan_amount().unwrap(), dec!(700));

        // Nothing was requested, so nothing was cut.
        let out = size_loan(&input).unwrap();
        assert!(out.warnings.iter().all(|w| !w.starts_with("Requested")));
    }

    #[test]
    fn test_dscr_amount_beyond_decimal_range_is_an_error() {
        let mut input = sample_input();
        input.rate = dec!(0.5);
        input.amortization_periods = 150;
        let s = sizer(input);
        let err = s.maximum_loan_amount().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.field(), Some("periods"));
        assert!(s.balloon_payment().is_err());
    }

    #[test]
    fn test_zero_values_size_to_zero() {
        let mut input = sample_input();
        input.property_value = dec!(0);
        input.noi = dec!(0);
        input.requested_loan_amount = dec!(0);
        let s = sizer(input);
        assert_eq!(s.maximum_loan_amount().unwrap(), dec!(0));
        assert_eq!(s.io_payment().unwrap(), dec!(0));
        assert_eq!(s.loan_payment().unwrap(), dec!(0));
        assert_eq!(s.balloon_payment().unwrap(), dec!(0));
    }

    // --- Payments ---

    #[test]
    fn test_payments() {
        let s = sizer(sample_input());
        assert_eq!(s.io_payment().unwrap(), dec!(-3.15));
        assert_eq!(s.loan_payment().unwrap(), dec!(-25));
        assert_eq!(s.origination_fee().unwrap(), dec!(0.70));
    }

    #[test]
    fn test_payment_distribution_splices_io_window() {
        let d = sizer(sample_input()).payment_distribution().unwrap();
        assert_eq!(
            d.principal,
            vec![
                dec!(0),
                dec!(0),
                dec!(0),
                dec!(-21.85),
                dec!(-21.95),
                dec!(-22.05),
                dec!(-22.15),
                dec!(-22.25),
                dec!(-22.35),
                dec!(-22.45),
            ]
        );
        assert_eq!(&d.interest[..4], &[dec!(-3.15); 4]);
        assert_eq!(d.interest[4], dec!(-3.05));
        assert_eq!(d.interest[9], dec!(-2.55));
        assert_eq!(d.debt_service()[3], dec!(-25.00));
    }

    #[test]
    fn test_balloon_payment() {
        let s = sizer(sample_input());
        assert_eq!(s.balloon_payment().unwrap(), dec!(544.95));
        assert_eq!(s.balloon_payment_at(10).unwrap(), dec!(544.95));
        assert_eq!(s.balloon_payment_at(3).unwrap(), dec!(700));
        assert_eq!(s.balloon_payment_at(0).unwrap(), dec!(700));
    }

    #[test]
    fn test_balloon_without_io() {
        let mut input = sample_input();
        input.io_periods = 0;
        input.noi = dec!(250);
        assert_eq!(sizer(input).balloon_payment().unwrap(), dec!(477));
    }

    #[test]
    fn test_balloon_beyond_term_rejected() {
        let err = sizer(sample_input()).balloon_payment_at(11).unwrap_err();
        assert_eq!(err.field(), Some("period"));
    }

    #[test]
    fn test_size_loan_report() {
        let out = size_loan(&sample_input()).unwrap();
        let r = &out.result;
        assert_eq!(r.maximum_loan_amount, dec!(700));
        assert_eq!(r.balloon_payment, dec!(544.95));
        assert_eq!(r.loan_to_value, Some(dec!(0.7)));
        assert_eq!(r.payment_distribution.len(), 10);
        // 900 requested, cut to 700 by LTV; balloon is ~78% of the loan.
        assert_eq!(out.warnings.len(), 2);
    }
}
