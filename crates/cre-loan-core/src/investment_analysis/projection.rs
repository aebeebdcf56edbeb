use log::{debug, warn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::{Contextual, CreLoanError};
use crate::loan_sizing::LoanSizer;
use crate::rounding::{round_currency, round_rate};
use crate::time_value::irr;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::CreLoanResult;

use super::assumptions::{DealInformation, InvestmentInput};

/// Going-in cap rate tolerance against the implied year-1 cap rate.
const CAP_RATE_TOLERANCE: Decimal = dec!(0.005);
const IRR_GUESS: Decimal = dec!(0.10);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One holding year. Outflows are negative, inflows positive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionYear {
    pub year: u32,
    pub revenue: Money,
    pub operating_expenses: Money,
    pub noi: Money,
    pub capital_reserves: Money,
    pub principal_payment: Money,
    pub interest_payment: Money,
    pub debt_service: Money,
    pub cash_flow_after_debt_service: Money,
    pub depreciation_expense: Money,
    pub income_tax: Money,
    /// Income tax as a share of cash flow after debt service
    pub implied_income_tax_rate: Rate,
    pub net_cash_flow: Money,
    pub cash_on_cash_return: Rate,
}

/// Exit at the end of the sale year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleProceeds {
    pub sale_year: u32,
    /// NOI of the year after the sale, capitalized into the price
    pub forward_noi: Money,
    pub sale_price: Money,
    pub capital_gain: Money,
    pub capital_gains_tax: Money,
    pub accumulated_depreciation: Money,
    pub depreciation_recapture_tax: Money,
    /// Outstanding loan balance repaid from the sale
    pub loan_payoff: Money,
    pub net_sale_proceeds: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnMetrics {
    /// None when the solver does not converge
    pub irr: Option<Rate>,
    pub equity_multiple: Decimal,
    pub average_cash_on_cash_return: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestmentProjection {
    pub maximum_loan_amount: Money,
    pub origination_fee: Money,
    /// Equity put in at closing (negative)
    pub acquisition_cost: Money,
    pub years: Vec<ProjectionYear>,
    pub sale: SaleProceeds,
    /// Year-0 equity followed by each year's net cash flow, sale included
    pub cash_flows: Vec<Money>,
    pub returns: ReturnMetrics,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Equity needed at closing: purchase, closing costs and fee, less loan
/// proceeds. Negative means the investor pays in.
pub fn acquisition_cost(deal: &DealInformation, sizer: &LoanSizer) -> CreLoanResult<Money> {
    let loan_amount = sizer.maximum_loan_amount().context("maximum loan amount")?;
    let fee = sizer.origination_fee().context("origination fee")?;
    Ok(round_currency(
        -deal.purchase_price - deal.closing_and_renovations - fee + loan_amount,
    ))
}

/// Net cash flow over the equity invested.
pub fn cash_on_cash_return(net_cash_flow: Money, acquisition_cost: Money) -> CreLoanResult<Rate> {
    let ratio = net_cash_flow
        .checked_div(acquisition_cost)
        .ok_or_else(|| CreLoanError::DivisionByZero {
            context: "cash-on-cash return (acquisition cost is zero)".into(),
        })?;
    Ok(round_rate(ratio.abs()))
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Project yearly cash flows through the sale and compute the equity returns.
pub fn project_investment(
    input: &InvestmentInput,
) -> CreLoanResult<ComputationOutput<InvestmentProjection>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let sizer = LoanSizer::new(input.loan.clone()).context("loan")?;
    validate_input(input, &sizer)?;

    let deal = &input.deal;
    let tax = &input.tax;
    let sale_year = input.sale.sale_year;

    let maximum_loan_amount = sizer.maximum_loan_amount().context("maximum loan amount")?;
    let origination_fee = sizer.origination_fee().context("origination fee")?;
    let equity = acquisition_cost(deal, &sizer).context("acquisition cost")?;
    let distribution = sizer
        .payment_distribution()
        .context("payment distribution")?;
    let depreciation = tax.annual_depreciation(deal.purchase_price);

    if let (Some(going_in), Some(implied)) = (deal.going_in_cap_rate, deal.implied_cap_rate()) {
        if (going_in - implied).abs() > CAP_RATE_TOLERANCE {
            warnings.push(format!(
                "Going-in cap rate {} differs from implied year-1 cap rate {}",
                going_in,
                round_rate(implied)
            ));
        }
    }
    if maximum_loan_amount > deal.total_cost() {
        warnings.push(format!(
            "Loan of {} exceeds purchase and closing costs of {}",
            maximum_loan_amount,
            deal.total_cost()
        ));
    }

    let mut revenue = deal.initial_revenue;
    let mut expenses = deal.initial_operating_expenses;
    let mut reserves = deal.initial_capital_reserves;
    let mut accumulated_depreciation = Decimal::ZERO;
    let mut years = Vec::with_capacity(sale_year as usize);

    for (idx, (principal, interest)) in distribution
        .principal
        .iter()
        .zip(distribution.interest.iter())
        .take(sale_year as usize)
        .enumerate()
    {
        let year = idx as u32 + 1;
        let noi = round_currency(revenue - expenses);
        let debt_service = round_currency(principal + interest);
        let cfads = round_currency(noi - reserves + debt_service);

        let depreciation_expense = if idx < tax.depreciation_years as usize {
            depreciation
        } else {
            Decimal::ZERO
        };
        accumulated_depreciation += depreciation_expense;

        let income_tax =
            round_currency(-(noi + interest + depreciation_expense) * tax.income_tax_rate);
        let implied_income_tax_rate = if cfads.is_zero() {
            Decimal::ZERO
        } else {
            round_rate((income_tax / cfads).abs())
        };
        let net_cash_flow = round_currency(cfads + income_tax);
        let coc = cash_on_cash_return(net_cash_flow, equity)
            .context(&format!("cash-on-cash return, year {year}"))?;

        if cfads < Decimal::ZERO {
            warnings.push(format!(
                "Year {year}: cash flow after debt service is negative ({cfads})"
            ));
        }

        debug!("year {year}: noi={noi} cfads={cfads} tax={income_tax} ncf={net_cash_flow}");

        years.push(ProjectionYear {
            year,
            revenue,
            operating_expenses: expenses,
            noi,
            capital_reserves: reserves,
            principal_payment: *principal,
            interest_payment: *interest,
            debt_service,
            cash_flow_after_debt_service: cfads,
            depreciation_expense,
            income_tax,
            implied_income_tax_rate,
            net_cash_flow,
            cash_on_cash_return: coc,
        });

        revenue = round_currency(revenue + revenue * deal.revenue_growth);
        expenses = round_currency(expenses + expenses * deal.operating_expenses_growth);
        reserves = round_currency(reserves + reserves * deal.capital_reserves_growth);
    }

    // --- Sale ---
    let forward_noi = round_currency(revenue - expenses);
    let sale_price = input.sale.projected_sale_price(forward_noi);
    let capital_gain = round_currency(sale_price - deal.total_cost());
    let capital_gains_tax = if capital_gain > Decimal::ZERO {
        round_currency(-capital_gain * tax.capital_gains_tax_rate)
    } else {
        Decimal::ZERO
    };
    let depreciation_recapture_tax =
        round_currency(accumulated_depreciation * tax.depreciation_recapture_tax_rate);
    let loan_payoff = sizer
        .balloon_payment_at(sale_year)
        .context("loan payoff")?;
    let net_sale_proceeds =
        round_currency(sale_price + capital_gains_tax + depreciation_recapture_tax - loan_payoff);

    let sale = SaleProceeds {
        sale_year,
        forward_noi,
        sale_price,
        capital_gain,
        capital_gains_tax,
        accumulated_depreciation,
        depreciation_recapture_tax,
        loan_payoff,
        net_sale_proceeds,
    };

    // --- Returns ---
    let mut cash_flows: Vec<Money> = Vec::with_capacity(years.len() + 1);
    cash_flows.push(equity);
    cash_flows.extend(years.iter().map(|y| y.net_cash_flow));
    if let Some(last) = cash_flows.last_mut() {
        *last = round_currency(*last + net_sale_proceeds);
    }

    let irr = match irr(&cash_flows, IRR_GUESS) {
        Ok(rate) => Some(round_rate(rate)),
        Err(e) => {
            warn!("IRR did not resolve: {e}");
            warnings.push(format!("IRR could not be computed: {e}"));
            None
        }
    };

    let distributions: Money = cash_flows.iter().skip(1).copied().sum();
    let equity_multiple = distributions
        .checked_div(equity.abs())
        .map(round_rate)
        .ok_or_else(|| CreLoanError::DivisionByZero {
            context: "equity multiple (acquisition cost is zero)".into(),
        })?;
    let average_cash_on_cash_return = if years.is_empty() {
        Decimal::ZERO
    } else {
        let total: Decimal = years.iter().map(|y| y.cash_on_cash_return).sum();
        round_rate(total / Decimal::from(years.len() as u64))
    };

    let output = InvestmentProjection {
        maximum_loan_amount,
        origination_fee,
        acquisition_cost: equity,
        years,
        sale,
        cash_flows,
        returns: ReturnMetrics {
            irr,
            equity_multiple,
            average_cash_on_cash_return,
        },
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Levered CRE cash flow projection with after-tax sale proceeds",
        input,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_input(input: &InvestmentInput, sizer: &LoanSizer) -> CreLoanResult<()> {
    let tax = &input.tax;
    let deal = &input.deal;
    let sale = &input.sale;

    if tax.land_value_ratio < Decimal::ZERO || tax.land_value_ratio >= Decimal::ONE {
        return Err(CreLoanError::invalid(
            "land_value_ratio",
            tax.land_value_ratio,
            "must be in [0, 1)",
        ));
    }
    if tax.depreciation_years == 0 {
        return Err(CreLoanError::invalid(
            "depreciation_years",
            tax.depreciation_years,
            "must be at least 1",
        ));
    }
    for (field, value) in [
        ("income_tax_rate", tax.income_tax_rate),
        ("capital_gains_tax_rate", tax.capital_gains_tax_rate),
        (
            "depreciation_recapture_tax_rate",
            tax.depreciation_recapture_tax_rate,
        ),
    ] {
        if value < Decimal::ZERO || value > Decimal::ONE {
            return Err(CreLoanError::invalid(field, value, "must be between 0 and 1"));
        }
    }

    if deal.purchase_price <= Decimal::ZERO {
        return Err(CreLoanError::invalid(
            "purchase_price",
            deal.purchase_price,
            "must be positive",
        ));
    }
    for (field, value) in [
        ("closing_and_renovations", deal.closing_and_renovations),
        ("initial_revenue", deal.initial_revenue),
        ("initial_operating_expenses", deal.initial_operating_expenses),
        ("initial_capital_reserves", deal.initial_capital_reserves),
    ] {
        if value < Decimal::ZERO {
            return Err(CreLoanError::invalid(field, value, "cannot be negative"));
        }
    }

    if sale.exit_cap_rate <= Decimal::ZERO {
        return Err(CreLoanError::invalid(
            "exit_cap_rate",
            sale.exit_cap_rate,
            "must be positive",
        ));
    }
    if sale.cost_of_sale < Decimal::ZERO || sale.cost_of_sale >= Decimal::ONE {
        return Err(CreLoanError::invalid(
            "cost_of_sale",
            sale.cost_of_sale,
            "must be in [0, 1)",
        ));
    }
    let term = sizer.input().term_periods;
    if sale.sale_year == 0 || sale.sale_year > term {
        return Err(CreLoanError::invalid(
            "sale_year",
            sale.sale_year,
            format!("must be between 1 and the loan term ({term})"),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::investment_analysis::{SaleTerms, TaxAssumptions};
    use crate::loan_sizing::LoanSizerInput;
    use rust_decimal_macros::dec;

    fn sample_input() -> InvestmentInput {
        InvestmentInput {
            tax: TaxAssumptions {
                land_value_ratio: dec!(0.2),
                depreciation_years: 39,
                income_tax_rate: dec!(0.35),
                capital_gains_tax_rate: dec!(0.20),
                depreciation_recapture_tax_rate: dec!(0.25),
            },
            deal: DealInformation {
                purchase_price: dec!(1000000),
                closing_and_renovations: dec!(50000),
                going_in_cap_rate: Some(dec!(0.10)),
                initial_revenue: dec!(150000),
                initial_operating_expenses: dec!(50000),
                initial_capital_reserves: dec!(5000),
                revenue_growth: dec!(0.03),
                operating_expenses_growth: dec!(0.02),
                capital_reserves_growth: dec!(0.02),
            },
            loan: LoanSizerInput {
                max_ltv: dec!(0.70),
                min_dscr: dec!(1.25),
                amortization_periods: 30,
                term_periods: 10,
                io_periods: 2,
                rate: dec!(0.06),
                property_value: dec!(1000000),
                noi: dec!(100000),
                requested_loan_amount: dec!(0),
                origination_fee_rate: dec!(0.01),
            },
            sale: SaleTerms {
                exit_cap_rate: dec!(0.07),
                cost_of_sale: dec!(0.02),
                sale_year: 5,
            },
        }
    }

    #[test]
    fn test_acquisition_cost() {
        let input = sample_input();
        let sizer = LoanSizer::new(input.loan.clone()).unwrap();
        // -1,000,000 - 50,000 - 7,000 fee + 700,000 loan
        assert_eq!(acquisition_cost(&input.deal, &sizer).unwrap(), dec!(-357000));
    }

    #[test]
    fn test_cash_on_cash_zero_basis() {
        let err = cash_on_cash_return(dec!(100), dec!(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Numeric);
    }

    #[test]
    fn test_first_year_cash_flows() {
        let out = project_investment(&sample_input()).unwrap();
        let y1 = &out.result.years[0];
        assert_eq!(y1.noi, dec!(100000));
        assert_eq!(y1.principal_payment, dec!(0));
        assert_eq!(y1.interest_payment, dec!(-42000));
        assert_eq!(y1.cash_flow_after_debt_service, dec!(53000));
        assert_eq!(y1.depreciation_expense, dec!(-20512.82));
        assert_eq!(y1.income_tax, dec!(-13120.51));
        assert_eq!(y1.implied_income_tax_rate, dec!(0.2476));
        assert_eq!(y1.net_cash_flow, dec!(39879.49));
        assert_eq!(y1.cash_on_cash_return, dec!(0.1117));
    }

    #[test]
    fn test_sale_after_io_window() {
        let out = project_investment(&sample_input()).unwrap();
        let r = &out.result;
        assert_eq!(r.years.len(), 5);
        assert_eq!(r.years[2].principal_payment, dec!(-8854.24));
        assert_eq!(r.sale.forward_noi, dec!(118687.07));
        assert_eq!(r.sale.sale_price, dec!(1661618.98));
        assert_eq!(r.sale.capital_gains_tax, dec!(-122323.80));
        assert_eq!(r.sale.depreciation_recapture_tax, dec!(-25641.03));
        assert_eq!(r.sale.loan_payoff, dec!(671811.65));
        assert_eq!(r.sale.net_sale_proceeds, dec!(841842.50));
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
    }

    #[test]
    fn test_rejects_sale_after_term() {
        let mut input = sample_input();
        input.sale.sale_year = 11;
        let err = project_investment(&input).unwrap_err();
        assert_eq!(err.field(), Some("sale_year"));
    }
}
