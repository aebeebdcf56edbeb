#![cfg(feature = "investment_analysis")]

use cre_loan_core::investment_analysis::{
    project_investment, DealInformation, InvestmentInput, SaleTerms, TaxAssumptions,
};
use cre_loan_core::loan_sizing::LoanSizerInput;
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;

fn office_acquisition() -> InvestmentInput {
    InvestmentInput {
        tax: TaxAssumptions {
            land_value_ratio: dec!(0.2),
            depreciation_years: 39,
            income_tax_rate: dec!(0.35),
            capital_gains_tax_rate: dec!(0.20),
            depreciation_recapture_tax_rate: dec!(0.25),
        },
        deal: DealInformation {
            purchase_price: dec!(1_000_000),
            closing_and_renovations: dec!(50_000),
            going_in_cap_rate: Some(dec!(0.10)),
            initial_revenue: dec!(150_000),
            initial_operating_expenses: dec!(50_000),
            initial_capital_reserves: dec!(5_000),
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
            property_value: dec!(1_000_000),
            noi: dec!(100_000),
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
fn test_five_year_hold_cash_flows() {
    let out = project_investment(&office_acquisition()).unwrap();
    let r = &out.result;

    assert_eq!(r.maximum_loan_amount, dec!(700_000));
    assert_eq!(r.origination_fee, dec!(7_000));
    assert_eq!(
        r.cash_flows,
        vec![
            dec!(-357000.00),
            dec!(39879.49),
            dec!(42054.49),
            dec!(35448.00),
            dec!(37584.89),
            dec!(881630.62),
        ]
    );
}

#[test]
fn test_five_year_hold_returns() {
    let out = project_investment(&office_acquisition()).unwrap();
    let returns = &out.result.returns;

    let irr = returns.irr.expect("IRR should converge");
    assert!((irr - dec!(0.2692)).abs() <= dec!(0.0001), "irr = {irr}");
    assert_eq!(returns.equity_multiple, dec!(2.9036));
    assert_eq!(returns.average_cash_on_cash_return, dec!(0.1091));
}

#[test]
fn test_holding_to_maturity_pays_off_balloon() {
    let mut input = office_acquisition();
    input.sale.sale_year = 10;
    let out = project_investment(&input).unwrap();
    let r = &out.result;

    assert_eq!(r.years.len(), 10);
    let balloon = cre_loan_core::loan_sizing::LoanSizer::new(input.loan.clone())
        .unwrap()
        .balloon_payment()
        .unwrap();
    assert_eq!(r.sale.loan_payoff, balloon);
}

#[test]
fn test_cap_rate_mismatch_warns() {
    let mut input = office_acquisition();
    input.deal.going_in_cap_rate = Some(dec!(0.08));
    let out = project_investment(&input).unwrap();
    assert!(out.warnings.iter().any(|w| w.contains("cap rate")));
}

#[test]
fn test_losing_sale_pays_no_capital_gains_tax() {
    let mut input = office_acquisition();
    input.sale.exit_cap_rate = dec!(0.20);
    let out = project_investment(&input).unwrap();
    assert!(out.result.sale.capital_gain < dec!(0));
    assert_eq!(out.result.sale.capital_gains_tax, dec!(0));
}
