use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::loan_sizing::LoanSizerInput;
use crate::rounding::round_currency;
use crate::types::{Money, Rate};

/// Tax treatment of the holding period and the exit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxAssumptions {
    /// Share of the purchase price attributed to land, which does not depreciate
    pub land_value_ratio: Rate,
    /// Straight-line depreciation timeline in years (e.g. 39 for commercial)
    pub depreciation_years: u32,
    pub income_tax_rate: Rate,
    pub capital_gains_tax_rate: Rate,
    pub depreciation_recapture_tax_rate: Rate,
}

/// Acquisition and first-year operating figures of the property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealInformation {
    pub purchase_price: Money,
    #[serde(default)]
    pub closing_and_renovations: Money,
    /// Cap rate the deal was underwritten at, checked against year-1 NOI
    #[serde(default)]
    pub going_in_cap_rate: Option<Rate>,
    pub initial_revenue: Money,
    pub initial_operating_expenses: Money,
    #[serde(default)]
    pub initial_capital_reserves: Money,
    /// Annual growth rates
    #[serde(default)]
    pub revenue_growth: Rate,
    #[serde(default)]
    pub operating_expenses_growth: Rate,
    #[serde(default)]
    pub capital_reserves_growth: Rate,
}

/// Exit assumptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleTerms {
    pub exit_cap_rate: Rate,
    /// Brokerage and closing costs as a fraction of the gross sale price
    #[serde(default)]
    pub cost_of_sale: Rate,
    /// Year the property is sold, at most the loan term
    pub sale_year: u32,
}

impl SaleTerms {
    /// Sale price net of selling costs, capitalizing `noi` at the exit cap rate.
    pub fn projected_sale_price(&self, noi: Money) -> Money {
        let gross = round_currency(noi / self.exit_cap_rate);
        round_currency(gross - gross * self.cost_of_sale)
    }
}

/// Everything needed to project a leveraged acquisition through its sale.
///
/// Loan periods are read as years: rate, amortization, term and IO window
/// must all be annual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestmentInput {
    pub tax: TaxAssumptions,
    pub deal: DealInformation,
    pub loan: LoanSizerInput,
    pub sale: SaleTerms,
}

impl DealInformation {
    /// Purchase price plus closing and renovation costs.
    pub fn total_cost(&self) -> Money {
        self.purchase_price + self.closing_and_renovations
    }

    pub fn initial_noi(&self) -> Money {
        round_currency(self.initial_revenue - self.initial_operating_expenses)
    }

    /// Year-1 NOI over the purchase price.
    pub fn implied_cap_rate(&self) -> Option<Rate> {
        if self.purchase_price.is_zero() {
            None
        } else {
            Some(self.initial_noi() / self.purchase_price)
        }
    }
}

impl TaxAssumptions {
    /// Annual straight-line depreciation of the building (negative, an expense).
    pub fn annual_depreciation(&self, purchase_price: Money) -> Money {
        let building_value = purchase_price * (Decimal::ONE - self.land_value_ratio);
        round_currency(-building_value / Decimal::from(self.depreciation_years))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_projected_sale_price_nets_cost_of_sale() {
        let sale = SaleTerms {
            exit_cap_rate: dec!(0.07),
            cost_of_sale: dec!(0.02),
            sale_year: 5,
        };
        // 118687.07 / 0.07 = 1695529.57, less 2%
        assert_eq!(sale.projected_sale_price(dec!(118687.07)), dec!(1661618.98));
    }

    #[test]
    fn test_annual_depreciation_excludes_land() {
        let tax = TaxAssumptions {
            land_value_ratio: dec!(0.2),
            depreciation_years: 39,
            income_tax_rate: dec!(0.35),
            capital_gains_tax_rate: dec!(0.20),
            depreciation_recapture_tax_rate: dec!(0.25),
        };
        assert_eq!(tax.annual_depreciation(dec!(1000000)), dec!(-20512.82));
    }
}
