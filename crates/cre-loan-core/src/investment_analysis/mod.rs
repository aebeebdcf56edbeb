pub mod assumptions;
pub mod projection;

pub use assumptions::{DealInformation, InvestmentInput, SaleTerms, TaxAssumptions};
pub use projection::{
    acquisition_cost, cash_on_cash_return, project_investment, InvestmentProjection,
    ProjectionYear, ReturnMetrics, SaleProceeds,
};
