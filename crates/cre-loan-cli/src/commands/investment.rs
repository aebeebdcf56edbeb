use clap::Args;
use serde_json::Value;

use cre_loan_core::investment_analysis::{self, InvestmentInput};

use crate::input;

/// Arguments for the investment projection
#[derive(Args)]
pub struct ProjectInvestmentArgs {
    /// Path to JSON input file with tax, deal, loan and sale sections
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_project_investment(
    args: ProjectInvestmentArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let deal: InvestmentInput = input::read_structured(args.input.as_deref())?
        .ok_or("--input <file.json> or stdin required for the investment projection")?;
    let result = investment_analysis::project_investment(&deal)?;
    Ok(serde_json::to_value(result)?)
}
