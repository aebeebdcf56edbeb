mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::annuity::{AmortizeArgs, IoPaymentArgs, PaymentArgs, PresentValueArgs};
use commands::investment::ProjectInvestmentArgs;
use commands::loan_sizing::SizeLoanArgs;

/// Commercial real-estate loan sizing and amortization
#[derive(Parser)]
#[command(
    name = "cre",
    version,
    about = "Commercial real-estate loan sizing and amortization",
    long_about = "Size commercial real-estate loans against LTV, DSCR and requested-amount \
                  constraints, amortize them with interest-only windows and balloons, and \
                  project levered after-tax investment returns. All amounts use decimal \
                  precision and round to the cent."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Interest-only payment for one period
    IoPayment(IoPaymentArgs),
    /// Level payment of a fixed-rate annuity
    Payment(PaymentArgs),
    /// Present value of a level payment stream
    PresentValue(PresentValueArgs),
    /// Period-by-period amortization table
    Amortize(AmortizeArgs),
    /// Size a loan (min of LTV, DSCR and requested amount) with balloon
    SizeLoan(SizeLoanArgs),
    /// Project yearly cash flows, sale proceeds and equity returns
    ProjectInvestment(ProjectInvestmentArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::IoPayment(args) => commands::annuity::run_io_payment(args),
        Commands::Payment(args) => commands::annuity::run_payment(args),
        Commands::PresentValue(args) => commands::annuity::run_present_value(args),
        Commands::Amortize(args) => commands::annuity::run_amortize(args),
        Commands::SizeLoan(args) => commands::loan_sizing::run_size_loan(args),
        Commands::ProjectInvestment(args) => commands::investment::run_project_investment(args),
        Commands::Version => {
            println!("cre {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
