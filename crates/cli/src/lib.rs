pub mod commands;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::process::ExitCode;

use commands::estimate::EstimateArgs;

#[derive(Debug, Parser)]
#[command(
    name = "shipquote",
    about = "Shipquote operator CLI",
    long_about = "Operate the shipping estimator: migrations, reference data, config inspection, readiness checks and ad-hoc quotes.",
    after_help = "Examples:\n  shipquote doctor --json\n  shipquote seed\n  shipquote estimate --country US --state CA --weight 3 --subtotal 100"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the reference shipping methods, rates, tax rates and catalog weights")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution"
    )]
    Config,
    #[command(about = "Validate config, DB connectivity, schema and rate data readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List active shipping methods in display order")]
    Methods,
    #[command(about = "Estimate shipping and tax for a destination and cart weight")]
    Estimate {
        #[arg(long, help = "ISO country code; the configured default destination applies when omitted")]
        country: Option<String>,
        #[arg(long)]
        state: Option<String>,
        #[arg(long = "postal-code")]
        postal_code: Option<String>,
        #[arg(long, help = "Shipping method id; the first active method applies when omitted")]
        method: Option<String>,
        #[arg(long, help = "Total cart weight")]
        weight: Option<Decimal>,
        #[arg(long, help = "Cart subtotal used for tax and free-shipping checks")]
        subtotal: Option<Decimal>,
        #[arg(long, help = "Quote every active method instead of one")]
        all: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Methods => commands::methods::run(),
        Command::Estimate { country, state, postal_code, method, weight, subtotal, all } => {
            commands::estimate::run(EstimateArgs {
                country,
                state,
                postal_code,
                method,
                weight,
                subtotal,
                all,
            })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
