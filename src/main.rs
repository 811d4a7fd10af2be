use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use planpay::application::fraud::analyze;
use planpay::domain::fraud::FraudPolicy;
use planpay::domain::plan::Plan;
use planpay::domain::transaction::PaymentTransaction;
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the fraud heuristics over an exported transaction log and print
    /// the indicators as JSON.
    Scan {
        /// JSON file with an array of payment transactions.
        input: PathBuf,

        /// Optional JSON file with an array of plans, enabling the
        /// over-budget heuristic.
        #[arg(long)]
        plans: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Scan { input, plans } => {
            let file = File::open(input).into_diagnostic()?;
            let transactions: Vec<PaymentTransaction> =
                serde_json::from_reader(file).into_diagnostic()?;

            let plans: Vec<Plan> = match plans {
                Some(path) => {
                    let file = File::open(path).into_diagnostic()?;
                    serde_json::from_reader(file).into_diagnostic()?
                }
                None => Vec::new(),
            };

            let indicators = analyze(&transactions, &plans, &FraudPolicy::default());
            let stdout = std::io::stdout();
            serde_json::to_writer_pretty(stdout.lock(), &indicators).into_diagnostic()?;
            println!();
        }
    }

    Ok(())
}
