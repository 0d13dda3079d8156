//! UTXO ledger CLI application
//!
//! Runs producer simulations against the shared ledger and replays the
//! reference validation scenario.

use clap::{Parser, Subcommand};
use utxo_ledger::cli::{self, SimulationConfig};
use utxo_ledger::core::CUT_OFF_AGE;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "A fork-aware, bounded-memory UTXO ledger", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run block producers against a shared ledger
    Simulate {
        /// Rounds run by each producer
        #[arg(short, long, default_value = "20")]
        blocks: u64,

        /// Number of concurrent producers
        #[arg(short, long, default_value = "1")]
        producers: usize,

        /// Heights kept below the tip before pruning
        #[arg(long, default_value_t = CUT_OFF_AGE)]
        cut_off_age: u64,

        /// Probability of building on the tip's parent
        #[arg(long, default_value = "0.2")]
        fork_rate: f64,

        /// Outputs each producer spends per round
        #[arg(long, default_value = "2")]
        spends: usize,

        /// Seed for key and fork generation
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay the genesis / valid spend / inflating spend scenario
    Scenario,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            blocks,
            producers,
            cut_off_age,
            fork_rate,
            spends,
            seed,
            json,
        } => {
            let config = SimulationConfig {
                rounds: blocks,
                producers,
                cut_off_age,
                fork_rate,
                spends_per_round: spends,
                seed,
            };
            run_simulate_command(config, json)?;
        }

        Commands::Scenario => {
            cli::cmd_scenario()?;
        }
    }

    Ok(())
}

fn run_simulate_command(config: SimulationConfig, json: bool) -> cli::CliResult<()> {
    let rt = tokio::runtime::Runtime::new()?;

    let report = rt.block_on(cli::run_simulation(config))?;
    cli::cmd_simulate_report(&report, json)
}
