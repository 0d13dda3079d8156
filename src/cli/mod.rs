//! Command-line front end

pub mod commands;
pub mod simulation;

pub use commands::{cmd_scenario, cmd_simulate_report, CliResult};
pub use simulation::{run as run_simulation, SimulationConfig, SimulationError, SimulationReport};
