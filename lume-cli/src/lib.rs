//! Command-line interface for the Lume playback engine.
//!
//! `lume plan` prints a route summary as JSON; `lume simulate` plays the
//! route back in real time and streams events as JSON lines. Options layer
//! CLI flags over `LUME_*` environment variables and configuration files.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use tokio::runtime::{Builder, Runtime};
use tracing_subscriber::EnvFilter;

mod error;
mod plan;
mod simulate;
mod sink;
mod trip;

pub use error::CliError;

use plan::{PlanArgs, run_plan};
use simulate::{SimulateArgs, run_simulate};

pub(crate) const ARG_FROM: &str = "from";
pub(crate) const ARG_TO: &str = "to";
pub(crate) const ARG_OSRM_URL: &str = "osrm-url";
pub(crate) const ARG_PROFILE: &str = "profile";
pub(crate) const ARG_NOMINATIM_URL: &str = "nominatim-url";
pub(crate) const ARG_COUNTRY_CODES: &str = "country-codes";
pub(crate) const ENV_PLAN_FROM: &str = "LUME_CMDS_PLAN_FROM";
pub(crate) const ENV_PLAN_TO: &str = "LUME_CMDS_PLAN_TO";
pub(crate) const ENV_SIMULATE_FROM: &str = "LUME_CMDS_SIMULATE_FROM";
pub(crate) const ENV_SIMULATE_TO: &str = "LUME_CMDS_SIMULATE_TO";

/// Log filter used when `RUST_LOG` is unset or invalid.
const DEFAULT_LOG_FILTER: &str = "info";

/// Run the Lume CLI with the current process arguments and environment.
///
/// # Errors
/// Returns a [`CliError`] describing the first failure.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    init_logging();
    let runtime = build_runtime()?;
    match cli.command {
        Command::Plan(args) => run_plan(args, &runtime),
        Command::Simulate(args) => run_simulate(args, &runtime),
    }
}

/// Install the stderr subscriber; `log` records are bridged into it.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // A subscriber installed by the host process wins.
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        log::debug!("global subscriber already installed");
    }
}

fn build_runtime() -> Result<Runtime, CliError> {
    Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)
}

#[derive(Debug, Parser)]
#[command(
    name = "lume",
    about = "Plan a route and play it back with points of interest along the way",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch a route and print its summary.
    Plan(PlanArgs),
    /// Play a route back and stream its events.
    Simulate(SimulateArgs),
}

#[cfg(test)]
mod tests;
