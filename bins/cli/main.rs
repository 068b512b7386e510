//! # Ticket Marketplace CLI
//!
//! Runs one ticket marketplace simulation from command-line parameters.
//! Vendors release tickets into a bounded pool while customers retrieve
//! them; the run ends once every vendor has sold out and the pool is
//! drained, at which point a summary is printed.
//!
//! ## Features
//! - One flag per configuration field, validated before the run starts.
//! - Live pool occupancy reporting while the run is active.
//! - Logging support with configurable log levels.
//!
//! ## Command-line Options
//! - `--vendors` / `-v`: number of vendor threads.
//! - `--customers` / `-c`: number of customer threads.
//! - `--total-tickets` / `-t`: total ticket budget, split evenly across vendors.
//! - `--release-rate-ms`: delay between a vendor's release attempts.
//! - `--retrieval-rate-ms`: delay between a customer's retrieval attempts.
//! - `--max-capacity` / `-m`: maximum pool size.
//! - `--log-level` / `-l`: Log level (`error`, `warn`, `info`, `debug`, `trace`).

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use structopt::StructOpt;

use ticket_sim::defs::STATUS_POLL_PERIOD_MSEC;
use ticket_sim::errors::CliError;
use ticket_sim::events::LogSink;
use ticket_sim::sim_config::SimConfig;
use ticket_sim::ticketing_system::TicketingSystem;

/// Command-line options for the simulation
#[derive(Debug, StructOpt)]
#[structopt(
    name = "ticket_sim",
    about = "Bounded ticket marketplace simulation with paced vendor and customer threads"
)]
struct Opt {
    /// Number of vendor threads
    #[structopt(short, long, default_value = "2")]
    vendors: usize,

    /// Number of customer threads
    #[structopt(short, long, default_value = "2")]
    customers: usize,

    /// Total ticket budget, split evenly across vendors
    #[structopt(short, long, default_value = "20")]
    total_tickets: u64,

    /// Delay between a vendor's release attempts, in milliseconds
    #[structopt(long, default_value = "500")]
    release_rate_ms: u64,

    /// Delay between a customer's retrieval attempts, in milliseconds
    #[structopt(long, default_value = "500")]
    retrieval_rate_ms: u64,

    /// Maximum number of tickets the pool can hold
    #[structopt(short, long, default_value = "10")]
    max_capacity: usize,

    /// Log level: error, warn, info, debug, trace
    #[structopt(short, long, default_value = "info")]
    log_level: String,
}

/// Initializes the logger using env_logger with the given level
fn init_logger(level: &str) -> Result<(), CliError> {
    let mut builder = env_logger::Builder::new();

    let log_level = match level.to_lowercase().as_str() {
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
    };

    builder.filter_level(log_level);
    builder.format_timestamp_micros();
    builder.format_module_path(false);
    builder.format_target(false);
    builder.init();

    Ok(())
}

fn main() -> Result<(), CliError> {
    // Parse CLI arguments
    let opt = Opt::from_args();

    // Initialize logger
    init_logger(&opt.log_level)?;

    log::info!("****** Real-Time Event Ticketing Simulation ******");
    log::debug!("Command line options: {:?}", opt);

    let config = SimConfig {
        vendor_count: opt.vendors,
        customer_count: opt.customers,
        total_tickets: opt.total_tickets,
        release_rate_ms: opt.release_rate_ms,
        retrieval_rate_ms: opt.retrieval_rate_ms,
        max_capacity: opt.max_capacity,
    };
    config.validate()?;

    let system = TicketingSystem::new(Arc::new(LogSink));

    log::info!("Starting simulation");
    system.start(config)?;

    // Report live pool occupancy until the run reaches its terminal state.
    while system.is_running() {
        thread::sleep(Duration::from_millis(STATUS_POLL_PERIOD_MSEC));
        if let Ok(size) = system.pool_size() {
            log::info!("Current ticket pool size: {}", size);
        }
    }

    // The run has flipped inactive; wait for the remaining customers to
    // drain and for the summary to be emitted.
    system.wait_for_completion()?;

    log::info!("Simulation complete");
    Ok(())
}
