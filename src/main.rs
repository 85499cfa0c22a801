//! Circuit simulator CLI
//!
//! Loads a JSON circuit description, runs it and prints the stimulus and
//! probe traces.
//!
//! # Example
//!
//! ```bash
//! # Deterministic run
//! rusty_circuit configs/example_circuit.json
//!
//! # Real-time run with a 2 ms tick, shown in the waveform viewer
//! rusty_circuit configs/full_adder.json --realtime --tick-us 2000 --tui
//! ```

use clap::Parser;
use rusty_circuit::circuit::CircuitResults;
use rusty_circuit::config::TimingConfig;
use rusty_circuit::console::{render_waveforms, run_viewer, ConsoleConfig};
use rusty_circuit::system_config::CircuitFactory;
use rusty_circuit::SimError;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Lock-step digital circuit simulator
#[derive(Parser, Debug)]
#[command(name = "rusty_circuit")]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON circuit description
    config: String,

    /// Override the number of ticks every node runs for
    #[arg(short = 'n', long)]
    length: Option<u32>,

    /// Run one task per node against the wall clock instead of in lock-step
    #[arg(long)]
    realtime: bool,

    /// Tick period in microseconds (real-time only)
    #[arg(long, default_value = "1000")]
    tick_us: u64,

    /// Settle window in microseconds (real-time only)
    #[arg(long, default_value = "700")]
    settle_us: u64,

    /// Show the traces in the interactive waveform viewer
    #[arg(long)]
    tui: bool,
}

fn run(args: &Args) -> Result<CircuitResults, SimError> {
    let mut circuit = CircuitFactory::new().create_from_json(&args.config)?;
    if let Some(length) = args.length {
        circuit.set_sim_length(length);
    }

    let info = circuit.info();
    info!(
        circuit = %info.name,
        sim_length = info.sim_length,
        gates = info.gate_count,
        stimuli = info.stimulus_count,
        probes = info.probe_count,
        realtime = args.realtime,
        "Starting simulation"
    );

    if !args.realtime {
        return circuit.run_lockstep();
    }

    let timing = TimingConfig::new(
        Duration::from_micros(args.tick_us),
        Duration::from_micros(args.settle_us),
    );
    timing.validate()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| SimError::TaskFailed(e.to_string()))?;
    runtime.block_on(circuit.run_realtime(timing))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,rusty_circuit=info")),
        )
        .init();

    let args = Args::parse();

    let results = match run(&args) {
        Ok(results) => results,
        Err(e) => {
            error!(error = %e, "simulation failed");
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.tui {
        if let Err(e) = run_viewer(&args.config, results.clone(), ConsoleConfig::default()) {
            eprintln!("Viewer failed: {}", e);
            return ExitCode::FAILURE;
        }
    } else {
        println!("{}", render_waveforms(&results));
    }

    if results.report.is_clean() {
        ExitCode::SUCCESS
    } else {
        for node in results.report.faults() {
            error!(node = %node.name, ticks = node.ticks, "node faulted");
        }
        ExitCode::FAILURE
    }
}
