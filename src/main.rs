// cppstep: step-driven C++ teaching interpreter

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use cppstep::compiler::{Program, SourceUnit};
use cppstep::config::{MemoryLayout, SimulationConfig};
use cppstep::library::LibraryRegistry;
use cppstep::simulation::{Simulation, StepOutcome};

#[derive(Parser, Debug)]
#[command(name = "cppstep")]
#[command(about = "Compile and step through a C++ teaching program")]
struct Args {
    /// Translation units to compile and link
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Text supplied to `cin`; input is closed after it
    #[arg(long)]
    stdin: Option<String>,

    /// Total bytes of simulated memory
    #[arg(long, default_value_t = MemoryLayout::DEFAULT_CAPACITY)]
    capacity: u64,

    /// Stop after this many steps
    #[arg(long, default_value_t = SimulationConfig::default().max_steps)]
    max_steps: usize,

    /// Print every step's construct
    #[arg(long)]
    step: bool,

    /// Echo consumed input into the output
    #[arg(long)]
    echo: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,cppstep=info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    let mut sources = Vec::new();
    for path in &args.files {
        match fs::read_to_string(path) {
            Ok(text) => sources.push(SourceUnit::new(path.display().to_string(), text)),
            Err(err) => {
                error!("cannot read '{}': {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        }
    }

    let program = Program::compile(&sources, &LibraryRegistry::standard());
    for note in program.notes() {
        eprintln!("{}", note);
    }
    if program.has_errors() {
        return ExitCode::FAILURE;
    }

    let config = SimulationConfig {
        layout: MemoryLayout::with_capacity(args.capacity),
        max_steps: args.max_steps,
        echo_input: args.echo,
    };
    let mut sim = match Simulation::new(program, config) {
        Ok(sim) => sim,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    if let Some(text) = &args.stdin {
        sim.supply_input(text);
    }
    sim.close_input();

    let outcome = if args.step { step_through(&mut sim) } else { sim.run_to_end() };
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    print!("{}", sim.output().text());
    for event in sim.events() {
        eprintln!("{}", event);
    }
    info!(steps = sim.steps(), ?outcome, "run ended");

    match (outcome, sim.exit_code()) {
        (StepOutcome::Finished, Some(code)) => ExitCode::from(code as u8),
        _ => ExitCode::FAILURE,
    }
}

/// Step one construct at a time, printing each one
fn step_through(sim: &mut Simulation) -> cppstep::errors::Result<StepOutcome> {
    loop {
        if let Some(id) = sim.current_construct() {
            let label = sim.program().constructs.kind(id).map_or("?", |k| k.label());
            println!("[{:>6}] {:<24} {}", sim.steps(), label, sim.current_location());
        }
        let outcome = sim.step_forward()?;
        if outcome != StepOutcome::Stepped {
            return Ok(outcome);
        }
        if sim.steps() >= sim.config().max_steps {
            return Ok(StepOutcome::StepLimit);
        }
    }
}
