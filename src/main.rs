// ========================================================================================
//
//                      THE SIMULATION DRIVER: CSRECON
//
// ========================================================================================
//
// Command-line entry point. Resolves the run configuration (defaults, an optional
// TOML file, then command-line overrides), hands it to the library, and reports the
// outcome. All numeric work lives in the library.

#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use clap::{Parser, Subcommand};
use csrecon::config::SimulationConfig;
use csrecon::simulate::run_simulation;
use csrecon::window::WarmStart;
use std::path::PathBuf;
use std::process;

// ========================================================================================
//                         COMMAND-LINE INTERFACE DEFINITION
// ========================================================================================

#[derive(Parser)]
#[command(
    name = "csrecon",
    version,
    about = "Compressive-sensing reconstruction of a windowed synthetic signal",
    long_about = "Samples a noisy quasi-periodic signal, measures each window through a random \
                  row-selection operator, and recovers sparse cosine coefficients with \
                  coordinate-descent LASSO."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the windowed reconstruction and write a TSV report
    #[command(about = "Run a simulation (outputs: reconstruction.tsv)")]
    Simulate {
        /// TOML configuration file; missing fields take their defaults
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Seed for the signal, the measurement rows and the solver starts
        #[arg(long)]
        seed: Option<u64>,

        /// Strength of the L1 penalty
        #[arg(long, value_name = "LAMBDA")]
        l1_lambda: Option<f64>,

        /// Relative-change convergence threshold for coordinate descent
        #[arg(long)]
        tolerance: Option<f64>,

        /// Maximum number of coordinate-descent passes per window
        #[arg(long)]
        max_passes: Option<usize>,

        /// Start each window from the previous window's coefficients
        #[arg(long)]
        warm_start: bool,

        /// Where to write the time/original/reconstructed table
        #[arg(long, default_value = "reconstruction.tsv")]
        output: PathBuf,
    },

    /// Write the default configuration as TOML
    #[command(about = "Write the default configuration (outputs: simulation.toml)")]
    Config {
        #[arg(long, default_value = "simulation.toml")]
        output: PathBuf,
    },
}

// ========================================================================================
//                           THE MAIN ORCHESTRATION LOGIC
// ========================================================================================

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Simulate {
            config,
            seed,
            l1_lambda,
            tolerance,
            max_passes,
            warm_start,
            output,
        } => {
            let mut sim_config = match config {
                Some(path) => match SimulationConfig::load(&path) {
                    Ok(loaded) => loaded,
                    Err(e) => {
                        eprintln!("Error loading configuration '{}': {}", path.display(), e);
                        process::exit(1);
                    }
                },
                None => SimulationConfig::default(),
            };
            if let Some(seed) = seed {
                sim_config.seed = seed;
            }
            if let Some(l1_lambda) = l1_lambda {
                sim_config.solver.l1_lambda = l1_lambda;
            }
            if let Some(tolerance) = tolerance {
                sim_config.solver.tolerance = tolerance;
            }
            if let Some(max_passes) = max_passes {
                sim_config.solver.max_passes = max_passes;
            }
            if warm_start {
                sim_config.warm_start = WarmStart::Previous;
            }
            simulate_command(&sim_config, output)
        }
        Commands::Config { output } => SimulationConfig::default()
            .save(&output)
            .map(|()| println!("Default configuration written to {}", output.display()))
            .map_err(|e| e.to_string()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn simulate_command(config: &SimulationConfig, output: PathBuf) -> Result<(), String> {
    let report = run_simulation(config).map_err(|e| e.to_string())?;
    report.write_tsv(&output).map_err(|e| e.to_string())?;

    println!(
        "Windows: {} ({} samples, {} measurements each)",
        report.reconstruction.windows.len(),
        report.window_len,
        report.num_measurements
    );
    println!(
        "Coordinate-descent passes: {} total, {:.1} nonzero coefficients per window on average",
        report.total_passes(),
        report.mean_nonzero()
    );
    println!("Corrcoef: {:.6}", report.correlation);
    println!("Reconstruction written to {}", output.display());
    Ok(())
}
