//! Fleet Routing Solver - Command Line Interface
//!
//! Thin wrapper around the library: loads an instance, runs the search, and
//! prints the per-vehicle report.

use clap::{Parser, Subcommand};
use vrptw_solver::heuristics::SearchConfig;
use vrptw_solver::instance::ProblemInstance;

use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "vrptw-solver")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "Fleet routing with time windows, drops and guided local search")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve an instance
    Solve {
        /// Path to the instance JSON file
        #[arg(short, long)]
        instance: PathBuf,

        /// Time limit in seconds
        #[arg(short, long, default_value = "5")]
        time_limit: f64,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Arc-penalty weight of the guided local search
        #[arg(long, default_value = "0.3")]
        lambda: f64,

        /// Number of parallel independent starts
        #[arg(long, default_value = "1")]
        starts: usize,

        /// Write the solution report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print instance statistics and the travel-time matrix
    Analyze {
        /// Path to the instance JSON file
        #[arg(short, long)]
        instance: PathBuf,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Solve { instance, time_limit, seed, lambda, starts, output } => {
            solve_instance(&instance, time_limit, seed, lambda, starts, output)
        }
        Commands::Analyze { instance } => analyze_instance(&instance),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn solve_instance(
    path: &PathBuf,
    time_limit: f64,
    seed: u64,
    lambda: f64,
    starts: usize,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let instance = ProblemInstance::from_file(path)?;
    println!("{}", instance.statistics());

    let config = SearchConfig {
        time_limit: Duration::from_secs_f64(time_limit),
        lambda,
        seed,
        max_iterations: None,
    };

    let report = if starts > 1 {
        vrptw_solver::solve_multi_start(&instance, &config, starts)?
    } else {
        vrptw_solver::solve(&instance, &config)?
    };

    println!("{}", report);

    if let Some(out) = output {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&out, json)?;
        println!("Report written to {:?}", out);
    }

    Ok(())
}

fn analyze_instance(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let instance = ProblemInstance::from_file(path)?;
    println!("{}", instance.statistics());

    println!("Travel-time matrix (minutes):");
    for row in &instance.matrix {
        println!("{:?}", row);
    }

    println!("\nTime windows:");
    for (loc, window) in instance.locations.iter().zip(&instance.windows) {
        println!("  {} {}", loc.id, window);
    }

    Ok(())
}
