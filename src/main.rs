use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use rustcar::cars::CarProbs;
use rustcar::export::CsvExporter;
use rustcar::model::ModelBuilder;
use rustcar::{PolicyIteration, RentalConfig, State};

/// Command line argument parser.
#[derive(Parser, Debug)]
#[command(about = "Solve the Barto and Sutton Car Rental Problem", long_about = None)]
pub struct Args {
    /// Path to RustCar configuration TOML file.
    config_path: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print rental and return probabilities.
    Probs,
    /// Print the outcomes of moving `a` cars from site 1 to site 2.
    Outcomes {
        n1: u8,
        n2: u8,
        #[arg(allow_hyphen_values = true)]
        a: i8,
    },
    /// Solve for optimal policy.
    Solve {
        /// Directory for policy and value CSV grids.
        #[arg(long, default_value = "out")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    info!(path = %args.config_path.display(), "reading config file");
    let config = RentalConfig::from_path(&args.config_path)
        .with_context(|| format!("unable to load {}", args.config_path.display()))?;

    match args.command {
        Commands::Probs => {
            CarProbs::new(&config)?.show_probs();
        }
        Commands::Outcomes { n1, n2, a } => {
            let builder = ModelBuilder::new(&config)?;
            let outcomes = builder.outcomes_for(State::new(n1, n2), a)?;
            let total: f64 = outcomes.iter().map(|o| o.prob).sum();
            let expected: f64 = outcomes.iter().map(|o| o.prob * o.reward).sum();
            for oc in &outcomes {
                println!("{oc}");
            }
            println!("{} outcomes, total probability {:.6}, expected reward {:.3}",
                     outcomes.len(), total, expected);
        }
        Commands::Solve { out } => {
            let mut exporter = CsvExporter::new(&out)?;
            let mut pi = PolicyIteration::from_config(&config)?;
            let solution = pi.run(&mut exporter)?;
            println!("Converged after {} rounds.", solution.rounds.len());
            for report in &solution.rounds {
                println!("  round {:>2}: {:>4} sweeps, {:>3} actions changed",
                         report.round, report.sweeps, report.changed);
            }
            println!("Wrote {} files to {}", exporter.written().len(), out.display());
        }
    }
    Ok(())
}
