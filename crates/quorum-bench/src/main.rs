//! quorum-bench - Benchmark Suite for Quorum
//!
//! Usage:
//!   quorum-bench run single-cluster             # Run one scenario
//!   quorum-bench run all --voting soft          # Run every scenario
//!   quorum-bench compare-strategies multi-cluster
//!   quorum-bench list-detectors

use clap::{Parser, Subcommand};
use quorum_bench::{ScenarioResult, compare_strategies, print_report, run_scenario, scenarios};
use quorum_core::{DetectorKind, EnsembleConfig, PerformanceProfile, VotingStrategy};
use std::error::Error;

#[derive(Parser)]
#[command(name = "quorum-bench")]
#[command(about = "Benchmark suite for the Quorum anomaly detection ensemble")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Write JSON results to this file
    #[arg(short, long, global = true)]
    output: Option<String>,

    /// Ensemble config (JSON); defaults apply to missing fields
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a benchmark scenario ("all" runs every scenario)
    Run {
        #[arg(default_value = "quick")]
        scenario: String,

        /// Voting strategy override (hard, soft, weighted)
        #[arg(short, long)]
        voting: Option<String>,

        /// Comma-separated detector names to enable
        #[arg(short, long, value_delimiter = ',')]
        detectors: Vec<String>,

        /// Print per-sample predictions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Benchmark one scenario under every voting strategy
    CompareStrategies {
        #[arg(default_value = "single-cluster")]
        scenario: String,
    },

    /// List available detectors
    ListDetectors,
}

fn load_config(path: Option<&str>) -> Result<EnsembleConfig, Box<dyn Error>> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            Ok(EnsembleConfig::from_json(&content)?)
        }
        None => Ok(EnsembleConfig::default()),
    }
}

fn write_output(output: Option<&str>, results: &[ScenarioResult]) -> Result<(), Box<dyn Error>> {
    if let Some(output_file) = output {
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(output_file, json)?;
        println!("\nResults saved to: {}", output_file);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            scenario,
            voting,
            detectors,
            json,
        } => {
            if let Some(voting) = voting {
                config = config.with_voting(voting.parse::<VotingStrategy>()?);
            }
            if !detectors.is_empty() {
                config = config.with_detector_names(&detectors)?;
            }
            config.validate()?;

            let names: Vec<&str> = if scenario == "all" {
                scenarios::NAMES.to_vec()
            } else {
                vec![scenario.as_str()]
            };

            let mut results = Vec::with_capacity(names.len());
            for name in names {
                let spec = scenarios::by_name(name).ok_or_else(|| {
                    format!(
                        "unknown scenario '{}' (expected one of: all, {})",
                        name,
                        scenarios::NAMES.join(", ")
                    )
                })?;
                let result = run_scenario(&spec, config.clone()).await?;
                print_report(&result);
                if json {
                    println!("{}", serde_json::to_string_pretty(&result.report.predictions)?);
                }
                results.push(result);
            }
            write_output(cli.output.as_deref(), &results)?;
        }
        Commands::CompareStrategies { scenario } => {
            let spec = scenarios::by_name(&scenario)
                .ok_or_else(|| format!("unknown scenario '{scenario}'"))?;
            let results = compare_strategies(&spec, &config).await?;

            println!("\n{:<30} {:>9} {:>9} {:>9} {:>9}", "Strategy", "Accuracy", "Precision", "Recall", "F1");
            for result in &results {
                let r = &result.report;
                println!(
                    "{:<30} {:>8.2}% {:>8.2}% {:>8.2}% {:>9.3}",
                    result.scenario,
                    r.accuracy * 100.0,
                    r.precision * 100.0,
                    r.recall * 100.0,
                    r.f1_score
                );
            }
            write_output(cli.output.as_deref(), &results)?;
        }
        Commands::ListDetectors => list_detectors(),
    }
    Ok(())
}

fn list_detectors() {
    println!("Available Detectors:");
    println!();

    for (i, kind) in DetectorKind::ALL.iter().enumerate() {
        let prior = PerformanceProfile::prior(*kind);
        let description = match kind {
            DetectorKind::IsolationForest => "Random partitioning; few cuts isolate outliers",
            DetectorKind::OneClassSvm => "RBF kernel boundary around the reference set",
            DetectorKind::LocalOutlierFactor => "Local density relative to k nearest neighbours",
            DetectorKind::Dbscan => "Core-point test on the epsilon neighbourhood",
        };
        println!(
            "{:2}. {:22} ({:10}) - {} [prior weight {:.3}]",
            i + 1,
            kind.name(),
            kind.family(),
            description,
            prior.weight
        );
    }

    println!();
    println!("Use 'quorum-bench run <scenario> --detectors a,b' to select detectors.");
}
