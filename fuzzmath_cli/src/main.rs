use fuzzmath_core::config::FuzzMathConfig;
use fuzzmath_core::mutator::{HammingBallMutator, Mutator};
use fuzzmath_core::neighbor::NeighborCache;
use fuzzmath_core::random::{create_random_state, dispose_random_state, seed_random_state};
use fuzzmath_core::ranking::PartitionRanker;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(short, long, value_parser)]
    config_file: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise
    #[clap(short, long)]
    verbose: bool,
    /// Print results as JSON
    #[clap(long)]
    json: bool,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Count the vectors within distance K of an N-bit vector
    Count { n: u32, k: u32 },
    /// Share of the distance-K ball around an N-bit vector that sits at distance POS
    Ratio { n: u32, k: u32, pos: u32 },
    /// Ratios for every distance 0..=K
    Weights { n: u32, k: u32 },
    /// Estimate the probability of drawing M survivors from NUM items with failure rate P
    Success { p: f32, m: i32, num: i32 },
    /// Emit uniformly drawn neighbors of a file's contents as hex lines
    Mutate {
        input: PathBuf,
        #[clap(short, long)]
        distance: Option<u32>,
        #[clap(short, long)]
        seed: Option<u64>,
        #[clap(long, default_value_t = 1)]
        count: usize,
    },
}

#[derive(Serialize, Debug)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum Report {
    Count { n: u32, k: u32, total: String, last: String },
    Ratio { n: u32, k: u32, pos: u32, ratio: f64 },
    Weights { n: u32, k: u32, weights: Vec<f64> },
    Success { p: f32, m: i32, num: i32, probability: f32 },
    Mutate { input: PathBuf, variants: Vec<String> },
}

impl Report {
    fn print_plain(&self) {
        match self {
            Report::Count { n, k, total, last } => {
                println!("n={n} k={k} total={total} last={last}");
            }
            Report::Ratio { n, k, pos, ratio } => println!("n={n} k={k} pos={pos} ratio={ratio}"),
            Report::Weights { weights, .. } => {
                for (d, w) in weights.iter().enumerate() {
                    println!("{d}\t{w}");
                }
            }
            Report::Success { probability, .. } => println!("{probability}"),
            Report::Mutate { variants, .. } => {
                for variant in variants {
                    println!("{variant}");
                }
            }
        }
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn load_config(cli_path: Option<&PathBuf>) -> Result<FuzzMathConfig, anyhow::Error> {
    match cli_path {
        Some(config_path) => {
            tracing::info!("Loading configuration from specified path: {config_path:?}");
            Ok(FuzzMathConfig::load_from_file(config_path)?)
        }
        None => {
            let default_config_path = PathBuf::from("fuzzmath.toml");
            if default_config_path.exists() {
                tracing::info!("Loading default configuration: {default_config_path:?}");
                Ok(FuzzMathConfig::load_from_file(&default_config_path)?)
            } else {
                tracing::debug!("No config file found, using built-in defaults");
                Ok(FuzzMathConfig::default())
            }
        }
    }
}

fn run(cli: Cli) -> Result<Report, anyhow::Error> {
    let config = load_config(cli.config_file.as_ref())?;
    tracing::debug!("Effective configuration: {config:?}");

    let cache = NeighborCache::new();
    let ranker = PartitionRanker::new(&cache, config.arith.rounding);

    let report = match cli.command {
        Command::Count { n, k } => {
            let entry = cache.get_or_compute(n, k)?;
            Report::Count {
                n,
                k,
                total: entry.total().to_string(),
                last: entry.last().to_string(),
            }
        }
        Command::Ratio { n, k, pos } => Report::Ratio {
            n,
            k,
            pos,
            ratio: ranker.ratio_at_position(n, k, pos)?,
        },
        Command::Weights { n, k } => Report::Weights {
            n,
            k,
            weights: ranker.distance_weights(n, k)?,
        },
        Command::Success { p, m, num } => Report::Success {
            p,
            m,
            num,
            probability: config.estimator().estimate(p, m, num)?,
        },
        Command::Mutate {
            input,
            distance,
            seed,
            count,
        } => {
            let data = std::fs::read(&input)
                .with_context(|| format!("Failed to read input file {input:?}"))?;
            let max_distance = distance.unwrap_or(config.mutation.max_distance);
            let mut mutator = HammingBallMutator::new(&cache, config.arith.rounding, max_distance);

            let mut state = create_random_state();
            if let Some(seed) = seed.or(config.mutation.seed) {
                seed_random_state(&mut state, seed);
            }
            let variants = (0..count)
                .map(|_| mutator.mutate(Some(data.as_slice()), &mut state).map(|v| to_hex(&v)))
                .collect::<Result<Vec<_>, _>>();
            dispose_random_state(state);

            Report::Mutate {
                input,
                variants: variants?,
            }
        }
    };
    Ok(report)
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let json = cli.json;
    let report = run(cli)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print_plain();
    }
    Ok(())
}
