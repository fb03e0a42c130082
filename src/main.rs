use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use colony_jobs::simulation::{
    run_simulation, ColonyConfig, ConfigError, JobTypeDictionary, SchedulerParams,
};

#[derive(Parser, Debug)]
#[command(name = "colony_jobs")]
#[command(about = "Run a small colony and report how its job scheduler did")]
struct Args {
    /// Random seed (uses random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of scheduler ticks to run
    #[arg(short, long, default_value = "1000")]
    ticks: u64,

    /// Width of the colony map in tiles
    #[arg(short = 'W', long, default_value = "32")]
    width: usize,

    /// Height of the colony map in tiles
    #[arg(short = 'H', long, default_value = "24")]
    height: usize,

    /// Number of colonists
    #[arg(long, default_value = "6")]
    workers: usize,

    /// Scheduler parameters as JSON
    #[arg(long)]
    params: Option<PathBuf>,

    /// Job type definitions as JSON (built-in set if not specified)
    #[arg(long)]
    job_types: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<(SchedulerParams, JobTypeDictionary), ConfigError> {
    let params = match &args.params {
        Some(path) => SchedulerParams::from_json_file(path)?,
        None => SchedulerParams::default(),
    };
    params.validate()?;

    let dictionary = match &args.job_types {
        Some(path) => JobTypeDictionary::from_json_file(path)?,
        None => JobTypeDictionary::builtin(),
    };
    Ok((params, dictionary))
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("colony_jobs=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let (params, dictionary) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(err) => {
            error!(%err, "could not load configuration");
            return ExitCode::FAILURE;
        }
    };

    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let config = ColonyConfig {
        width: args.width,
        height: args.height,
        workers: args.workers,
        ..ColonyConfig::default()
    };

    info!(
        seed,
        width = config.width,
        height = config.height,
        workers = config.workers,
        "starting colony"
    );
    let colony = run_simulation(&config, params, dictionary, args.ticks, &mut rng);

    match serde_json::to_string_pretty(&colony.summary()) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "could not serialize summary");
            ExitCode::FAILURE
        }
    }
}
