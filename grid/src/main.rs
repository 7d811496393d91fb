use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use learn_grid::config::Config;
use learn_grid::grid::Orientation;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "grid")]
#[command(version, about = "Tabular reinforcement learning on a toy grid world", long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one episode of random moves
    Random(GridArgs),

    /// Train a Q-learning agent, then run a greedy test episode
    Train(TrainArgs),

    /// Replay the greedy policy of a saved Q-table
    Play(PlayArgs),

    /// Drive the cart-pole task with random pushes
    Cartpole(CartpoleArgs),
}

#[derive(Args, Debug)]
struct GridArgs {
    /// JSON configuration file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Coordinate convention: matrix (row, col) or cartesian (x, y)
    #[arg(long)]
    orientation: Option<Orientation>,

    /// Seed for the random number generator
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct TrainArgs {
    #[command(flatten)]
    grid: GridArgs,

    /// Number of training episodes
    #[arg(long, short = 'e')]
    episodes: Option<usize>,

    /// Learning rate
    #[arg(long)]
    alpha: Option<f64>,

    /// Discount factor
    #[arg(long)]
    gamma: Option<f64>,

    /// Exploration rate
    #[arg(long)]
    epsilon: Option<f64>,

    /// Render every step of each reported training episode
    #[arg(long)]
    show_training: bool,

    /// Delay between rendered steps, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Directory to archive the learned Q-table in
    #[arg(long)]
    save: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PlayArgs {
    #[command(flatten)]
    grid: GridArgs,

    /// Saved Q-table (.pickle or .json)
    #[arg(long)]
    load: PathBuf,

    /// Delay between rendered steps, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,
}

#[derive(Args, Debug)]
struct CartpoleArgs {
    /// Number of episodes to run
    #[arg(long, short = 'e', default_value_t = 1)]
    episodes: usize,

    /// Seed for the random number generator
    #[arg(long)]
    seed: Option<u64>,

    /// Delay between rendered steps, in milliseconds
    #[arg(long, default_value_t = 20)]
    delay_ms: u64,
}

fn load_config(args: &GridArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(orientation) = args.orientation {
        config.grid.orientation = orientation;
    }
    if args.seed.is_some() {
        config.learner.seed = args.seed;
    }
    tracing::debug!(?config, "resolved configuration");
    Ok(config)
}

fn train(args: TrainArgs) -> Result<()> {
    let mut config = load_config(&args.grid)?;
    if let Some(episodes) = args.episodes {
        config.training.episodes = episodes;
    }
    if let Some(alpha) = args.alpha {
        config.learner.alpha = alpha;
    }
    if let Some(gamma) = args.gamma {
        config.learner.gamma = gamma;
    }
    if let Some(epsilon) = args.epsilon {
        config.learner.epsilon = epsilon;
    }
    if let Some(delay) = args.delay_ms {
        config.training.render_delay_ms = delay;
        config.training.test_delay_ms = delay;
    }
    config.training.verbose |= args.show_training;

    let outcome = learn_grid::train_q_agent(&config, args.save.as_deref())
        .context("training Q-learning agent")?;
    if let Some((pickle, json)) = &outcome.saved {
        println!("\nQ-table saved to {} and {}", pickle.display(), json.display());
    }
    Ok(())
}

fn play(args: PlayArgs) -> Result<()> {
    let mut config = load_config(&args.grid)?;
    if let Some(delay) = args.delay_ms {
        config.training.test_delay_ms = delay;
    }
    let path: &Path = &args.load;
    learn_grid::play_saved(&config, path)
        .with_context(|| format!("replaying Q-table from {}", path.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("grid={log_level},learn_grid={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Random(args) => {
            learn_grid::random_walk(&load_config(&args)?)?;
        }
        Commands::Train(args) => train(args)?,
        Commands::Play(args) => play(args)?,
        Commands::Cartpole(args) => {
            learn_grid::run_cartpole(args.episodes, args.seed, args.delay_ms)?;
        }
    }
    Ok(())
}
