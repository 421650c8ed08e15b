//! adaptest CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "adaptest", version, about = "Computerized adaptive testing engine")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an adaptive session
    Start {
        /// Required content areas (comma-separated, default: from config)
        #[arg(long)]
        areas: Option<String>,

        /// Minimum items before the SE rule may stop the session
        #[arg(long)]
        min_items: Option<u32>,

        /// Maximum items per session
        #[arg(long)]
        max_items: Option<u32>,

        /// Idempotency key (default: a fresh UUID)
        #[arg(long)]
        key: Option<String>,
    },

    /// Submit the answer to the pending item
    Answer {
        /// Session ID
        #[arg(long)]
        session: String,

        /// Item ID being answered
        #[arg(long)]
        item: String,

        /// Whether the answer was correct
        #[arg(long, action = clap::ArgAction::Set)]
        correct: bool,
    },

    /// Show the pending item of a session without changing it
    Resume {
        /// Session ID
        #[arg(long)]
        session: String,
    },

    /// Print a human-readable session report
    Report {
        /// Session ID
        #[arg(long)]
        session: String,
    },

    /// Convert an ability estimate into a score report
    Score {
        /// Ability estimate
        #[arg(long, allow_negative_numbers = true)]
        theta: f64,

        /// Standard error (omit for an undefined SE)
        #[arg(long)]
        se: Option<f64>,

        /// Items administered
        #[arg(long, default_value = "0")]
        items: u32,
    },

    /// Run a Monte Carlo simulation batch
    Simulate {
        /// Number of simulated examinees
        #[arg(long, default_value = "100")]
        examinees: usize,

        /// Fixed true ability for every examinee (default: drawn from N(mean, sd))
        #[arg(long, allow_negative_numbers = true)]
        theta: Option<f64>,

        /// Mean of the ability distribution
        #[arg(long, default_value = "0.0", allow_negative_numbers = true)]
        theta_mean: f64,

        /// Standard deviation of the ability distribution
        #[arg(long, default_value = "1.0")]
        theta_sd: f64,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Max concurrent sessions
        #[arg(long, default_value = "4")]
        parallelism: usize,

        /// Item bank (default: configured bank, else a synthetic one)
        #[arg(long)]
        bank: Option<PathBuf>,

        /// Required content areas (comma-separated)
        #[arg(long)]
        areas: Option<String>,

        /// Minimum items per session
        #[arg(long)]
        min_items: Option<u32>,

        /// Maximum items per session
        #[arg(long)]
        max_items: Option<u32>,

        /// Output directory
        #[arg(long, default_value = "./adaptest-results")]
        output: PathBuf,

        /// Output format: json, html, all
        #[arg(long, default_value = "json")]
        format: String,

        /// Baseline report JSON to compare against
        #[arg(long)]
        baseline: Option<PathBuf>,

        /// Regression threshold
        #[arg(long, default_value = "0.02")]
        threshold: f64,

        /// Exit code 1 if regressions found
        #[arg(long)]
        fail_on_regression: bool,
    },

    /// Validate an item bank file
    Validate {
        /// Path to the item bank (default: from config)
        #[arg(long)]
        bank: Option<PathBuf>,
    },

    /// Create starter config and a synthetic item bank
    Init,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("adaptest_core=info,adaptest_sim=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Start {
            areas,
            min_items,
            max_items,
            key,
        } => commands::session::start(config, areas, min_items, max_items, key).await,
        Commands::Answer {
            session,
            item,
            correct,
        } => commands::session::answer(config, session, item, correct).await,
        Commands::Resume { session } => commands::session::resume(config, session).await,
        Commands::Report { session } => commands::session::report(config, session).await,
        Commands::Score { theta, se, items } => commands::score::execute(theta, se, items),
        Commands::Simulate {
            examinees,
            theta,
            theta_mean,
            theta_sd,
            seed,
            parallelism,
            bank,
            areas,
            min_items,
            max_items,
            output,
            format,
            baseline,
            threshold,
            fail_on_regression,
        } => {
            commands::simulate::execute(commands::simulate::SimulateArgs {
                examinees,
                theta,
                theta_mean,
                theta_sd,
                seed,
                parallelism,
                bank,
                areas,
                min_items,
                max_items,
                output,
                format,
                baseline,
                threshold,
                fail_on_regression,
                config,
            })
            .await
        }
        Commands::Validate { bank } => commands::validate::execute(bank, config),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
