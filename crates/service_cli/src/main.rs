//! scriptmc - Command Line Pricing of Scripted Products
//!
//! Thin entry point: parses arguments, resolves the configuration, installs
//! the tracing subscriber and dispatches to `service_cli::commands`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use service_cli::commands::{self, OutputFormat};
use service_cli::config::{build_config, AppConfig, CliArgs};
use service_cli::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Monte Carlo pricing of scripted products with adjoint risks
#[derive(Parser)]
#[command(name = "scriptmc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path (TOML format)
    #[arg(short, long, global = true, value_name = "FILE", env = "SCRIPTMC_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Worker threads
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Price a product file
    Price {
        /// Path to the product file
        #[arg(short, long)]
        product: PathBuf,

        /// Number of Monte Carlo paths
        #[arg(long)]
        paths: Option<usize>,

        /// Seed of the random stream
        #[arg(long)]
        seed: Option<u64>,

        /// Payoff evaluator (exact, fuzzy, compiled)
        #[arg(long)]
        evaluator: Option<String>,

        /// Adjoint risks (noad, reverse)
        #[arg(long)]
        aad: Option<String>,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Dump the analysed and compiled form of a product file
    Parse {
        /// Path to the product file
        #[arg(short, long)]
        product: PathBuf,
    },

    /// Check system parallelism and the resolved configuration
    Check,
}

impl Cli {
    fn config_args(&self) -> CliArgs {
        let mut args = CliArgs {
            config_file: self.config.clone(),
            log_level: self.log_level.clone(),
            threads: self.threads,
            ..Default::default()
        };
        if let Commands::Price {
            paths,
            seed,
            evaluator,
            aad,
            ..
        } = &self.command
        {
            args.paths = *paths;
            args.seed = *seed;
            args.evaluator = evaluator.clone();
            args.aad = aad.clone();
        }
        args
    }
}

fn init_tracing(config: &AppConfig) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.as_filter_str())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<String> {
    let config = build_config(&cli.config_args())?;
    init_tracing(&config);
    tracing::debug!(?config, "configuration resolved");

    match cli.command {
        Commands::Price {
            product, format, ..
        } => commands::price::run(&product, &config, format.parse::<OutputFormat>()?),
        Commands::Parse { product } => commands::parse::run(&product),
        Commands::Check => commands::check::run(&config),
    }
}

fn main() -> std::process::ExitCode {
    match run(Cli::parse()) {
        Ok(output) => {
            print!("{}", output);
            std::process::ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::ExitCode::FAILURE
        }
    }
}
