/*!
 * bundle-relay CLI
 *
 * Routes one stored bundle per invocation. Settings come from the
 * environment, optionally layered over a TOML file given with --config.
 */

use bundle_relay::{
    config::{LogLevel, RelayConfig},
    core::{AesGcmEncryptor, TransferOrchestrator},
    error::{RelayError, Result, EXIT_SUCCESS},
    logging,
    protocol::s3::S3Client,
    ObjectRef,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "bundle-relay")]
#[command(version, about = "Tag-driven routing of storage bundles to the Voltron or CAT2 bucket", long_about = None)]
struct Cli {
    /// TOML configuration file (environment variables take precedence)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long = "log-level", value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Write JSON logs to this file instead of stderr
    #[arg(long = "log", value_name = "FILE", global = true)]
    log: Option<PathBuf>,

    /// Verbose output (debug level)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide and transfer one object
    Run {
        #[command(flatten)]
        target: TargetArgs,

        /// Print the full transfer report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the routing decision without moving anything
    Decide {
        #[command(flatten)]
        target: TargetArgs,

        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Bucket holding the source object
    #[arg(short = 'b', long)]
    bucket: String,

    /// Key of the source object
    #[arg(short = 'k', long)]
    key: String,
}

impl TargetArgs {
    fn object(&self) -> ObjectRef {
        ObjectRef::new(&self.bucket, &self.key)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Serialize)]
struct DecisionOutput {
    source: ObjectRef,
    policy: String,
    action: String,
    tags: Vec<String>,
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => RelayConfig::from_file(path)?,
        None => RelayConfig::from_env()?,
    };
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if cli.log.is_some() {
        config.log_file = cli.log.clone();
    }
    config.verbose |= cli.verbose;

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| RelayError::Config(format!("Failed to start async runtime: {}", e)))?;

    runtime.block_on(execute(cli.command, config))
}

async fn execute(command: Commands, config: RelayConfig) -> Result<i32> {
    let orchestrator = build_orchestrator(config).await?;

    match command {
        Commands::Run { target, json } => {
            let report = orchestrator.run(&target.object()).await?;
            if json {
                println!("{}", to_json(&report)?);
            } else {
                println!("{}", report.outcome);
            }
            Ok(report.outcome.exit_code())
        }
        Commands::Decide { target, json } => {
            let source = target.object();
            let (tags, action) = orchestrator.decide(&source).await?;
            if json {
                let output = DecisionOutput {
                    source,
                    policy: orchestrator.config().policy_flag.to_string(),
                    action: action.to_string(),
                    tags: tags.describe(),
                };
                println!("{}", to_json(&output)?);
            } else {
                println!("{}", action);
            }
            Ok(EXIT_SUCCESS)
        }
    }
}

/// Build the two store clients and the encryptor from settings
async fn build_orchestrator(config: RelayConfig) -> Result<TransferOrchestrator> {
    let source_store = S3Client::new(&config.source_store)
        .await
        .map_err(|e| RelayError::Config(format!("Failed to create source S3 client: {}", e)))?;
    let cat2_store = S3Client::new(&config.cat2_store)
        .await
        .map_err(|e| RelayError::Config(format!("Failed to create CAT2 S3 client: {}", e)))?;

    let encryptor = match config.encryption_key {
        Some(ref key) => Some(
            AesGcmEncryptor::from_base64(key)
                .map_err(|e| RelayError::Config(format!("Unusable encryption key: {}", e)))?,
        ),
        None => None,
    };

    let mut orchestrator =
        TransferOrchestrator::new(config, Arc::new(source_store), Arc::new(cat2_store));
    if let Some(encryptor) = encryptor {
        orchestrator = orchestrator.with_encryptor(Arc::new(encryptor));
    }
    Ok(orchestrator)
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| RelayError::Config(format!("Failed to serialise output: {}", e)))
}
