//! tsimport - import timestamped files into a time-series store

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tsimport_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use tsimport_ingest::{
    catalog::DateRange, config::IngestConfig, gateway::QuestDbGateway, pipeline::Pipeline, status,
};

#[derive(Parser, Debug)]
#[command(name = "tsimport")]
#[command(author, version, about = "Import timestamped files into QuestDB and optionally delete them afterwards")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Store HTTP endpoint
    #[arg(long, global = true)]
    store_url: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Import new files from the base directory
    Import {
        /// Root of the directory tree to import
        #[arg(short, long)]
        base_dir: Option<PathBuf>,

        /// First day to import (YYYY-MM-DD); all earlier files are ignored
        #[arg(long)]
        start_date: Option<String>,

        /// Last day to import (YYYY-MM-DD), inclusive
        #[arg(long)]
        end_date: Option<String>,

        /// Delete files after successful import
        #[arg(long)]
        delete: bool,

        /// Import state file
        #[arg(long)]
        state_file: Option<PathBuf>,

        /// Files per batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Submission attempts per batch and table
        #[arg(long)]
        max_retries: Option<u32>,
    },

    /// Show imported tables and their time coverage
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Info })
        .output(match cli.command {
            Command::Import { .. } => LogOutput::Both,
            Command::Status => LogOutput::Console,
        })
        .log_file_prefix("tsimport")
        .build();

    let log_config = match log_config.with_env_overrides() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        },
    };
    let _guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        },
    };

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = IngestConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.store_url {
        config.store_url = url;
    }

    match cli.command {
        Command::Import {
            base_dir,
            start_date,
            end_date,
            delete,
            state_file,
            batch_size,
            max_retries,
        } => {
            if let Some(dir) = base_dir {
                config.base_dir = dir;
            }
            if let Some(file) = state_file {
                config.state_file = file;
            }
            if let Some(size) = batch_size {
                config.batch_size = size;
            }
            if let Some(retries) = max_retries {
                config.max_retries = retries;
            }
            config.delete_after_import |= delete;
            config.validate()?;

            let range = DateRange::parse(start_date.as_deref(), end_date.as_deref())?;
            let gateway = QuestDbGateway::new(config.store_url.clone(), config.request_timeout())?;

            let report = Pipeline::new(&config, &gateway, range)
                .run()
                .await
                .context("Import aborted")?;

            info!(?report, "Run summary");
            if report.is_catastrophic() {
                error!("Every delivery failed; nothing was imported");
                return Ok(ExitCode::FAILURE);
            }
            if report.has_failures() {
                warn!(
                    failed_prefixes = report.prefixes_failed,
                    "Some prefixes were not imported; rerun to retry them"
                );
            }
            Ok(ExitCode::SUCCESS)
        },

        Command::Status => {
            let gateway = QuestDbGateway::new(config.store_url.clone(), config.request_timeout())?;
            let statuses = status::collect(&gateway)
                .await
                .context("Cannot read store status")?;
            print!("{}", status::render(&statuses));
            Ok(ExitCode::SUCCESS)
        },
    }
}
