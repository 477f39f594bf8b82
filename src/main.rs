use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use course_records_pipeline::config::AppConfig;
use course_records_pipeline::intake;
use course_records_pipeline::orchestrator::{FileState, Orchestrator};

#[derive(Parser)]
#[command(name = "course-pipeline")]
#[command(about = "Summarizes course-completion CSV files into JSON views", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Overrides {
    /// TOML config file
    #[arg(long, global = true, env = "COURSE_PIPELINE_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    input: Option<PathBuf>,
    #[arg(long, global = true)]
    done: Option<PathBuf>,
    #[arg(long, global = true)]
    error: Option<PathBuf>,
    #[arg(long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the input, done, error and output folders
    InitDirs,
    /// Poll the input folder until interrupted
    Run {
        /// Delay between scans, overrides the config file
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Scan the input folder once and exit
    Tick,
    /// Queue a CSV file for processing
    Submit {
        #[arg(long)]
        file: PathBuf,
    },
}

impl Overrides {
    fn apply(self, config: &mut AppConfig) {
        let folders = &mut config.folders;
        if let Some(path) = self.input {
            folders.input = path;
        }
        if let Some(path) = self.done {
            folders.done = path;
        }
        if let Some(path) = self.error {
            folders.error = path;
        }
        if let Some(path) = self.output {
            folders.output = path;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "course_records_pipeline=info,course_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.overrides.config.as_deref())?;
    cli.overrides.apply(&mut config);

    match cli.command {
        Commands::InitDirs => {
            config.folders.ensure_exists()?;
            println!("Folders ready.");
        }
        Commands::Run { interval_ms } => {
            if let Some(ms) = interval_ms {
                anyhow::ensure!(ms > 0, "--interval-ms must be positive");
                config.poll_interval_ms = ms;
            }
            config.folders.ensure_exists()?;
            let orchestrator = Arc::new(Orchestrator::new(&config));
            let shutdown = async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    tracing::error!(%err, "failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            };
            orchestrator.run(config.poll_interval(), shutdown).await?;
            info!("File watcher stopped");
        }
        Commands::Tick => {
            config.folders.ensure_exists()?;
            let orchestrator = Orchestrator::new(&config);
            let report = tokio::task::spawn_blocking(move || orchestrator.tick())
                .await
                .context("tick task panicked")?;

            if let Some(err) = &report.scan_error {
                anyhow::bail!("failed to scan input folder: {err}");
            }
            if report.outcomes.is_empty() {
                println!("No CSV files found.");
                return Ok(());
            }
            for outcome in &report.outcomes {
                match &outcome.state {
                    FileState::Succeeded { output_dir } => {
                        println!("- {} processed into {}", outcome.file_name, output_dir.display())
                    }
                    FileState::Failed { reason } => {
                        println!("- {} failed: {}", outcome.file_name, reason)
                    }
                }
            }
        }
        Commands::Submit { file } => {
            std::fs::create_dir_all(&config.folders.input)?;
            let target = intake::submit(&file, &config.folders.input)
                .with_context(|| format!("failed to submit {}", file.display()))?;
            println!("{} ({})", intake::ACCEPTED, target.display());
        }
    }

    Ok(())
}
