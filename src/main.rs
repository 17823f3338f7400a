use clap::Parser;
use std::path::PathBuf;
use unilog::Pipeline;
use unilog_core::config::Config;

#[derive(Parser)]
#[command(name = "unilog", about = "Unified log ingestion: tail, normalise, deduplicate, persist")]
struct Cli {
    /// Log directory of the primary (JSON) service.
    #[arg(long)]
    primary: Option<PathBuf>,
    /// Log directory of the secondary (JSON / access-log) service.
    #[arg(long)]
    secondary: Option<PathBuf>,
    /// Directory holding the weekly partition files.
    #[arg(long)]
    storage: Option<PathBuf>,
    /// Config file (default: ~/.config/unilog/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log at debug level.
    #[arg(long)]
    debug: bool,
    /// Write logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Ingest what is already on disk, then exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(primary) = cli.primary {
        config.sources.primary = primary;
    }
    if let Some(secondary) = cli.secondary {
        config.sources.secondary = secondary;
    }
    if let Some(storage) = cli.storage {
        config.storage.base_dir = storage;
    }

    if cli.once {
        let totals = Pipeline::run_once(config).await?;
        println!(
            "ingested {} new events ({} duplicates, {} rejected, {} failed, {} dropped)",
            totals.accepted, totals.duplicates, totals.rejected, totals.failed, totals.dropped
        );
        return Ok(());
    }

    let pipeline = Pipeline::start(config).await?;
    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupt received; shutting down");
    pipeline.shutdown().await;
    Ok(())
}

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let default_level = if cli.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_env_filter(filter)
                .init();
            tracing::info!("unilog log started; tail -f {}", path.display());
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
    }
    Ok(())
}
