use anyhow::Result;
use clap::{ArgGroup, Parser, ValueEnum};
use dropship::core::config::{CompletionMode, Config, StreamSource};
use dropship::logging;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Polling,
    Stream,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Source {
    UiEvents,
    Log,
}

/// Watch a directory and upload every new file through an adb-attached device.
#[derive(Debug, Parser)]
#[command(version, about)]
#[command(group(ArgGroup::new("local").args(["keep_local", "delete_local"])))]
struct Args {
    /// Directory to watch
    dir: Option<PathBuf>,

    /// JSON config file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial of the device to use (default: the only attached device)
    #[arg(short, long)]
    serial: Option<String>,

    /// Keep local files after a successful upload
    #[arg(short = 'k', long)]
    keep_local: bool,

    /// Delete local files after a successful upload
    #[arg(long)]
    delete_local: bool,

    /// Do not record successful uploads in the ledger
    #[arg(long)]
    skip_ledger: bool,

    /// Ledger file (one uploaded file name per line)
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// SQLite catalog of files already present remotely
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Seconds to wait for the upload to finish
    #[arg(long)]
    timeout: Option<u64>,

    /// How completion is detected
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Stream read in stream mode
    #[arg(long, value_enum)]
    source: Option<Source>,

    /// Log level or filter directive (RUST_LOG takes precedence)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<Config> {
        let mut cfg = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(dir) = self.dir {
            cfg.watched_directory = dir;
        }
        if self.serial.is_some() {
            cfg.device_serial = self.serial;
        }
        if self.keep_local {
            cfg.delete_local_on_success = Some(false);
        }
        if self.delete_local {
            cfg.delete_local_on_success = Some(true);
        }
        if self.skip_ledger {
            cfg.skip_ledger_write = true;
        }
        if let Some(ledger) = self.ledger {
            cfg.ledger_path = ledger;
        }
        if self.catalog.is_some() {
            cfg.remote_catalog_path = self.catalog;
        }
        if let Some(timeout) = self.timeout {
            cfg.completion_timeout_secs = timeout;
        }
        if let Some(mode) = self.mode {
            cfg.completion_mode = match mode {
                Mode::Polling => CompletionMode::Polling,
                Mode::Stream => CompletionMode::StreamTailing,
            };
        }
        if let Some(source) = self.source {
            cfg.stream_source = match source {
                Source::UiEvents => StreamSource::UiEvents,
                Source::Log => StreamSource::Log,
            };
        }
        if let Some(level) = self.log_level {
            cfg.log_level = level;
        }
        if self.log_file.is_some() {
            cfg.log_file = self.log_file;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Args::parse().into_config()?;
    let _guard = logging::init(&cfg.log_level, cfg.log_file.as_deref());

    tracing::info!("Starting dropship...");
    dropship::run_forever(cfg).await
}
