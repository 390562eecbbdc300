use crate::core::config::Config;
use crate::core::shutdown::Shutdown;
use crate::core::transfer::{PendingFile, TransferOutcome};
use crate::device::{AdbChannel, Device, RemoteChannel, wait_for_device};
use crate::error::SyncResult;
use crate::services::catalog::{RemoteCatalog, SqliteCatalog};
use crate::services::discovery::{self, Discovery};
use crate::services::ledger::Ledger;
use crate::services::locator::{Locator, Point};
use crate::services::monitor;
use crate::services::pipeline::{Pipeline, PipelineOptions};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Pause after every pass, and after a pass that failed outright.
pub const RESCAN_INTERVAL: Duration = Duration::from_secs(30);

/// Tally of one discovery + transfer pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub pending: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub errors: usize,
    pub interrupted: bool,
}

/// Long-lived daemon state: the device handle, the transfer pipeline with its cached
/// confirm position, and the exclusion sources. Built once at startup.
pub struct Coordinator {
    config: Arc<Config>,
    device: Device,
    pipeline: Pipeline,
    catalog: Option<Box<dyn RemoteCatalog>>,
    shutdown: Shutdown,
    last_processed: Option<String>,
}

impl Coordinator {
    pub fn new(config: Config, channel: Arc<dyn RemoteChannel>, shutdown: Shutdown) -> Result<Self> {
        let options = PipelineOptions::from_config(&config)?;
        let device = Device::new(channel);
        let strategy = monitor::strategy_for(&config, Locator::new(device.clone()));
        info!("Completion detection: {}", strategy.name());

        let ledger = Ledger::new(&config.ledger_path);
        let pipeline = Pipeline::new(device.clone(), strategy, ledger, options);

        let catalog = config.remote_catalog_path.as_ref().map(|path| {
            info!("Using remote catalog {:?}", path);
            Box::new(SqliteCatalog::new(path, config.remote_catalog_query.clone()))
                as Box<dyn RemoteCatalog>
        });

        Ok(Self {
            config: Arc::new(config),
            device,
            pipeline,
            catalog,
            shutdown,
            last_processed: None,
        })
    }

    pub fn with_catalog(mut self, catalog: Box<dyn RemoteCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        self.pipeline.ledger()
    }

    pub fn confirm_point(&self) -> Option<Point> {
        self.pipeline.confirm_point()
    }

    pub fn last_processed(&self) -> Option<&str> {
        self.last_processed.as_deref()
    }

    /// Names that must not be transferred again: ledger plus remote catalog.
    pub fn excluded_names(&self) -> Result<HashSet<String>> {
        let mut names = self.ledger().load_all().context("load ledger")?;
        if let Some(catalog) = &self.catalog {
            let remote = catalog.file_names().context("query remote catalog")?;
            names.extend(remote);
        }
        Ok(names)
    }

    pub fn discover_pending(&self) -> Result<Discovery> {
        let excluded = self.excluded_names()?;
        discovery::discover(&self.config.watched_directory, &excluded)
    }

    pub async fn transfer_one(&mut self, file: &PendingFile) -> SyncResult<TransferOutcome> {
        let outcome = self.pipeline.transfer_one(file, &self.shutdown).await;
        self.last_processed = Some(file.name.clone());
        outcome
    }

    /// One pass: wait for the device, discover, then attempt every pending file once.
    /// Per-file errors are logged and counted; only discovery failures are returned.
    pub async fn process_cycle(&mut self) -> Result<CycleReport> {
        let mut report = CycleReport::default();
        if wait_for_device(&self.device, &self.shutdown).await.is_none() {
            report.interrupted = true;
            return Ok(report);
        }

        let files = match self.discover_pending()? {
            Discovery::NothingFound => {
                info!(
                    "Empty dir, checking again in {}s",
                    RESCAN_INTERVAL.as_secs()
                );
                return Ok(report);
            }
            Discovery::AllTransferred { known } => {
                info!(
                    "No new files to upload ({} already uploaded), checking again in {}s",
                    known,
                    RESCAN_INTERVAL.as_secs()
                );
                return Ok(report);
            }
            Discovery::Pending(files) => files,
        };

        report.pending = files.len();
        info!("{} file(s) to upload", files.len());
        for file in &files {
            if self.shutdown.is_triggered() {
                report.interrupted = true;
                break;
            }
            match self.transfer_one(file).await {
                Ok(TransferOutcome::Succeeded { .. }) => report.succeeded += 1,
                Ok(TransferOutcome::Failed(_)) => report.failed += 1,
                Ok(TransferOutcome::TimedOut) => report.timed_out += 1,
                Ok(TransferOutcome::Interrupted) => {
                    report.interrupted = true;
                    break;
                }
                Err(e) => {
                    error!("{} failed: {}", file.name, e);
                    report.errors += 1;
                }
            }
        }

        info!(
            "Pass done: {} uploaded, {} failed, {} timed out, {} errors",
            report.succeeded, report.failed, report.timed_out, report.errors
        );
        Ok(report)
    }

    /// Runs passes until shutdown. Never returns on a recoverable error.
    pub async fn run(&mut self) {
        loop {
            match self.process_cycle().await {
                Ok(report) if report.interrupted => break,
                Ok(_) => {}
                Err(e) => error!(critical = true, "Watch pass failed: {:#}", e),
            }
            if !self.shutdown.sleep(RESCAN_INTERVAL).await {
                break;
            }
        }
        info!("Watch loop stopped");
    }
}

/// Watches `config.watched_directory` forever through an adb-attached device.
/// Returns once Ctrl-C has been handled and the in-flight attempt has cleaned up.
pub async fn run_forever(config: Config) -> Result<()> {
    let (trigger, shutdown) = Shutdown::new();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping after cleanup");
                trigger.trigger();
            }
            Err(e) => warn!("Cannot listen for interrupt: {}", e),
        }
    });

    let channel: Arc<dyn RemoteChannel> = Arc::new(AdbChannel::new(config.device_serial()));
    let mut coordinator = Coordinator::new(config, channel, shutdown)?;
    info!(
        "Watching {:?}",
        coordinator.config().watched_directory
    );
    coordinator.run().await;
    Ok(())
}
