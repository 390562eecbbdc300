//! Per-file transfer state machine:
//! size check, push, trigger, locate, activate, await completion, clean up.

use crate::core::config::{Config, TargetApp};
use crate::core::shutdown::Shutdown;
use crate::core::transfer::{
    Completion, FailureReason, PendingFile, TransferAttempt, TransferOutcome, TransferState,
};
use crate::device::Device;
use crate::error::{SyncError, SyncResult};
use crate::services::ledger::Ledger;
use crate::services::locator::{ElementQuery, Locator, Point};
use crate::services::monitor::CompletionStrategy;
use crate::utils::format_bytes;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub remote_dir: String,
    pub target_app: TargetApp,
    pub confirm_control: ElementQuery,
    pub locate_timeout: Duration,
    pub completion_timeout: Duration,
    pub delete_local_on_success: bool,
    pub skip_ledger_write: bool,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            remote_dir: config.remote_dir.clone(),
            target_app: config.target_app.clone(),
            confirm_control: config.confirm_query()?,
            locate_timeout: config.locate_timeout(),
            completion_timeout: config.completion_timeout(),
            delete_local_on_success: config.delete_local_on_success.unwrap_or(false),
            skip_ledger_write: config.skip_ledger_write,
        })
    }

    pub fn remote_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.remote_dir.trim_end_matches('/'), file_name)
    }
}

pub struct Pipeline {
    device: Device,
    locator: Locator,
    strategy: Box<dyn CompletionStrategy>,
    ledger: Ledger,
    options: PipelineOptions,
    /// Confirm control position; stable for a device/app version, so resolved once.
    confirm_point: Option<Point>,
}

impl Pipeline {
    pub fn new(
        device: Device,
        strategy: Box<dyn CompletionStrategy>,
        ledger: Ledger,
        options: PipelineOptions,
    ) -> Self {
        Self {
            locator: Locator::new(device.clone()),
            device,
            strategy,
            ledger,
            options,
            confirm_point: None,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn confirm_point(&self) -> Option<Point> {
        self.confirm_point
    }

    /// Runs one attempt for `file`.
    ///
    /// Device rejections, a missing confirm control and timeouts come back as
    /// outcomes. Errors mean a remote command or the ledger write failed.
    pub async fn transfer_one(
        &mut self,
        file: &PendingFile,
        shutdown: &Shutdown,
    ) -> SyncResult<TransferOutcome> {
        let mut attempt = TransferAttempt::new(file);
        let remote = self.options.remote_path(&file.name);

        attempt.advance(TransferState::SizeCheck);
        let remote_size = self.device.file_size(&remote).await?;
        let pushed = if remote_size == Some(file.size) {
            info!("{} already on device ({}), skipping push", file.name, format_bytes(file.size));
            false
        } else {
            attempt.advance(TransferState::Push);
            info!("{} pushing to device ({})", file.name, format_bytes(file.size));
            self.device.push(&file.path, &remote).await?;
            true
        };

        attempt.advance(TransferState::TriggerAction);
        info!("{} starting upload", file.name);
        self.device.force_stop(&self.options.target_app.package).await?;
        let out = self.device.send_to_app(&self.options.target_app, &remote).await?;
        if !out.trim().is_empty() {
            debug!("{}", out.trim());
        }

        attempt.advance(TransferState::LocateControl);
        let Some(found) = self
            .locator
            .wait_for(
                &self.options.confirm_control,
                self.options.locate_timeout,
                shutdown,
            )
            .await
        else {
            attempt.advance(TransferState::Failed);
            if shutdown.is_triggered() {
                return Ok(TransferOutcome::Interrupted);
            }
            warn!("{}: {}", file.name, FailureReason::ControlNotFound);
            return Ok(TransferOutcome::Failed(FailureReason::ControlNotFound));
        };
        let target = *self.confirm_point.get_or_insert(found);

        attempt.advance(TransferState::Activate);
        debug!(
            "{} activating confirm control at {:?} via {}",
            file.name,
            target,
            self.strategy.name()
        );
        let completion = self
            .strategy
            .activate_and_wait(
                &self.device,
                target,
                self.options.completion_timeout,
                shutdown,
                &mut attempt,
            )
            .await?;

        match completion {
            Completion::Succeeded => {
                info!("{} upload complete", file.name);
                self.finish(file)?;
                self.device.delete(&remote).await?;
                info!("{} deleted from device", file.name);
                attempt.advance(TransferState::Succeeded);
                Ok(TransferOutcome::Succeeded { pushed })
            }
            Completion::Failed(reason) => {
                attempt.advance(TransferState::Failed);
                warn!("{} upload failed: {}", file.name, reason);
                Ok(TransferOutcome::Failed(FailureReason::Rejected(reason)))
            }
            Completion::TimedOut => {
                attempt.advance(TransferState::Failed);
                warn!(
                    "{} timed out after {}s waiting for completion",
                    file.name,
                    self.options.completion_timeout.as_secs()
                );
                Ok(TransferOutcome::TimedOut)
            }
            Completion::Interrupted => {
                attempt.advance(TransferState::Failed);
                info!("{} interrupted by shutdown", file.name);
                Ok(TransferOutcome::Interrupted)
            }
        }
    }

    // The ledger entry is written before anything is deleted.
    fn finish(&self, file: &PendingFile) -> SyncResult<()> {
        if !self.options.skip_ledger_write {
            self.ledger.append(&file.name)?;
        }
        if self.options.delete_local_on_success {
            info!("{} deleting from host", file.name);
            std::fs::remove_file(&file.path).map_err(SyncError::Io)?;
        }
        Ok(())
    }
}
