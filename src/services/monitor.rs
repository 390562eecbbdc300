//! Completion signal monitors: decide whether the device accepted a transfer after
//! the confirm control was activated.

use crate::core::config::{CompletionMode, Config, Markers, StreamSource};
use crate::core::shutdown::Shutdown;
use crate::core::transfer::{Completion, TransferAttempt, TransferState};
use crate::device::{Device, StreamGuard};
use crate::error::SyncResult;
use crate::services::locator::{ElementQuery, Locator, Point};
use crate::services::toast_watcher::ToastWatcher;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const PROGRESS_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const NOTIFICATION_WAIT: Duration = Duration::from_secs(5);
/// Pause between opening the log stream and clicking, so the first lines are not missed.
pub const STREAM_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Activates the confirm control at `target` and waits for the outcome, moving
/// `attempt` to `AwaitCompletion` once the tap has gone through.
///
/// Timeouts and shutdown are outcomes, not errors. Errors are reserved for device
/// commands that failed outright.
#[async_trait]
pub trait CompletionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn activate_and_wait(
        &self,
        device: &Device,
        target: Point,
        timeout: Duration,
        shutdown: &Shutdown,
        attempt: &mut TransferAttempt,
    ) -> SyncResult<Completion>;
}

/// Picks the strategy named by the configuration.
pub fn strategy_for(config: &Config, locator: Locator) -> Box<dyn CompletionStrategy> {
    match config.completion_mode {
        CompletionMode::Polling => Box::new(PollingStrategy::new(locator, config.markers.clone())),
        CompletionMode::StreamTailing => Box::new(StreamTailingStrategy::new(
            config.stream_source,
            config.stream_markers().clone(),
        )),
    }
}

/// Waits for the progress indicator to disappear, then reads the transient
/// notification the app posts.
pub struct PollingStrategy {
    locator: Locator,
    markers: Markers,
    poll_interval: Duration,
    notification_wait: Duration,
}

impl PollingStrategy {
    pub fn new(locator: Locator, markers: Markers) -> Self {
        Self {
            locator,
            markers,
            poll_interval: PROGRESS_POLL_INTERVAL,
            notification_wait: NOTIFICATION_WAIT,
        }
    }

    async fn watch(
        &self,
        watcher: &ToastWatcher,
        timeout: Duration,
        shutdown: &Shutdown,
    ) -> Completion {
        let started = Instant::now();
        let progress = ElementQuery::by_text(&self.markers.progress);

        loop {
            match self.locator.exists(&progress).await {
                Ok(true) => debug!("transfer in progress"),
                Ok(false) => break,
                Err(e) => debug!("progress check failed: {}", e),
            }
            if started.elapsed() >= timeout {
                return Completion::TimedOut;
            }
            if !shutdown.sleep(self.poll_interval).await {
                return Completion::Interrupted;
            }
        }

        let wanted = [self.markers.success.as_str(), self.markers.failure.as_str()];
        let Some(message) = shutdown
            .guard(watcher.wait_for(&wanted, self.notification_wait))
            .await
        else {
            return Completion::Interrupted;
        };

        match message {
            Some(text) if text == self.markers.success => Completion::Succeeded,
            Some(text) => Completion::Failed(text),
            None => Completion::Failed(format!(
                "no notification after progress cleared (last seen: {:?})",
                watcher.latest()
            )),
        }
    }
}

#[async_trait]
impl CompletionStrategy for PollingStrategy {
    fn name(&self) -> &'static str {
        "polling"
    }

    async fn activate_and_wait(
        &self,
        device: &Device,
        target: Point,
        timeout: Duration,
        shutdown: &Shutdown,
        attempt: &mut TransferAttempt,
    ) -> SyncResult<Completion> {
        let watcher = ToastWatcher::start(device).await?;
        let outcome = match device.tap(target).await {
            Ok(()) => {
                attempt.advance(TransferState::AwaitCompletion);
                Ok(self.watch(&watcher, timeout, shutdown).await)
            }
            Err(e) => Err(e),
        };

        watcher.reset();
        if let Err(e) = watcher.stop().await {
            warn!("Failed to stop notification reader: {}", e);
        }
        outcome
    }
}

/// Tails a device stream (UI events or the log) for a success or failure marker.
pub struct StreamTailingStrategy {
    source: StreamSource,
    markers: Markers,
    settle_delay: Duration,
}

impl StreamTailingStrategy {
    pub fn new(source: StreamSource, markers: Markers) -> Self {
        Self {
            source,
            markers,
            settle_delay: STREAM_SETTLE_DELAY,
        }
    }

    async fn open(&self, device: &Device) -> SyncResult<StreamGuard> {
        match self.source {
            StreamSource::UiEvents => device.event_stream().await,
            StreamSource::Log => {
                device.clear_log().await?;
                device.log_stream().await
            }
        }
    }

    async fn tail(
        &self,
        stream: &mut StreamGuard,
        timeout: Duration,
        shutdown: &Shutdown,
    ) -> SyncResult<Completion> {
        let deadline = Instant::now() + timeout;
        loop {
            let next = tokio::select! {
                next = tokio::time::timeout_at(deadline, stream.next_line()) => next,
                _ = shutdown.wait() => return Ok(Completion::Interrupted),
            };
            match next {
                Err(_) => return Ok(Completion::TimedOut),
                Ok(Ok(Some(line))) => {
                    if line.contains(&self.markers.success) {
                        return Ok(Completion::Succeeded);
                    }
                    if line.contains(&self.markers.failure) {
                        return Ok(Completion::Failed(line.trim().to_string()));
                    }
                }
                Ok(Ok(None)) => {
                    return Ok(Completion::Failed(
                        "stream ended before a completion marker".to_string(),
                    ));
                }
                Ok(Err(e)) => return Err(e),
            }
        }
    }

    async fn run(
        &self,
        device: &Device,
        stream: &mut StreamGuard,
        target: Point,
        timeout: Duration,
        shutdown: &Shutdown,
        attempt: &mut TransferAttempt,
    ) -> SyncResult<Completion> {
        if !shutdown.sleep(self.settle_delay).await {
            return Ok(Completion::Interrupted);
        }
        device.tap(target).await?;
        attempt.advance(TransferState::AwaitCompletion);
        info!("Waiting for completion signal");
        self.tail(stream, timeout, shutdown).await
    }
}

#[async_trait]
impl CompletionStrategy for StreamTailingStrategy {
    fn name(&self) -> &'static str {
        "stream_tailing"
    }

    async fn activate_and_wait(
        &self,
        device: &Device,
        target: Point,
        timeout: Duration,
        shutdown: &Shutdown,
        attempt: &mut TransferAttempt,
    ) -> SyncResult<Completion> {
        let mut stream = self.open(device).await?;

        let outcome = self
            .run(device, &mut stream, target, timeout, shutdown, attempt)
            .await;

        if let Err(e) = stream.close().await {
            warn!("Failed to stop completion stream: {}", e);
        }
        // The log buffer can replay this attempt's lines into the next one.
        if self.source == StreamSource::Log
            && let Err(e) = device.clear_log().await
        {
            warn!("Failed to clear device log: {}", e);
        }
        outcome
    }
}
