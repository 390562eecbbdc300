use crate::device::{Device, StreamGuard};
use crate::error::SyncResult;
use crate::utils::lock_mutex;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

const NOTIFICATION_EVENT: &str = "TYPE_NOTIFICATION_STATE_CHANGED";

/// Text of a notification-state event line from the UI event stream, e.g.
/// `EventType: TYPE_NOTIFICATION_STATE_CHANGED; ... Text: [Upload complete]; ...`.
pub fn parse_notification(line: &str) -> Option<String> {
    if !line.contains(NOTIFICATION_EVENT) {
        return None;
    }
    let start = line.find("Text: [")? + "Text: [".len();
    let end = line[start..].find(']')? + start;
    let text = line[start..end].trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Collects transient notifications from the UI event stream in the background.
pub struct ToastWatcher {
    messages: Arc<Mutex<Vec<String>>>,
    arrived: Arc<Notify>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<SyncResult<()>>>,
}

impl ToastWatcher {
    pub async fn start(device: &Device) -> SyncResult<Self> {
        let stream = device.event_stream().await?;
        let messages = Arc::new(Mutex::new(Vec::new()));
        let arrived = Arc::new(Notify::new());
        let (stop_tx, stop_rx) = oneshot::channel();

        let task = tokio::spawn(Self::pump(
            stream,
            messages.clone(),
            arrived.clone(),
            stop_rx,
        ));

        Ok(Self {
            messages,
            arrived,
            stop_tx: Some(stop_tx),
            task: Some(task),
        })
    }

    async fn pump(
        mut stream: StreamGuard,
        messages: Arc<Mutex<Vec<String>>>,
        arrived: Arc<Notify>,
        mut stop_rx: oneshot::Receiver<()>,
    ) -> SyncResult<()> {
        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                line = stream.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(text) = parse_notification(&line) {
                            debug!("notification: {}", text);
                            lock_mutex(&messages).push(text);
                            arrived.notify_one();
                        }
                    }
                    Ok(None) => {
                        debug!("UI event stream ended");
                        break;
                    }
                    Err(e) => {
                        warn!("UI event stream failed: {}", e);
                        break;
                    }
                },
            }
        }
        stream.close().await
    }

    /// Most recent notification received since the last reset whose text equals one
    /// of `wanted`, waiting up to `wait` for one to arrive. Other notifications are ignored.
    pub async fn wait_for(&self, wanted: &[&str], wait: Duration) -> Option<String> {
        let deadline = Instant::now() + wait;
        loop {
            let hit = {
                let messages = lock_mutex(&self.messages);
                messages
                    .iter()
                    .rev()
                    .find(|m| wanted.contains(&m.as_str()))
                    .cloned()
            };
            if hit.is_some() {
                return hit;
            }
            if tokio::time::timeout_at(deadline, self.arrived.notified())
                .await
                .is_err()
            {
                return None;
            }
        }
    }

    pub fn latest(&self) -> Option<String> {
        lock_mutex(&self.messages).last().cloned()
    }

    /// Forget everything received so far.
    pub fn reset(&self) {
        lock_mutex(&self.messages).clear();
    }

    /// Stops the reader and waits for the stream process to exit.
    pub async fn stop(mut self) -> SyncResult<()> {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        match self.task.take() {
            Some(task) => match task.await {
                Ok(res) => res,
                Err(e) => {
                    warn!("Notification reader task failed: {}", e);
                    Ok(())
                }
            },
            None => Ok(()),
        }
    }
}

impl Drop for ToastWatcher {
    fn drop(&mut self) {
        // Aborting drops the task's StreamGuard, which kills the stream process.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
