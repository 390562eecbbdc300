//! Remote control channel: the leaf capability every other component talks through.

pub mod adb;
pub mod commands;
pub mod session;

use crate::error::SyncResult;
use async_trait::async_trait;
use std::path::Path;

pub use adb::AdbChannel;
pub use commands::Device;
pub use session::wait_for_device;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Issues commands to the device. Every call blocks its caller until the command
/// completes and never retries; a non-zero exit surfaces as `RemoteCommandFailed`.
#[async_trait]
pub trait RemoteChannel: Send + Sync {
    async fn execute(&self, args: &[String]) -> SyncResult<CommandOutput>;

    async fn push(&self, local: &Path, remote: &str) -> SyncResult<()>;

    async fn start_stream(&self, args: &[String]) -> SyncResult<Box<dyn LineStream>>;
}

/// A line-producing handle over a long-running remote command.
#[async_trait]
pub trait LineStream: Send {
    /// Next line of output, `None` once the stream has ended.
    async fn next_line(&mut self) -> SyncResult<Option<String>>;

    /// Kill the producer and wait for it to exit.
    async fn terminate(&mut self) -> SyncResult<()>;

    /// Non-blocking kill used when the handle is dropped without `terminate`.
    fn kill(&mut self);
}

/// Owns a [`LineStream`] and guarantees the producer is stopped on every exit path.
///
/// `close` terminates and joins; dropping an unclosed guard falls back to a kill.
pub struct StreamGuard {
    inner: Option<Box<dyn LineStream>>,
}

impl StreamGuard {
    pub fn new(stream: Box<dyn LineStream>) -> Self {
        Self {
            inner: Some(stream),
        }
    }

    pub async fn next_line(&mut self) -> SyncResult<Option<String>> {
        match self.inner.as_mut() {
            Some(stream) => stream.next_line().await,
            None => Ok(None),
        }
    }

    pub async fn close(mut self) -> SyncResult<()> {
        match self.inner.take() {
            Some(mut stream) => stream.terminate().await,
            None => Ok(()),
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if let Some(mut stream) = self.inner.take() {
            stream.kill();
        }
    }
}

pub(crate) fn args<I, S>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    parts.into_iter().map(Into::into).collect()
}
