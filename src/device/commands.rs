use super::{RemoteChannel, StreamGuard, args};
use crate::core::config::TargetApp;
use crate::error::{SyncError, SyncResult};
use crate::services::locator::Point;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

// Everything a URI path segment may not carry verbatim; '/' stays literal.
const URI_PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'\'')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'[')
    .add(b']')
    .add(b'&')
    .add(b';')
    .add(b'|')
    .add(b'\\')
    .add(b'$');

/// The device capability surface the pipeline needs, expressed as commands over a
/// [`RemoteChannel`]. Cheap to clone.
#[derive(Clone)]
pub struct Device {
    channel: Arc<dyn RemoteChannel>,
}

impl Device {
    pub fn new(channel: Arc<dyn RemoteChannel>) -> Self {
        Self { channel }
    }

    /// Trivial identifying query used as the reachability probe.
    pub async fn identify(&self) -> SyncResult<String> {
        let out = self
            .channel
            .execute(&args(["shell", "getprop", "ro.product.model"]))
            .await?;
        let model = out.stdout.trim();
        if model.is_empty() {
            return Err(SyncError::DeviceUnreachable(
                "device returned an empty model".to_string(),
            ));
        }
        Ok(model.to_string())
    }

    /// Size in bytes of `remote`, `None` when the file is absent or unreadable.
    pub async fn file_size(&self, remote: &str) -> SyncResult<Option<u64>> {
        let cmd = format!("stat -c %s {}", shell_quote(remote));
        match self.channel.execute(&args(["shell".to_string(), cmd])).await {
            Ok(out) => Ok(out.stdout.trim().parse::<u64>().ok()),
            Err(SyncError::RemoteCommandFailed { stderr, .. }) => {
                debug!("{}: no remote size ({})", remote, stderr);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn push(&self, local: &Path, remote: &str) -> SyncResult<()> {
        self.channel.push(local, remote).await
    }

    pub async fn delete(&self, remote: &str) -> SyncResult<()> {
        let cmd = format!("rm {}", shell_quote(remote));
        self.channel
            .execute(&args(["shell".to_string(), cmd]))
            .await
            .map(|_| ())
    }

    pub async fn force_stop(&self, package: &str) -> SyncResult<()> {
        self.channel
            .execute(&args(["shell", "am", "force-stop", package]))
            .await
            .map(|_| ())
    }

    /// Hands `remote` to the target application's ingest activity.
    pub async fn send_to_app(&self, app: &TargetApp, remote: &str) -> SyncResult<String> {
        let component = format!("{}/{}", app.package, app.activity);
        let uri = file_uri(remote);
        let out = self
            .channel
            .execute(&args([
                "shell".to_string(),
                "am".to_string(),
                "start".to_string(),
                "-a".to_string(),
                app.action.clone(),
                "-t".to_string(),
                app.mime_type.clone(),
                "-n".to_string(),
                component,
                "--eu".to_string(),
                "android.intent.extra.STREAM".to_string(),
                shell_quote(&uri),
            ]))
            .await?;
        // `am start` reports some failures on stdout with a zero exit status
        if out.stdout.contains("Error:") {
            return Err(SyncError::remote_failed("am start", "0", out.stdout.trim()));
        }
        Ok(out.stdout)
    }

    pub async fn tap(&self, point: Point) -> SyncResult<()> {
        self.channel
            .execute(&args([
                "shell".to_string(),
                "input".to_string(),
                "tap".to_string(),
                point.x.to_string(),
                point.y.to_string(),
            ]))
            .await
            .map(|_| ())
    }

    /// Raw output of a UI hierarchy dump, markers included.
    pub async fn dump_ui(&self) -> SyncResult<String> {
        let out = self
            .channel
            .execute(&args(["exec-out", "uiautomator dump /dev/tty"]))
            .await?;
        Ok(out.stdout)
    }

    pub async fn clear_log(&self) -> SyncResult<()> {
        self.channel
            .execute(&args(["logcat", "-c"]))
            .await
            .map(|_| ())
    }

    pub async fn log_stream(&self) -> SyncResult<StreamGuard> {
        let stream = self.channel.start_stream(&args(["logcat"])).await?;
        Ok(StreamGuard::new(stream))
    }

    pub async fn event_stream(&self) -> SyncResult<StreamGuard> {
        let stream = self
            .channel
            .start_stream(&args(["shell", "uiautomator", "events"]))
            .await?;
        Ok(StreamGuard::new(stream))
    }
}

pub fn file_uri(remote: &str) -> String {
    format!("file://{}", utf8_percent_encode(remote, URI_PATH))
}

/// Single-quote `s` for the device shell.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
