use crate::services::locator::ElementQuery;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIRM_CONTROL: &str = r#"//*[@resource-id="com.google.android.apps.photos:id/upload_button" and @clickable="true" and @enabled="true"]"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMode {
    /// Watch the progress indicator, then read the transient notification.
    Polling,
    /// Tail the device log for a success or failure marker.
    StreamTailing,
}

/// Where stream tailing reads its completion lines from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamSource {
    /// `uiautomator events`; the app's toasts show up here.
    #[default]
    UiEvents,
    /// `logcat`, matched against `log_markers`.
    Log,
}

/// The remote application that ingests pushed files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetApp {
    pub package: String,
    pub activity: String,
    pub action: String,
    pub mime_type: String,
}

impl Default for TargetApp {
    fn default() -> Self {
        Self {
            package: "com.google.android.apps.photos".to_string(),
            activity: ".upload.intent.UploadContentActivity".to_string(),
            action: "android.intent.action.SEND".to_string(),
            mime_type: "application/octet-stream".to_string(),
        }
    }
}

/// Texts that identify the outcome of a transfer on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Markers {
    pub success: String,
    pub failure: String,
    /// Text of the on-screen element present while a transfer is running.
    pub progress: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            success: "Upload complete".to_string(),
            failure: "Error, could not upload media".to_string(),
            progress: "Uploading…".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// May come from the command line instead; `validate` requires it.
    #[serde(default)]
    pub watched_directory: PathBuf,
    #[serde(default)]
    pub device_serial: Option<String>,
    #[serde(default = "default_completion_timeout_secs")]
    pub completion_timeout_secs: u64,
    #[serde(default = "default_locate_timeout_secs")]
    pub locate_timeout_secs: u64,
    #[serde(default)]
    pub remote_catalog_path: Option<PathBuf>,
    #[serde(default = "default_remote_catalog_query")]
    pub remote_catalog_query: String,
    /// Must be set explicitly; `validate` rejects `None`.
    #[serde(default)]
    pub delete_local_on_success: Option<bool>,
    #[serde(default)]
    pub skip_ledger_write: bool,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    #[serde(default = "default_remote_dir")]
    pub remote_dir: String,
    #[serde(default = "default_completion_mode")]
    pub completion_mode: CompletionMode,
    #[serde(default)]
    pub target_app: TargetApp,
    #[serde(default = "default_confirm_control")]
    pub confirm_control: String,
    #[serde(default)]
    pub stream_source: StreamSource,
    #[serde(default)]
    pub markers: Markers,
    /// Used instead of `markers` when tailing the device log.
    #[serde(default)]
    pub log_markers: Markers,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_completion_timeout_secs() -> u64 {
    3000
}
fn default_locate_timeout_secs() -> u64 {
    60
}
fn default_remote_catalog_query() -> String {
    "SELECT filename FROM remote_media".to_string()
}
fn default_ledger_path() -> PathBuf {
    PathBuf::from("uploaded.txt")
}
fn default_remote_dir() -> String {
    "/sdcard/DCIM".to_string()
}
fn default_completion_mode() -> CompletionMode {
    CompletionMode::StreamTailing
}
fn default_confirm_control() -> String {
    DEFAULT_CONFIRM_CONTROL.to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watched_directory: PathBuf::new(),
            device_serial: None,
            completion_timeout_secs: default_completion_timeout_secs(),
            locate_timeout_secs: default_locate_timeout_secs(),
            remote_catalog_path: None,
            remote_catalog_query: default_remote_catalog_query(),
            delete_local_on_success: None,
            skip_ledger_write: false,
            ledger_path: default_ledger_path(),
            remote_dir: default_remote_dir(),
            completion_mode: default_completion_mode(),
            target_app: TargetApp::default(),
            confirm_control: default_confirm_control(),
            stream_source: StreamSource::default(),
            markers: Markers::default(),
            log_markers: Markers::default(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config {:?}", path))?;
        let cfg: Config =
            serde_json::from_str(&raw).with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.watched_directory.as_os_str().is_empty() {
            anyhow::bail!("watched_directory is required");
        }
        if self.completion_timeout_secs == 0 {
            anyhow::bail!("completion_timeout_secs must be > 0");
        }
        if self.locate_timeout_secs == 0 {
            anyhow::bail!("locate_timeout_secs must be > 0");
        }
        if self.delete_local_on_success.is_none() {
            anyhow::bail!(
                "delete_local_on_success must be set explicitly (--keep-local or --delete-local)"
            );
        }
        if self.remote_dir.trim().is_empty() {
            anyhow::bail!("remote_dir must not be empty");
        }
        self.confirm_query()?;
        Ok(())
    }

    pub fn confirm_query(&self) -> Result<ElementQuery> {
        self.confirm_control
            .parse::<ElementQuery>()
            .context("confirm_control")
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }

    pub fn locate_timeout(&self) -> Duration {
        Duration::from_secs(self.locate_timeout_secs)
    }

    /// Markers that apply to the stream the configured mode reads.
    pub fn stream_markers(&self) -> &Markers {
        match self.stream_source {
            StreamSource::UiEvents => &self.markers,
            StreamSource::Log => &self.log_markers,
        }
    }

    pub fn device_serial(&self) -> Option<&str> {
        self.device_serial
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            watched_directory: PathBuf::from("/data/outbox"),
            delete_local_on_success: Some(false),
            ..Config::default()
        }
    }

    #[test]
    fn test_defaults_validate_once_required_fields_set() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_delete_local_choice_is_required() {
        let cfg = Config {
            delete_local_on_success: None,
            ..valid()
        };
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("delete_local_on_success"));
    }

    #[test]
    fn test_missing_watch_dir_rejected() {
        let cfg = Config {
            watched_directory: PathBuf::new(),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_bad_confirm_query_rejected() {
        let cfg = Config {
            confirm_control: "button".to_string(),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_blank_serial_means_any_device() {
        let cfg = Config {
            device_serial: Some("   ".to_string()),
            ..valid()
        };
        assert_eq!(cfg.device_serial(), None);
    }

    #[test]
    fn test_minimal_json_fills_defaults() -> Result<()> {
        let cfg: Config = serde_json::from_str(
            r#"{"watched_directory": "/tmp/in", "delete_local_on_success": true, "completion_mode": "polling"}"#,
        )?;
        assert_eq!(cfg.completion_timeout_secs, 3000);
        assert_eq!(cfg.locate_timeout_secs, 60);
        assert_eq!(cfg.completion_mode, CompletionMode::Polling);
        assert_eq!(cfg.ledger_path, PathBuf::from("uploaded.txt"));
        assert_eq!(cfg.target_app, TargetApp::default());
        assert!(!cfg.skip_ledger_write);
        assert_eq!(cfg.stream_source, StreamSource::UiEvents);
        cfg.validate()?;
        Ok(())
    }

    #[test]
    fn test_watch_dir_may_come_from_command_line() -> Result<()> {
        let mut cfg: Config = serde_json::from_str(r#"{"delete_local_on_success": false}"#)?;
        assert!(cfg.validate().is_err());
        cfg.watched_directory = PathBuf::from("/data/outbox");
        cfg.validate()?;
        Ok(())
    }

    #[test]
    fn test_log_source_uses_log_markers() -> Result<()> {
        let cfg: Config = serde_json::from_str(
            r#"{"watched_directory": "/tmp/in", "delete_local_on_success": true,
                "stream_source": "log",
                "log_markers": {"success": "UploadTask: done", "failure": "UploadTask: failed"}}"#,
        )?;
        assert_eq!(cfg.stream_markers().success, "UploadTask: done");
        assert_eq!(cfg.markers.success, "Upload complete");
        let events = Config {
            stream_source: StreamSource::UiEvents,
            ..cfg
        };
        assert_eq!(events.stream_markers().success, "Upload complete");
        Ok(())
    }
}
