use std::path::PathBuf;
use thiserror::Error;

/// Failure conditions raised by the device, locator, ledger and catalog layers.
///
/// Per-file variants are caught at the transfer pipeline boundary; the watch loop
/// only ever sees them as log lines.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("device unreachable: {0}")]
    DeviceUnreachable(String),

    #[error("remote command `{command}` failed ({status}): {stderr}")]
    RemoteCommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("UI snapshot is empty")]
    EmptySnapshot,

    #[error("UI element not found: {0}")]
    ElementNotFound(String),

    #[error("UI snapshot is not valid XML: {0}")]
    InvalidSnapshot(#[from] roxmltree::Error),

    #[error("malformed bounds attribute: {0:?}")]
    InvalidBounds(String),

    #[error("unsupported element query: {0}")]
    InvalidQuery(String),

    #[error("ledger I/O failed at {path:?}")]
    LedgerIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("remote catalog query failed: {0}")]
    Catalog(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SyncError {
    pub fn remote_failed(command: impl Into<String>, status: impl Into<String>, stderr: &str) -> Self {
        Self::RemoteCommandFailed {
            command: command.into(),
            status: status.into(),
            stderr: stderr.trim().to_string(),
        }
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
