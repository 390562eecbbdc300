use crate::error::{SyncError, SyncResult};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Append-only record of file names that have been transferred, one per line.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every recorded name. A missing ledger file is an empty ledger.
    pub fn load_all(&self) -> SyncResult<HashSet<String>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let mut names = HashSet::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| self.io_error(e))?;
            // names may start or end with spaces; only the line ending is stripped
            let name = line.strip_suffix('\r').unwrap_or(&line);
            if !name.is_empty() {
                names.insert(name.to_string());
            }
        }
        Ok(names)
    }

    /// Durably records `name`. Repeated calls write duplicate lines, which readers
    /// collapse.
    pub fn append(&self, name: &str) -> SyncResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        writeln!(file, "{}", name).map_err(|e| self.io_error(e))?;
        file.sync_all().map_err(|e| self.io_error(e))?;
        debug!("ledger: recorded {}", name);
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> SyncError {
        SyncError::LedgerIo {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_absent_ledger_is_empty() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let ledger = Ledger::new(dir.path().join("uploaded.txt"));
        assert!(ledger.load_all()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_append_then_load() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let ledger = Ledger::new(dir.path().join("uploaded.txt"));
        ledger.append("a.jpg")?;
        ledger.append("b c.mp4")?;
        let names = ledger.load_all()?;
        assert!(names.contains("a.jpg"));
        assert!(names.contains("b c.mp4"));
        assert_eq!(names.len(), 2);
        Ok(())
    }

    #[test]
    fn test_duplicate_appends_are_harmless() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let ledger = Ledger::new(dir.path().join("uploaded.txt"));
        ledger.append("a.jpg")?;
        ledger.append("a.jpg")?;
        assert_eq!(ledger.load_all()?.len(), 1);
        let raw = std::fs::read_to_string(ledger.path())?;
        assert_eq!(raw, "a.jpg\na.jpg\n");
        Ok(())
    }

    #[test]
    fn test_empty_and_crlf_lines() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("uploaded.txt");
        std::fs::write(&path, "a.jpg\r\n\nb.jpg\n")?;
        let names = Ledger::new(&path).load_all()?;
        assert_eq!(names.len(), 2);
        assert!(names.contains("a.jpg"));
        assert!(names.contains("b.jpg"));
        Ok(())
    }

    #[test]
    fn test_names_with_surrounding_spaces_round_trip() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let ledger = Ledger::new(dir.path().join("uploaded.txt"));
        ledger.append("holiday .jpg ")?;
        ledger.append(" leading.png")?;
        let names = ledger.load_all()?;
        assert!(names.contains("holiday .jpg "));
        assert!(names.contains(" leading.png"));
        assert!(!names.contains("holiday .jpg"));
        Ok(())
    }

    #[test]
    fn test_unwritable_location_is_ledger_error() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let ledger = Ledger::new(dir.path().join("missing").join("uploaded.txt"));
        let err = ledger.append("a.jpg").unwrap_err();
        assert!(matches!(err, SyncError::LedgerIo { .. }));
        Ok(())
    }
}
