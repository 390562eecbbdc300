use crate::error::SyncResult;
use rusqlite::{Connection, OpenFlags};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::debug;

/// Read-only index of names already present on the remote side.
pub trait RemoteCatalog: Send + Sync {
    fn file_names(&self) -> SyncResult<HashSet<String>>;
}

/// Catalog backed by a SQLite database; the first column of `query` is the file name.
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    path: PathBuf,
    query: String,
}

impl SqliteCatalog {
    pub fn new(path: impl Into<PathBuf>, query: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: query.into(),
        }
    }
}

impl RemoteCatalog for SqliteCatalog {
    fn file_names(&self) -> SyncResult<HashSet<String>> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let mut stmt = conn.prepare(&self.query)?;
        let names = stmt
            .query_map([], |row| row.get::<_, Option<String>>(0))?
            .filter_map(|r| r.transpose())
            .collect::<Result<HashSet<_>, _>>()?;
        debug!("catalog {:?}: {} entries", self.path, names.len());
        Ok(names)
    }
}
