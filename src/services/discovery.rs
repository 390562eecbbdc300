use crate::core::transfer::PendingFile;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// The remote application rejects names starting with this.
pub const HIDDEN_MARKER: char = '.';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// The watched directory holds no eligible files at all.
    NothingFound,
    /// Every eligible file is already in the ledger or the remote catalog.
    AllTransferred { known: usize },
    Pending(Vec<PendingFile>),
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with(HIDDEN_MARKER))
            .unwrap_or(false)
}

/// Every eligible file under `root`, recursively, ordered by path. Names are unique:
/// when two subdirectories hold the same name only the first path is kept.
pub fn scan_directory(root: &Path) -> Result<Vec<PendingFile>> {
    if !root.is_dir() {
        anyhow::bail!("watched directory {:?} does not exist", root);
    }

    let mut files = Vec::new();
    let mut seen = HashSet::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        let metadata = match fs::metadata(entry.path()) {
            Ok(m) => m,
            Err(_) => continue,
        };
        if !metadata.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            warn!("Skipping non UTF-8 file name {:?}", entry.path());
            continue;
        };
        if !seen.insert(name.to_string()) {
            warn!(
                "Skipping {:?}: another file named {} was found first",
                entry.path(),
                name
            );
            continue;
        }
        files.push(PendingFile {
            path: entry.path().to_path_buf(),
            name: name.to_string(),
            size: metadata.len(),
        });
    }
    Ok(files)
}

/// Eligible files under `root` whose names are not in `excluded`.
pub fn discover(root: &Path, excluded: &HashSet<String>) -> Result<Discovery> {
    let files = scan_directory(root).with_context(|| format!("scan {:?}", root))?;
    if files.is_empty() {
        return Ok(Discovery::NothingFound);
    }

    let total = files.len();
    let pending: Vec<PendingFile> = files
        .into_iter()
        .filter(|f| !excluded.contains(&f.name))
        .collect();
    debug!("discovery: {} eligible, {} pending", total, pending.len());

    if pending.is_empty() {
        Ok(Discovery::AllTransferred { known: total })
    } else {
        Ok(Discovery::Pending(pending))
    }
}
