//! The known-file inventory and the parent context of a document.
//!
//! References are only embedded when they resolve to a file the host knows
//! about. [`FileInventory`] holds those files keyed by their absolute,
//! forward-slash path so the resolver can match with plain string equality.

use crate::error::MdVideoError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// A file known to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Canonical absolute path with `/` separators. Empty means unknown.
    pub absolute_path: String,
}

impl FileRecord {
    pub fn new(absolute_path: impl Into<String>) -> Self {
        Self {
            absolute_path: absolute_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        Path::new(&self.absolute_path)
    }

    /// File name without its extension, used to name encoded outputs.
    pub fn stem(&self) -> &str {
        self.path()
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("video")
    }
}

/// Directory context of the document being processed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentNode {
    pub dir: Option<String>,
}

impl ParentNode {
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: Some(to_slash(dir.as_ref())),
        }
    }

    /// Context for a document stored at `file`: its canonical parent
    /// directory, or no directory when the file cannot be canonicalised.
    pub fn for_file(file: impl AsRef<Path>) -> Self {
        let dir = std::fs::canonicalize(file.as_ref())
            .ok()
            .and_then(|p| p.parent().map(to_slash));
        Self { dir }
    }
}

/// Files the resolver may embed, indexed by absolute path.
#[derive(Debug, Clone, Default)]
pub struct FileInventory {
    records: Vec<FileRecord>,
    index: HashMap<String, usize>,
}

impl FileInventory {
    /// Build an inventory from host-supplied records.
    ///
    /// Records with an empty path are kept but never matched. When two
    /// records share a path the first one wins.
    pub fn from_records(records: impl IntoIterator<Item = FileRecord>) -> Self {
        let records: Vec<FileRecord> = records.into_iter().collect();
        let mut index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if record.absolute_path.is_empty() {
                continue;
            }
            index.entry(record.absolute_path.clone()).or_insert(i);
        }
        Self { records, index }
    }

    /// Record every regular file under `root`.
    ///
    /// Hidden directories (`.git`, `.cache`, ...) below the root are skipped.
    /// Unreadable entries are logged and skipped; only a missing or
    /// unreadable root is an error.
    pub fn scan_dir(root: impl AsRef<Path>) -> Result<Self, MdVideoError> {
        let root = root.as_ref();
        let canonical = std::fs::canonicalize(root).map_err(|e| {
            MdVideoError::InventoryScanFailed {
                root: root.to_path_buf(),
                detail: e.to_string(),
            }
        })?;

        let mut records = Vec::new();
        for entry in walkdir::WalkDir::new(&canonical)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !e.file_type().is_dir()
                    || !e.file_name().to_str().is_some_and(|n| n.starts_with('.'))
            })
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(error = %err, "Error walking content directory");
                    None
                }
            })
        {
            if !entry.file_type().is_file() {
                continue;
            }
            records.push(FileRecord::new(to_slash(entry.path())));
        }

        debug!(
            "Scanned {} files under {}",
            records.len(),
            canonical.display()
        );
        Ok(Self::from_records(records))
    }

    /// Exact-path lookup.
    pub fn find(&self, absolute_path: &str) -> Option<&FileRecord> {
        self.index.get(absolute_path).map(|&i| &self.records[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Render a path with `/` separators, dropping the Windows verbatim prefix.
pub fn to_slash(path: &Path) -> String {
    let s = path.to_string_lossy();
    let s = s.strip_prefix(r"\\?\").unwrap_or(&*s);
    s.replace('\\', "/")
}
