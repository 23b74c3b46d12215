//! Path resolver: from a relative reference to a known file.

use crate::inventory::{FileInventory, FileRecord, ParentNode};

/// Result of resolving one reference against the inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// The document has no parent directory; nothing to resolve against.
    NoContext,
    /// The joined path is not in the inventory.
    NoMatch { path: String },
    Found(&'a FileRecord),
}

/// Resolve `url` relative to the document's directory.
pub fn resolve<'a>(
    url: &str,
    parent: Option<&ParentNode>,
    files: &'a FileInventory,
) -> Resolution<'a> {
    let Some(dir) = parent.and_then(|p| p.dir.as_deref()) else {
        return Resolution::NoContext;
    };
    let path = join_reference(dir, url);
    match files.find(&path) {
        Some(record) => Resolution::Found(record),
        None => Resolution::NoMatch { path },
    }
}

/// Join a directory and a relative reference into a normalised,
/// forward-slash path. `.` segments are dropped and `..` removes the
/// previous segment, without touching the file system.
pub fn join_reference(dir: &str, url: &str) -> String {
    let joined = format!("{dir}/{url}").replace('\\', "/");
    let absolute = joined.starts_with('/');

    let mut parts: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            s => parts.push(s),
        }
    }

    let body = parts.join("/");
    if absolute {
        format!("/{body}")
    } else if body.is_empty() {
        ".".to_string()
    } else {
        body
    }
}
