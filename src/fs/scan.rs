// Tree snapshot module
// Enumerates a directory tree once and records what it found

use chrono::{DateTime, Utc};
use jwalk::WalkDir;
use std::io;
use std::path::{Path, PathBuf};

/// Kind of a snapshot entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Reported, never followed.
    Symlink,
}

/// One entry of a tree snapshot, relative to the scanned root.
#[derive(Debug, Clone)]
pub struct TreeEntry {
    pub relative: PathBuf,
    pub kind: EntryKind,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl TreeEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Enumerate everything below `root` (the root itself excluded).
///
/// Symlinks are reported as such and never followed. Entries that disappear
/// between listing and stat are skipped; any other error aborts the scan.
pub fn scan_tree(root: &Path) -> io::Result<Vec<TreeEntry>> {
    let mut entries = Vec::new();

    for entry_result in WalkDir::new(root)
        .skip_hidden(false)  // Hidden files are mirrored too
        .follow_links(false) // Don't follow symlinks to avoid loops
    {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(e) => match walk_error(e) {
                err if err.kind() == io::ErrorKind::NotFound => continue,
                err => return Err(err),
            },
        };

        if entry.depth == 0 {
            continue;
        }

        let file_type = entry.file_type();
        let kind = if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else {
            continue;
        };

        let path = entry.path();
        let metadata = match std::fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };

        let relative = match path.strip_prefix(root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => continue,
        };

        entries.push(TreeEntry {
            relative,
            kind,
            size: if kind == EntryKind::File { metadata.len() } else { 0 },
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        });
    }

    Ok(entries)
}

/// Take a snapshot on the blocking pool.
pub async fn snapshot(root: &Path) -> io::Result<Vec<TreeEntry>> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || scan_tree(&root))
        .await
        .map_err(io::Error::other)?
}

fn walk_error(err: jwalk::Error) -> io::Error {
    let kind = err.io_error().map(|e| e.kind()).unwrap_or(io::ErrorKind::Other);
    io::Error::new(kind, err.to_string())
}
