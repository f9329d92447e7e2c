//! Source enumeration.
//!
//! Walks a file or directory depth-first and yields every regular file
//! with its `/`-separated path relative to the upload root. Entries of a
//! directory are visited in file-name order so one filesystem snapshot
//! always enumerates the same way.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::TransferError;
use crate::types::SourceFile;
use crate::validation::wire_path;

/// Lazy, restartable walk over an upload root.
///
/// After the first error the enumerator yields nothing more; a partial
/// listing is never presented as complete.
#[derive(Debug)]
pub struct SourceEnumerator {
    root: PathBuf,
    /// Paths still to visit, last element first.
    pending: Vec<PathBuf>,
    started: bool,
    failed: bool,
}

/// Starts enumerating `root`. Nothing is read until the first `next()`.
pub fn enumerate_source(root: &Path) -> SourceEnumerator {
    SourceEnumerator {
        root: root.to_path_buf(),
        pending: Vec::new(),
        started: false,
        failed: false,
    }
}

impl SourceEnumerator {
    /// Rewinds to the beginning of the walk.
    pub fn restart(&mut self) {
        self.pending.clear();
        self.started = false;
        self.failed = false;
    }

    fn fail(&mut self, path: &Path, source: std::io::Error) -> Option<Result<SourceFile, TransferError>> {
        self.failed = true;
        self.pending.clear();
        Some(Err(TransferError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        }))
    }

    fn start(&mut self) -> Option<Result<SourceFile, TransferError>> {
        self.started = true;
        let root = self.root.clone();

        let metadata = match fs::metadata(&root) {
            Ok(m) => m,
            Err(e) => return self.fail(&root, e),
        };

        if metadata.is_file() {
            // A single-file upload is named after the file itself.
            let Some(name) = root.file_name() else {
                self.failed = true;
                return Some(Err(TransferError::InvalidPath(format!(
                    "source file has no name: {}",
                    root.display()
                ))));
            };
            return Some(
                wire_path(Path::new(name)).map(|relative_path| SourceFile {
                    relative_path,
                    size: metadata.len(),
                    local_path: root.clone(),
                }),
            );
        }

        if !metadata.is_dir() {
            return self.fail(
                &root,
                std::io::Error::other("not a regular file or directory"),
            );
        }

        if let Err(e) = self.push_children(&root) {
            return self.fail(&root, e);
        }
        None
    }

    fn push_children(&mut self, dir: &Path) -> std::io::Result<()> {
        let mut children = Vec::new();
        for entry in fs::read_dir(dir)? {
            children.push(entry?.path());
        }
        children.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        self.pending.extend(children.into_iter().rev());
        Ok(())
    }

    fn visit(&mut self, path: PathBuf) -> Option<Result<SourceFile, TransferError>> {
        let metadata = match fs::symlink_metadata(&path) {
            Ok(m) => m,
            Err(e) => return self.fail(&path, e),
        };

        if metadata.is_dir() {
            if let Err(e) = self.push_children(&path) {
                return self.fail(&path, e);
            }
            return None;
        }

        if !metadata.is_file() {
            debug!(path = %path.display(), "skipping non-regular file");
            return None;
        }

        let relative = match path.strip_prefix(&self.root) {
            Ok(r) => r,
            Err(e) => return self.fail(&path, std::io::Error::other(e)),
        };
        let relative_path = match wire_path(relative) {
            Ok(p) => p,
            Err(e) => {
                self.failed = true;
                return Some(Err(e));
            }
        };

        Some(Ok(SourceFile {
            relative_path,
            size: metadata.len(),
            local_path: path,
        }))
    }
}

impl Iterator for SourceEnumerator {
    type Item = Result<SourceFile, TransferError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        if !self.started {
            if let Some(item) = self.start() {
                return Some(item);
            }
        }

        while let Some(path) = self.pending.pop() {
            if let Some(item) = self.visit(path) {
                return Some(item);
            }
        }
        None
    }
}

/// A fully enumerated upload root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceTree {
    pub files: Vec<SourceFile>,
    pub total_bytes: u64,
}

/// Enumerates `root` to completion, stat only (no file content is read).
///
/// Any unreadable path fails the whole scan with
/// [`TransferError::SourceUnavailable`].
pub fn scan_source(root: &Path) -> Result<SourceTree, TransferError> {
    let mut tree = SourceTree::default();
    for file in enumerate_source(root) {
        let file = file?;
        tree.total_bytes += file.size;
        tree.files.push(file);
    }

    debug!(
        root = %root.display(),
        files = tree.files.len(),
        total_bytes = tree.total_bytes,
        "source scan complete"
    );
    Ok(tree)
}
