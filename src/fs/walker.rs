//! Candidate file enumeration.
//!
//! Symlinks and reparse points are never followed. Excluded or linked
//! directories are pruned before descent, so nothing beneath them is visited.

use std::fs::{self, Metadata};
use std::iter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Classification of a traversal result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    File,
    Dir,
}

/// A path produced by the walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTask {
    pub path: PathBuf,
    pub kind: TaskKind,
}

impl PathTask {
    fn file(path: PathBuf) -> Self {
        Self {
            path,
            kind: TaskKind::File,
        }
    }

    fn dir(path: PathBuf) -> Self {
        Self {
            path,
            kind: TaskKind::Dir,
        }
    }
}

/// Case-insensitive substring exclusions matched against full paths.
#[derive(Debug, Clone)]
pub struct Exclusions {
    lowered: Arc<[String]>,
}

impl Exclusions {
    /// Empty patterns are ignored.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lowered: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            lowered: lowered.into(),
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        if self.lowered.is_empty() {
            return false;
        }
        let full = path.to_string_lossy().to_lowercase();
        self.lowered.iter().any(|p| full.contains(p.as_str()))
    }
}

#[cfg(windows)]
fn is_link_or_reparse(meta: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x400;
    meta.file_type().is_symlink() || meta.file_attributes() & FILE_ATTRIBUTE_REPARSE_POINT != 0
}

#[cfg(not(windows))]
fn is_link_or_reparse(meta: &Metadata) -> bool {
    meta.file_type().is_symlink()
}

/// Entries whose metadata cannot be read are treated as links.
fn keep_entry(entry: &DirEntry, exclusions: &Exclusions) -> bool {
    if exclusions.matches(entry.path()) {
        debug!(path = %entry.path().display(), "excluded");
        return false;
    }
    match entry.metadata() {
        Ok(meta) if is_link_or_reparse(&meta) => {
            debug!(path = %entry.path().display(), "not following link");
            false
        }
        Ok(_) => true,
        Err(_) => false,
    }
}

/// Lazily enumerate candidate paths under `roots`.
///
/// Missing roots are skipped. Without `recursive`, a directory root expands to
/// its immediate regular files. With it, the root is reported as a directory
/// task followed by every file beneath it.
pub fn iter_targets<I, P>(
    roots: I,
    recursive: bool,
    exclusions: &[String],
) -> impl Iterator<Item = PathTask>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let exclusions = Exclusions::new(exclusions);
    let roots: Vec<PathBuf> = roots.into_iter().map(|p| p.as_ref().to_path_buf()).collect();
    roots
        .into_iter()
        .flat_map(move |root| targets_under(root, recursive, exclusions.clone()))
}

fn targets_under(
    root: PathBuf,
    recursive: bool,
    exclusions: Exclusions,
) -> Box<dyn Iterator<Item = PathTask>> {
    let meta = match fs::symlink_metadata(&root) {
        Ok(meta) => meta,
        Err(_) => return Box::new(iter::empty()),
    };
    if is_link_or_reparse(&meta) || exclusions.matches(&root) {
        debug!(path = %root.display(), "root skipped");
        return Box::new(iter::empty());
    }

    if meta.is_file() {
        Box::new(iter::once(PathTask::file(root)))
    } else if !meta.is_dir() {
        Box::new(iter::empty())
    } else if recursive {
        let walk = walk_recursive(root.clone(), exclusions);
        Box::new(iter::once(PathTask::dir(root)).chain(walk))
    } else {
        Box::new(immediate_files(root, exclusions))
    }
}

fn immediate_files(dir: PathBuf, exclusions: Exclusions) -> impl Iterator<Item = PathTask> {
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => Some(entries),
        Err(e) => {
            debug!(path = %dir.display(), "cannot list directory: {e}");
            None
        }
    };

    entries
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok())
        .filter_map(move |entry| {
            let path = entry.path();
            let meta = fs::symlink_metadata(&path).ok()?;
            if meta.is_file() && !is_link_or_reparse(&meta) && !exclusions.matches(&path) {
                Some(PathTask::file(path))
            } else {
                None
            }
        })
}

fn walk_recursive(root: PathBuf, exclusions: Exclusions) -> impl Iterator<Item = PathTask> {
    WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_entry(move |entry| keep_entry(entry, &exclusions))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| PathTask::file(entry.into_path()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusions_are_case_insensitive_substrings() {
        let exclusions = Exclusions::new(["$Recycle.Bin", "node_modules"]);
        assert!(exclusions.matches(Path::new("/data/$RECYCLE.BIN/x")));
        assert!(exclusions.matches(Path::new("/src/Node_Modules/pkg/index.js")));
        assert!(!exclusions.matches(Path::new("/src/modules/index.js")));
    }

    #[test]
    fn test_empty_patterns_ignored() {
        let exclusions = Exclusions::new([""]);
        assert!(!exclusions.matches(Path::new("/anything")));
    }
}
