//! Collision-free destination naming.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// `"<stem> (n)<.ext>"` next to `path`.
pub fn with_suffix_n(path: &Path, n: u64) -> PathBuf {
    let mut name = OsString::new();
    if let Some(stem) = path.file_stem() {
        name.push(stem);
    }
    name.push(format!(" ({})", n));
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    path.with_file_name(name)
}

/// Return `path` if nothing occupies it, else the first free `"<stem> (n)<.ext>"`.
///
/// Best effort only: another writer may claim the name between the check and
/// the caller's write. Dangling symlinks count as occupied.
pub fn next_collision_free(path: &Path) -> PathBuf {
    if !is_occupied(path) {
        return path.to_path_buf();
    }
    let mut n = 1;
    loop {
        let candidate = with_suffix_n(path, n);
        if !is_occupied(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn is_occupied(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}
