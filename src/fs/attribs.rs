//! File attribute capture and restore.
//!
//! The codec only sees [`AttribStore`]; [`NativeAttribs`] maps it onto the
//! host platform. On Unix "hidden" means a leading dot in the file name and
//! cannot be changed without renaming, so hidden writes are ignored there.

use crate::error::Result;
use filetime::FileTime;
use std::fs;
use std::path::Path;

/// Attributes captured before encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttribs {
    /// Modification time in whole seconds since the Unix epoch.
    pub mtime: i64,
    pub ro: bool,
    pub hidden: bool,
}

/// Attributes to apply; `None` leaves the attribute untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttribUpdate {
    pub mtime: Option<i64>,
    pub ro: Option<bool>,
    pub hidden: Option<bool>,
}

impl From<FileAttribs> for AttribUpdate {
    fn from(attribs: FileAttribs) -> Self {
        Self {
            mtime: Some(attribs.mtime),
            ro: Some(attribs.ro),
            hidden: Some(attribs.hidden),
        }
    }
}

/// Platform attribute capability.
pub trait AttribStore: Send + Sync {
    fn read(&self, path: &Path) -> Result<FileAttribs>;

    /// Apply `update`. The modification time goes first and the read-only
    /// flag last, so a read-only bit never blocks the other writes.
    fn write(&self, path: &Path, update: &AttribUpdate) -> Result<()>;
}

/// Attribute backend for the host platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeAttribs;

impl AttribStore for NativeAttribs {
    fn read(&self, path: &Path) -> Result<FileAttribs> {
        let meta = fs::metadata(path)?;
        Ok(FileAttribs {
            mtime: FileTime::from_last_modification_time(&meta).unix_seconds(),
            ro: platform::is_read_only(&meta),
            hidden: platform::is_hidden(path, &meta),
        })
    }

    fn write(&self, path: &Path, update: &AttribUpdate) -> Result<()> {
        if let Some(mtime) = update.mtime {
            let time = FileTime::from_unix_time(mtime, 0);
            filetime::set_file_times(path, time, time)?;
        }
        if let Some(hidden) = update.hidden {
            platform::set_hidden(path, hidden)?;
        }
        if let Some(ro) = update.ro {
            platform::set_read_only(path, ro)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
mod platform {
    use std::fs::{self, Metadata};
    use std::io;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tracing::debug;

    const OWNER_WRITE: u32 = 0o200;
    const ANY_WRITE: u32 = 0o222;

    pub fn is_read_only(meta: &Metadata) -> bool {
        meta.permissions().mode() & OWNER_WRITE == 0
    }

    pub fn set_read_only(path: &Path, ro: bool) -> io::Result<()> {
        let mut perms = fs::metadata(path)?.permissions();
        let mode = perms.mode();
        perms.set_mode(if ro { mode & !ANY_WRITE } else { mode | OWNER_WRITE });
        fs::set_permissions(path, perms)
    }

    pub fn is_hidden(path: &Path, _meta: &Metadata) -> bool {
        path.file_name()
            .map(|name| name.to_string_lossy().starts_with('.'))
            .unwrap_or(false)
    }

    pub fn set_hidden(path: &Path, hidden: bool) -> io::Result<()> {
        if is_hidden(path, &fs::symlink_metadata(path)?) != hidden {
            debug!(path = %path.display(), hidden, "hidden flag follows the file name here; left as is");
        }
        Ok(())
    }
}

#[cfg(windows)]
mod platform {
    use std::fs::{self, Metadata};
    use std::io;
    use std::os::windows::fs::MetadataExt;
    use std::path::Path;
    use windows::core::HSTRING;
    use windows::Win32::Storage::FileSystem::{SetFileAttributesW, FILE_FLAGS_AND_ATTRIBUTES};

    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    const FILE_ATTRIBUTE_NORMAL: u32 = 0x80;

    pub fn is_read_only(meta: &Metadata) -> bool {
        meta.permissions().readonly()
    }

    pub fn set_read_only(path: &Path, ro: bool) -> io::Result<()> {
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_readonly(ro);
        fs::set_permissions(path, perms)
    }

    pub fn is_hidden(_path: &Path, meta: &Metadata) -> bool {
        meta.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0
    }

    pub fn set_hidden(path: &Path, hidden: bool) -> io::Result<()> {
        let attrs = fs::metadata(path)?.file_attributes();
        let mut updated = if hidden {
            attrs | FILE_ATTRIBUTE_HIDDEN
        } else {
            attrs & !FILE_ATTRIBUTE_HIDDEN
        };
        if updated == attrs {
            return Ok(());
        }
        if updated == 0 {
            updated = FILE_ATTRIBUTE_NORMAL;
        }
        let wide = HSTRING::from(path.as_os_str());
        unsafe { SetFileAttributesW(&wide, FILE_FLAGS_AND_ATTRIBUTES(updated)) }
            .map_err(|e| io::Error::other(e.to_string()))
    }
}
