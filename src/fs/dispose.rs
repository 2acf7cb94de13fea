//! Source/container disposal capability.

use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::path::Path;

/// Removes a file, either recoverably (recycle bin) or permanently.
///
/// A path that no longer exists counts as disposed.
pub trait Disposal: Send + Sync {
    fn dispose(&self, path: &Path, permanent: bool) -> Result<()>;
}

/// Plain filesystem disposal.
///
/// There is no recycle bin here: recoverable requests fail and leave the file
/// in place rather than deleting it for good.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsDisposal;

impl Disposal for FsDisposal {
    fn dispose(&self, path: &Path, permanent: bool) -> Result<()> {
        if fs::symlink_metadata(path).is_err() {
            return Ok(());
        }
        if !permanent {
            return Err(Error::Disposal(format!(
                "no recycle bin available for {}",
                path.display()
            )));
        }
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Disposal(format!("{}: {}", path.display(), e))),
        }
    }
}
