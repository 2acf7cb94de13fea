//! Batch processing over many files.
//!
//! Files run in parallel on the rayon pool. A failure is recorded against its
//! file and the rest of the batch continues.

use crate::config::VaultConfig;
use crate::container::{ContainerCodec, Outcome, SkipReason};
use crate::error::Error;
use crate::fs::{iter_targets, TaskKind};
use crate::password::PasswordProvider;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Encrypt,
    Decrypt,
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub enum BatchOutcome {
    Processed(PathBuf),
    Skipped(SkipReason),
    Failed(Error),
}

impl BatchOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, BatchOutcome::Failed(_))
    }
}

impl From<crate::Result<Outcome>> for BatchOutcome {
    fn from(result: crate::Result<Outcome>) -> Self {
        match result {
            Ok(Outcome::Processed(path)) => BatchOutcome::Processed(path),
            Ok(Outcome::Skipped(reason)) => BatchOutcome::Skipped(reason),
            Err(e) => BatchOutcome::Failed(e),
        }
    }
}

/// What happened to one input file.
#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: BatchOutcome,
}

/// Expand `roots` into the files a batch should visit, honoring the
/// configured recursion and exclusions.
pub fn collect_files<I, P>(config: &VaultConfig, roots: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    iter_targets(roots, config.defaults.recursive, &config.exclusions)
        .filter(|task| task.kind == TaskKind::File)
        .map(|task| task.path)
        .collect()
}

/// Run `op` over `files`. Reports come back in input order.
///
/// The token is checked before each file starts; files not yet started when
/// it fires are reported as skipped.
pub fn run_batch(
    codec: &ContainerCodec,
    files: &[PathBuf],
    op: Operation,
    passwords: &(dyn PasswordProvider + Sync),
    cancel: &CancelToken,
) -> Vec<FileReport> {
    let reports: Vec<FileReport> = files
        .par_iter()
        .map(|path| {
            let outcome = if cancel.is_cancelled() {
                BatchOutcome::Skipped(SkipReason::Cancelled)
            } else {
                let result = match op {
                    Operation::Encrypt => codec.encrypt_file(path, passwords),
                    Operation::Decrypt => codec.decrypt_file(path, passwords),
                };
                BatchOutcome::from(result)
            };
            if let BatchOutcome::Failed(e) = &outcome {
                warn!(path = %path.display(), kind = ?e.kind(), "{e}");
            }
            FileReport {
                path: path.clone(),
                outcome,
            }
        })
        .collect();

    let failed = reports.iter().filter(|r| r.outcome.is_failed()).count();
    info!(?op, total = reports.len(), failed, "batch finished");
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_collect_files_drops_dir_tasks() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::write(dir.path().join("sub").join("b.txt"), b"b").unwrap();

        let mut files = collect_files(&VaultConfig::new(), [dir.path()]);
        files.sort();
        assert_eq!(
            files,
            vec![dir.path().join("a.txt"), dir.path().join("sub").join("b.txt")]
        );
    }

    #[test]
    fn test_cancelled_batch_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"a").unwrap();

        let codec = ContainerCodec::new(VaultConfig::new()).unwrap();
        let token = CancelToken::new();
        token.cancel();
        let provider = || b"pw".to_vec();
        let reports = run_batch(&codec, &[path.clone()], Operation::Encrypt, &provider, &token);

        assert_eq!(reports.len(), 1);
        assert!(matches!(
            reports[0].outcome,
            BatchOutcome::Skipped(SkipReason::Cancelled)
        ));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
