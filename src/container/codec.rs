//! Whole-file container encryption and decryption.
//!
//! Output is always written to a temporary file in the destination directory
//! and renamed into place as the last step. Every failure before that rename
//! drops the temporary file, so no partial container or restored file is ever
//! visible.

use crate::config::{VaultConfig, CONTAINER_EXTENSION, MAGIC, NONCE_LEN, NOTE_EXTENSION};
use crate::container::header::{self, AppInfo, CipherParams, FileMeta, KdfParams, MetaAttribs};
use crate::crypto::{decrypt_stream, encrypt_stream, KdfGate, KeyDerivation};
use crate::error::{Error, Result};
use crate::fs::{
    next_collision_free, AttribStore, AttribUpdate, Disposal, FileAttribs, FsDisposal, NativeAttribs,
};
use crate::password::PasswordProvider;
use rand::RngCore;
use std::ffi::OsStr;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info, warn};

const TEMP_PREFIX: &str = ".nyb-tmp-";

/// Why a path was passed over without being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotRegularFile,
    AlreadyContainer,
    SidecarNote,
    NotContainer,
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::NotRegularFile => "not a regular file",
            SkipReason::AlreadyContainer => "already a container",
            SkipReason::SidecarNote => "sidecar note",
            SkipReason::NotContainer => "not a container",
            SkipReason::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}

/// Result of a single-file operation that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Processed(PathBuf),
    Skipped(SkipReason),
}

/// Encrypts files into containers and restores them.
///
/// Holds no per-file state, so one codec can serve many threads. Key
/// derivations are bounded by `io.max_parallel_kdf`.
pub struct ContainerCodec {
    config: VaultConfig,
    attribs: Box<dyn AttribStore>,
    disposal: Box<dyn Disposal>,
    kdf_gate: KdfGate,
}

impl ContainerCodec {
    /// Create a codec with the native attribute backend and plain disposal.
    pub fn new(config: VaultConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            kdf_gate: KdfGate::new(config.io.max_parallel_kdf),
            config,
            attribs: Box::new(NativeAttribs),
            disposal: Box::new(FsDisposal),
        })
    }

    pub fn with_attrib_store(mut self, attribs: impl AttribStore + 'static) -> Self {
        self.attribs = Box::new(attribs);
        self
    }

    pub fn with_disposal(mut self, disposal: impl Disposal + 'static) -> Self {
        self.disposal = Box::new(disposal);
        self
    }

    /// Encrypt `path` into `<name>.nyb` beside it.
    pub fn encrypt_file(&self, path: &Path, passwords: &dyn PasswordProvider) -> Result<Outcome> {
        if !fs::symlink_metadata(path)?.is_file() {
            return Ok(skipped(path, SkipReason::NotRegularFile));
        }
        if has_extension(path, CONTAINER_EXTENSION) {
            return Ok(skipped(path, SkipReason::AlreadyContainer));
        }
        if has_extension(path, NOTE_EXTENSION) {
            return Ok(skipped(path, SkipReason::SidecarNote));
        }
        let file_name = path
            .file_name()
            .ok_or_else(|| Error::Validation(format!("no file name: {}", path.display())))?;

        // Fresh salt means a fresh key, so a random nonce never repeats under one key.
        let kdf = KeyDerivation::new(self.config.argon2);
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let password = passwords.password()?;
        let key = self.kdf_gate.derive(&kdf, &password)?;

        let attribs = self.attribs.read(path)?;
        let meta = FileMeta {
            original_name: file_name.to_string_lossy().into_owned(),
            mtime: attribs.mtime,
            attribs: MetaAttribs {
                ro: attribs.ro,
                hidden: attribs.hidden,
            },
        };
        let header_json = header::build(
            &KdfParams::argon2id(*kdf.salt(), kdf.costs()),
            &CipherParams::aes_256_gcm(nonce),
            &meta,
            &AppInfo::current(),
        )?;
        let aad = header::compute_aad(&header_json)?;

        let dest = next_collision_free(&container_path_for(path, file_name));
        let dir = parent_dir(&dest);

        let mut source = File::open(path)?;
        let mut ciphertext = tempfile::tempfile_in(dir)?;
        let (written, tag) = encrypt_stream(
            &mut source,
            &mut ciphertext,
            &key,
            &nonce,
            aad,
            self.config.io.chunk_size,
        )?;

        let packed = header::pack(&MAGIC, &header::add_tag(&header_json, &tag)?)?;
        let mut out = Builder::new().prefix(TEMP_PREFIX).tempfile_in(dir)?;
        out.write_all(&packed)?;
        ciphertext.seek(SeekFrom::Start(0))?;
        io::copy(&mut ciphertext, out.as_file_mut())?;
        promote(out, &dest)?;

        info!(source = %path.display(), dest = %dest.display(), bytes = written, "encrypted");

        if self.config.defaults.replace_original {
            self.dispose(path);
        }
        Ok(Outcome::Processed(dest))
    }

    /// Restore the file held in the container at `path`.
    pub fn decrypt_file(&self, path: &Path, passwords: &dyn PasswordProvider) -> Result<Outcome> {
        if !fs::symlink_metadata(path)?.is_file() {
            return Ok(skipped(path, SkipReason::NotRegularFile));
        }
        if !has_extension(path, CONTAINER_EXTENSION) {
            return Ok(skipped(path, SkipReason::NotContainer));
        }

        let mut reader = BufReader::new(File::open(path)?);
        let (header, payload_offset) = header::unpack(&mut reader)?;
        header.validate()?;
        let tag = *header.tag()?;
        let aad = header.aad()?;

        let password = passwords.password()?;
        let kdf = KeyDerivation::from_salt(header.kdf.salt, header.kdf.costs());
        let key = self.kdf_gate.derive(&kdf, &password)?;

        let dest = next_collision_free(&restore_path_for(path, &header.meta.original_name));
        let dir = parent_dir(&dest);

        reader.seek(SeekFrom::Start(payload_offset))?;
        let mut out = Builder::new().prefix(TEMP_PREFIX).tempfile_in(dir)?;
        let written = decrypt_stream(
            &mut reader,
            out.as_file_mut(),
            &key,
            &header.cipher.nonce,
            &aad,
            &tag,
            self.config.io.chunk_size,
        )?;
        promote(out, &dest)?;

        info!(source = %path.display(), dest = %dest.display(), bytes = written, "decrypted");

        let update = AttribUpdate::from(FileAttribs {
            mtime: header.meta.mtime,
            ro: header.meta.attribs.ro,
            hidden: header.meta.attribs.hidden,
        });
        if let Err(e) = self.attribs.write(&dest, &update) {
            warn!(path = %dest.display(), "could not restore attributes: {e}");
        }

        if self.config.defaults.remove_nyb_after_decrypt {
            self.dispose(path);
        }
        Ok(Outcome::Processed(dest))
    }

    fn dispose(&self, path: &Path) {
        let permanent = !self.config.defaults.send_to_recycle_bin;
        if let Err(e) = self.disposal.dispose(path, permanent) {
            warn!(path = %path.display(), permanent, "{e}");
        }
    }
}

/// Flush `tmp` and rename it onto `dest`. An existing `dest` is never replaced.
fn promote(tmp: NamedTempFile, dest: &Path) -> Result<()> {
    tmp.as_file().sync_all()?;
    tmp.persist_noclobber(dest)?;
    Ok(())
}

fn skipped(path: &Path, reason: SkipReason) -> Outcome {
    debug!(path = %path.display(), %reason, "skipped");
    Outcome::Skipped(reason)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// `a.txt` → `a.txt.nyb`.
fn container_path_for(path: &Path, file_name: &OsStr) -> PathBuf {
    let mut name = file_name.to_os_string();
    name.push(".");
    name.push(CONTAINER_EXTENSION);
    path.with_file_name(name)
}

/// Destination beside the container, named from the embedded name when it is
/// a plain file name, else from the container's stem.
fn restore_path_for(container: &Path, original_name: &str) -> PathBuf {
    let dir = parent_dir(container);
    if is_plain_file_name(original_name) {
        return dir.join(original_name);
    }
    let stem = container
        .file_stem()
        .unwrap_or_else(|| OsStr::new("restored"));
    dir.join(stem)
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
