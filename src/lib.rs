//! NYB Encrypted File Containers
//!
//! Encrypts individual files into self-describing `.nyb` containers and
//! restores them, preserving name, modification time and attributes.
//!
//! # Features
//!
//! - **Argon2id**: password-based key derivation with a fresh salt per file
//! - **Streaming AES-256-GCM**: constant memory, one tag over the whole file
//! - **Authenticated header**: the JSON header is bound to the payload as AAD
//! - **Atomic output**: results appear only after full success
//! - **Batch processing**: parallel, cancellable, with per-file reports
//!
//! # Container layout
//!
//! ```text
//! "NYB1" | u32 LE header length | header JSON | ciphertext
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use nyb::{ContainerCodec, Outcome, VaultConfig};
//! use std::path::Path;
//!
//! let codec = ContainerCodec::new(VaultConfig::default()).unwrap();
//! let password = || b"correct horse".to_vec();
//!
//! // Writes report.pdf.nyb beside the original
//! let container = match codec.encrypt_file(Path::new("report.pdf"), &password).unwrap() {
//!     Outcome::Processed(path) => path,
//!     Outcome::Skipped(reason) => panic!("skipped: {reason}"),
//! };
//!
//! // Restores report (1).pdf, since report.pdf still exists
//! codec.decrypt_file(&container, &password).unwrap();
//! ```

pub mod batch;
pub mod config;
pub mod container;
pub mod crypto;
pub mod error;
pub mod fs;
pub mod password;

pub use config::VaultConfig;
pub use container::{ContainerCodec, Outcome, SkipReason};
pub use error::{Error, ErrorKind, Result};
pub use password::PasswordProvider;
