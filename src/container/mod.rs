//! The NYB container: header framing and whole-file encrypt/decrypt.
//!
//! On-disk layout:
//!
//! ```text
//! "NYB1" | header length (u32 LE) | header JSON (UTF-8) | ciphertext
//! ```
//!
//! The ciphertext is AES-256-GCM over the original file, authenticated
//! against the header JSON without its tag.

mod codec;
pub mod header;

pub use codec::{ContainerCodec, Outcome, SkipReason};
pub use header::{
    AppInfo, CipherAlgorithm, CipherParams, FileMeta, Header, KdfAlgorithm, KdfParams, MetaAttribs,
};
