//! Cryptographic operations for NYB containers.
//!
//! This module provides:
//! - Argon2id password-based key derivation, with a gate bounding concurrent runs
//! - Streaming AES-256-GCM with a single detached tag
//! - A TTL cache for short-lived secrets

mod kdf;
mod key_cache;
mod stream;

pub use kdf::{argon2id_params, derive_key, KdfGate, KdfPermit, KeyDerivation, SecretKey};
pub use key_cache::KeyCache;
pub use stream::{decrypt_stream, encrypt_stream};
