//! Argon2id key derivation for password-based encryption.

use crate::config::{Argon2Config, KEY_LEN, SALT_LEN};
use crate::error::{Error, Result};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use std::sync::{Condvar, Mutex};
use zeroize::Zeroize;

/// A 256-bit symmetric key. Zeroized on drop.
#[derive(Clone)]
pub struct SecretKey {
    bytes: [u8; KEY_LEN],
}

impl SecretKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Build Argon2id parameters from a memory cost in bytes.
///
/// The primitive takes its memory cost in KiB; the conversion truncates.
pub fn argon2id_params(memory_cost: u64, time_cost: u32, parallelism: u32) -> Result<Params> {
    let m_cost_kib = u32::try_from(memory_cost / 1024)
        .map_err(|_| Error::KeyDerivation(format!("memory cost too large: {}", memory_cost)))?;
    Params::new(m_cost_kib, time_cost, parallelism, Some(KEY_LEN))
        .map_err(|e| Error::KeyDerivation(e.to_string()))
}

/// Derive a 256-bit key from a password and salt.
///
/// Deterministic for identical inputs. `memory_cost` is in bytes.
pub fn derive_key(
    password: &[u8],
    salt: &[u8; SALT_LEN],
    memory_cost: u64,
    time_cost: u32,
    parallelism: u32,
) -> Result<SecretKey> {
    let params = argon2id_params(memory_cost, time_cost, parallelism)?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password, salt, &mut key)
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;

    let secret = SecretKey::from_bytes(key);
    key.zeroize();
    Ok(secret)
}

/// Key derivation using Argon2id with a per-operation salt.
#[derive(Debug, Clone)]
pub struct KeyDerivation {
    salt: [u8; SALT_LEN],
    costs: Argon2Config,
}

impl KeyDerivation {
    /// Create a KDF with a fresh random salt.
    pub fn new(costs: Argon2Config) -> Self {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        Self { salt, costs }
    }

    /// Create a KDF from an existing salt (for decryption).
    pub fn from_salt(salt: [u8; SALT_LEN], costs: Argon2Config) -> Self {
        Self { salt, costs }
    }

    /// Get the salt for storage.
    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    /// Get the Argon2id costs.
    pub fn costs(&self) -> &Argon2Config {
        &self.costs
    }

    /// Derive the key for `password`.
    pub fn derive_key(&self, password: &[u8]) -> Result<SecretKey> {
        derive_key(password, &self.salt, self.costs.m, self.costs.t, self.costs.p)
    }
}

/// Caps the number of key derivations running at once.
///
/// Argon2id allocates its full memory cost per call, so unbounded parallel
/// derivations can exhaust memory.
#[derive(Debug)]
pub struct KdfGate {
    available: Mutex<usize>,
    released: Condvar,
}

/// Permit held for the duration of one derivation.
pub struct KdfPermit<'a> {
    gate: &'a KdfGate,
}

impl KdfGate {
    /// Create a gate admitting at most `permits` concurrent derivations.
    pub fn new(permits: usize) -> Self {
        Self {
            available: Mutex::new(permits.max(1)),
            released: Condvar::new(),
        }
    }

    /// Block until a permit is free.
    pub fn acquire(&self) -> KdfPermit<'_> {
        let mut available = self.available.lock().unwrap_or_else(|e| e.into_inner());
        while *available == 0 {
            available = self
                .released
                .wait(available)
                .unwrap_or_else(|e| e.into_inner());
        }
        *available -= 1;
        KdfPermit { gate: self }
    }

    /// Derive a key while holding a permit.
    pub fn derive(&self, kdf: &KeyDerivation, password: &[u8]) -> Result<SecretKey> {
        let _permit = self.acquire();
        kdf.derive_key(password)
    }
}

impl Drop for KdfPermit<'_> {
    fn drop(&mut self) {
        let mut available = self.gate.available.lock().unwrap_or_else(|e| e.into_inner());
        *available += 1;
        self.gate.released.notify_one();
    }
}
