//! Configuration constants and types for NYB containers.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Container magic: "NYB1" in bytes.
pub const MAGIC: [u8; 4] = *b"NYB1";

/// Extension of encrypted containers (without the dot).
pub const CONTAINER_EXTENSION: &str = "nyb";

/// Extension of sidecar note files, never encrypted.
pub const NOTE_EXTENSION: &str = "nybnote";

/// Value of `app.format` in every header.
pub const FORMAT_NAME: &str = "nyb";

/// Largest accepted header JSON (16 MiB).
pub const MAX_HEADER_LEN: usize = 16 * 1024 * 1024;

/// Default streaming chunk size (4 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Sizes of the cryptographic values stored in a header.
pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

/// Argon2id parameters for key derivation.
pub mod argon2_params {
    /// Memory cost in bytes (128 MiB).
    pub const MEMORY_COST: u64 = 128 * 1024 * 1024;

    /// Time cost (iterations).
    pub const TIME_COST: u32 = 3;

    /// Parallelism factor.
    pub const PARALLELISM: u32 = 1;

    /// Upper bound on a memory cost read from a container header (4 GiB).
    pub const MAX_MEMORY_COST: u64 = 4 * 1024 * 1024 * 1024;

    /// Upper bound on time cost and parallelism read from a container header.
    pub const MAX_TIME_COST: u32 = 64;
    pub const MAX_PARALLELISM: u32 = 64;
}

/// Default exclusion substrings.
pub const DEFAULT_EXCLUSIONS: [&str; 3] = ["$Recycle.Bin", "System Volume Information", "Windows\\Temp"];

/// Complete configuration passed into every codec operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Traversal and disposal policy.
    pub defaults: Defaults,
    /// Argon2id costs for new containers.
    pub argon2: Argon2Config,
    /// Case-insensitive path substrings excluded from traversal.
    pub exclusions: Vec<String>,
    /// Streaming and concurrency limits.
    pub io: IoConfig,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            defaults: Defaults::default(),
            argon2: Argon2Config::default(),
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
            io: IoConfig::default(),
        }
    }
}

/// Traversal and disposal flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Dispose of the source file after a successful encrypt.
    pub replace_original: bool,
    /// Dispose of the container after a successful decrypt.
    pub remove_nyb_after_decrypt: bool,
    /// Prefer recoverable disposal (recycle bin) over permanent deletion.
    pub send_to_recycle_bin: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            recursive: true,
            replace_original: false,
            remove_nyb_after_decrypt: true,
            send_to_recycle_bin: true,
        }
    }
}

/// Argon2id costs. `m` is in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Argon2Config {
    pub m: u64,
    pub t: u32,
    pub p: u32,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            m: argon2_params::MEMORY_COST,
            t: argon2_params::TIME_COST,
            p: argon2_params::PARALLELISM,
        }
    }
}

/// Streaming and concurrency limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Bytes read and written per streaming step.
    pub chunk_size: usize,
    /// Maximum number of key derivations running at once.
    pub max_parallel_kdf: usize,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_parallel_kdf: 1,
        }
    }
}

impl VaultConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration document. Missing sections take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: VaultConfig =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.io.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than 0".to_string()));
        }
        if self.io.max_parallel_kdf == 0 {
            return Err(Error::Config(
                "max_parallel_kdf must be greater than 0".to_string(),
            ));
        }
        crate::crypto::argon2id_params(self.argon2.m, self.argon2.t, self.argon2.p)
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(())
    }
}
