//! Container header: canonical JSON plus binary framing.
//!
//! The header without `cipher.tag` is the associated data of the payload
//! encryption, so its byte encoding must be reproducible. Serialization goes
//! through the typed structs below: compact `serde_json` output with fields in
//! declaration order, non-ASCII characters written as-is.

use crate::config::{
    argon2_params, Argon2Config, FORMAT_NAME, MAGIC, MAX_HEADER_LEN, NONCE_LEN, SALT_LEN, TAG_LEN,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::{self, Read};

/// Bytes before the header JSON: magic plus the little-endian length.
pub const PREFIX_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KdfAlgorithm {
    #[serde(rename = "argon2id")]
    Argon2id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CipherAlgorithm {
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
}

/// Key derivation parameters. `m` is the memory cost in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KdfParams {
    pub algo: KdfAlgorithm,
    pub m: u64,
    pub t: u32,
    pub p: u32,
    #[serde(with = "b64")]
    pub salt: [u8; SALT_LEN],
}

impl KdfParams {
    pub fn argon2id(salt: [u8; SALT_LEN], costs: &Argon2Config) -> Self {
        Self {
            algo: KdfAlgorithm::Argon2id,
            m: costs.m,
            t: costs.t,
            p: costs.p,
            salt,
        }
    }

    pub fn costs(&self) -> Argon2Config {
        Argon2Config {
            m: self.m,
            t: self.t,
            p: self.p,
        }
    }

    /// Reject costs no legitimate container carries.
    pub fn check_bounds(&self) -> Result<()> {
        if self.m > argon2_params::MAX_MEMORY_COST {
            return Err(Error::Validation(format!("kdf memory cost too large: {}", self.m)));
        }
        if self.t == 0 || self.t > argon2_params::MAX_TIME_COST {
            return Err(Error::Validation(format!("kdf time cost out of range: {}", self.t)));
        }
        if self.p == 0 || self.p > argon2_params::MAX_PARALLELISM {
            return Err(Error::Validation(format!("kdf parallelism out of range: {}", self.p)));
        }
        Ok(())
    }
}

/// Cipher parameters. `tag` is absent until encryption completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CipherParams {
    pub algo: CipherAlgorithm,
    #[serde(with = "b64")]
    pub nonce: [u8; NONCE_LEN],
    #[serde(default, skip_serializing_if = "Option::is_none", with = "b64_opt")]
    pub tag: Option<[u8; TAG_LEN]>,
}

impl CipherParams {
    pub fn aes_256_gcm(nonce: [u8; NONCE_LEN]) -> Self {
        Self {
            algo: CipherAlgorithm::Aes256Gcm,
            nonce,
            tag: None,
        }
    }
}

/// Attribute flags carried in `meta.attribs`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetaAttribs {
    pub ro: bool,
    pub hidden: bool,
}

/// Source file metadata restored on decrypt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileMeta {
    pub original_name: String,
    pub mtime: i64,
    pub attribs: MetaAttribs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppInfo {
    pub format: String,
    pub ver: String,
}

impl AppInfo {
    /// Identification written by this build.
    pub fn current() -> Self {
        Self {
            format: FORMAT_NAME.to_string(),
            ver: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// The complete header with exactly the top-level keys `kdf`, `cipher`, `meta`, `app`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Header {
    pub kdf: KdfParams,
    pub cipher: CipherParams,
    pub meta: FileMeta,
    pub app: AppInfo,
}

impl Header {
    /// Parse header JSON. Fails on invalid UTF-8, malformed JSON, or a schema mismatch.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Canonical byte encoding.
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Rebuild the associated data: the canonical encoding with the tag removed.
    pub fn aad(&self) -> Result<Vec<u8>> {
        let mut untagged = self.clone();
        untagged.cipher.tag = None;
        let bytes = untagged.to_canonical_bytes()?;
        compute_aad(&bytes)?;
        Ok(bytes)
    }

    /// The tag, which a finished container must carry.
    pub fn tag(&self) -> Result<&[u8; TAG_LEN]> {
        self.cipher
            .tag
            .as_ref()
            .ok_or_else(|| Error::Validation("cipher.tag missing".to_string()))
    }

    /// Checks beyond the schema: format name and KDF cost bounds.
    pub fn validate(&self) -> Result<()> {
        if self.app.format != FORMAT_NAME {
            return Err(Error::Validation(format!(
                "unsupported format: {}",
                self.app.format
            )));
        }
        self.kdf.check_bounds()
    }
}

/// Serialize a header without a tag.
pub fn build(
    kdf: &KdfParams,
    cipher_without_tag: &CipherParams,
    meta: &FileMeta,
    app: &AppInfo,
) -> Result<Vec<u8>> {
    if cipher_without_tag.tag.is_some() {
        return Err(Error::Validation(
            "cipher.tag must not be present before encryption".to_string(),
        ));
    }
    Header {
        kdf: kdf.clone(),
        cipher: cipher_without_tag.clone(),
        meta: meta.clone(),
        app: app.clone(),
    }
    .to_canonical_bytes()
}

/// Return `header_json` with `cipher.tag` set.
pub fn add_tag(header_json: &[u8], tag: &[u8; TAG_LEN]) -> Result<Vec<u8>> {
    let mut header = Header::from_json(header_json)?;
    if header.cipher.tag.is_some() {
        return Err(Error::Validation("cipher.tag already present".to_string()));
    }
    header.cipher.tag = Some(*tag);
    header.to_canonical_bytes()
}

/// Frame a header: `magic || len (u32 LE) || header_json`.
pub fn pack(magic: &[u8; 4], header_json: &[u8]) -> Result<Vec<u8>> {
    if *magic != MAGIC {
        return Err(Error::Validation("invalid magic for NYB pack".to_string()));
    }
    if header_json.is_empty() {
        return Err(Error::Validation("header JSON cannot be empty".to_string()));
    }
    if header_json.len() > MAX_HEADER_LEN {
        return Err(Error::Validation("header JSON too large".to_string()));
    }

    let mut out = Vec::with_capacity(PREFIX_LEN + header_json.len());
    out.extend_from_slice(magic);
    out.extend_from_slice(&(header_json.len() as u32).to_le_bytes());
    out.extend_from_slice(header_json);
    Ok(out)
}

fn read_field<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            Error::Validation(format!("unexpected end of data while reading {}", what))
        }
        _ => Error::Io(e),
    })
}

/// Read a framed header. Returns the parsed header and the payload offset.
///
/// The reader is left positioned at the first payload byte.
pub fn unpack<R: Read>(reader: &mut R) -> Result<(Header, u64)> {
    let mut magic = [0u8; 4];
    read_field(reader, &mut magic, "magic")?;
    if magic != MAGIC {
        return Err(Error::Validation("bad magic".to_string()));
    }

    let mut len_bytes = [0u8; 4];
    read_field(reader, &mut len_bytes, "header length")?;
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    if header_len == 0 || header_len > MAX_HEADER_LEN {
        return Err(Error::Validation(format!(
            "unreasonable header length: {}",
            header_len
        )));
    }

    // Grow as data arrives instead of trusting the declared length up front.
    let mut json = Vec::new();
    reader
        .by_ref()
        .take(header_len as u64)
        .read_to_end(&mut json)?;
    if json.len() != header_len {
        return Err(Error::Validation(
            "unexpected end of data while reading header JSON".to_string(),
        ));
    }

    let header = Header::from_json(&json)?;
    Ok((header, (PREFIX_LEN + header_len) as u64))
}

/// Validate that `header_json_without_tag` carries no tag and return it unchanged.
pub fn compute_aad(header_json_without_tag: &[u8]) -> Result<&[u8]> {
    let header = Header::from_json(header_json_without_tag)?;
    if header.cipher.tag.is_some() {
        return Err(Error::Validation(
            "cipher.tag must not be present when computing AAD".to_string(),
        ));
    }
    Ok(header_json_without_tag)
}

mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let text = String::deserialize(deserializer)?;
        let raw = STANDARD.decode(text.as_bytes()).map_err(D::Error::custom)?;
        raw.try_into().map_err(|raw: Vec<u8>| {
            D::Error::custom(format!("expected {} bytes, got {}", N, raw.len()))
        })
    }
}

mod b64_opt {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &Option<[u8; N]>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => super::b64::serialize(bytes, serializer),
            None => serializer.serialize_none(),
        }
    }

    /// A present field must be a string; absence is handled by `#[serde(default)]`.
    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<Option<[u8; N]>, D::Error> {
        super::b64::deserialize(deserializer).map(Some)
    }
}
