//! Streaming AES-256-GCM with a single detached tag.
//!
//! The whole stream is one GCM message: ciphertext is byte-compatible with a
//! one-shot AES-256-GCM encryption of the same plaintext, but it is produced in
//! bounded chunks so memory use does not depend on the payload size.

use crate::config::{NONCE_LEN, TAG_LEN};
use crate::crypto::kdf::SecretKey;
use crate::error::{Error, Result};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit, KeyIvInit, StreamCipher};
use aes::{Aes256, Block};
use ghash::universal_hash::UniversalHash;
use ghash::GHash;
use std::io::{self, Read, Write};
use zeroize::Zeroize;

type Aes256Ctr = ctr::Ctr32BE<Aes256>;

const BLOCK_LEN: usize = 16;

/// GCM plaintext limit: 2^39 - 256 bits.
const MAX_PAYLOAD_LEN: u64 = (1 << 36) - 32;

/// Incremental GCM state: CTR keystream plus a running GHASH over the ciphertext.
struct GcmState {
    ctr: Aes256Ctr,
    ghash: GHash,
    tag_mask: Block,
    pending: [u8; BLOCK_LEN],
    pending_len: usize,
    aad_len: u64,
    data_len: u64,
}

impl GcmState {
    /// Set up the cipher and authenticate `aad` before any payload.
    fn new(key: &SecretKey, nonce: &[u8; NONCE_LEN], aad: &[u8]) -> Self {
        let aes = Aes256::new(GenericArray::from_slice(key.as_bytes()));

        let mut hash_key = Block::default();
        aes.encrypt_block(&mut hash_key);

        // J0 = nonce || 1; payload counter starts at J0 + 1.
        let mut j0 = [0u8; BLOCK_LEN];
        j0[..NONCE_LEN].copy_from_slice(nonce);
        j0[BLOCK_LEN - 1] = 1;

        let mut tag_mask = Block::clone_from_slice(&j0);
        aes.encrypt_block(&mut tag_mask);

        let mut counter = j0;
        counter[BLOCK_LEN - 1] = 2;
        let ctr = Aes256Ctr::new(
            GenericArray::from_slice(key.as_bytes()),
            GenericArray::from_slice(&counter),
        );

        let mut ghash = GHash::new(&hash_key);
        ghash.update_padded(aad);
        hash_key.as_mut_slice().zeroize();

        Self {
            ctr,
            ghash,
            tag_mask,
            pending: [0u8; BLOCK_LEN],
            pending_len: 0,
            aad_len: aad.len() as u64,
            data_len: 0,
        }
    }

    fn reserve(&mut self, len: usize) -> Result<()> {
        self.data_len = self
            .data_len
            .checked_add(len as u64)
            .filter(|total| *total <= MAX_PAYLOAD_LEN)
            .ok_or_else(|| Error::Encryption("payload exceeds the AES-GCM length limit".to_string()))?;
        Ok(())
    }

    fn apply_keystream(&mut self, buf: &mut [u8]) -> Result<()> {
        self.ctr
            .try_apply_keystream(buf)
            .map_err(|_| Error::Encryption("keystream exhausted".to_string()))
    }

    fn encrypt_in_place(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reserve(buf.len())?;
        self.apply_keystream(buf)?;
        self.absorb(buf);
        Ok(())
    }

    fn decrypt_in_place(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reserve(buf.len())?;
        self.absorb(buf);
        self.apply_keystream(buf)
    }

    /// Feed ciphertext into GHASH, carrying partial blocks across calls.
    fn absorb(&mut self, mut data: &[u8]) {
        if self.pending_len > 0 {
            let take = (BLOCK_LEN - self.pending_len).min(data.len());
            self.pending[self.pending_len..self.pending_len + take].copy_from_slice(&data[..take]);
            self.pending_len += take;
            data = &data[take..];
            if self.pending_len < BLOCK_LEN {
                return;
            }
            self.ghash.update(&[Block::clone_from_slice(&self.pending)]);
            self.pending_len = 0;
        }

        let mut blocks = data.chunks_exact(BLOCK_LEN);
        for block in &mut blocks {
            self.ghash.update(&[Block::clone_from_slice(block)]);
        }
        let rest = blocks.remainder();
        self.pending[..rest.len()].copy_from_slice(rest);
        self.pending_len = rest.len();
    }

    fn finish(mut self) -> (GHash, Block) {
        if self.pending_len > 0 {
            self.ghash.update_padded(&self.pending[..self.pending_len]);
        }

        let mut lengths = [0u8; BLOCK_LEN];
        lengths[..8].copy_from_slice(&(self.aad_len * 8).to_be_bytes());
        lengths[8..].copy_from_slice(&(self.data_len * 8).to_be_bytes());
        self.ghash.update(&[Block::clone_from_slice(&lengths)]);

        (self.ghash, self.tag_mask)
    }

    fn tag(self) -> [u8; TAG_LEN] {
        let (ghash, mask) = self.finish();
        let digest = ghash.finalize();

        let mut tag = [0u8; TAG_LEN];
        for (out, (d, m)) in tag.iter_mut().zip(digest.iter().zip(mask.iter())) {
            *out = d ^ m;
        }
        tag
    }

    /// Constant-time tag comparison.
    fn verify(self, tag: &[u8; TAG_LEN]) -> Result<()> {
        let (ghash, mask) = self.finish();

        let mut expected = Block::clone_from_slice(tag);
        for (e, m) in expected.iter_mut().zip(mask.iter()) {
            *e ^= m;
        }
        ghash.verify(&expected).map_err(|_| Error::Integrity)
    }
}

/// Fill `buf` from `reader`; returns fewer bytes only at end of stream.
fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn check_chunk_size(chunk_size: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(Error::Validation("chunk size must be greater than 0".to_string()));
    }
    Ok(())
}

/// Encrypt everything `reader` yields into `writer`.
///
/// `aad` is authenticated once, before the first chunk. Returns the number of
/// ciphertext bytes written and the tag, which exists only once the whole
/// stream has been consumed.
pub fn encrypt_stream<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    key: &SecretKey,
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    chunk_size: usize,
) -> Result<(u64, [u8; TAG_LEN])> {
    check_chunk_size(chunk_size)?;

    let mut state = GcmState::new(key, nonce, aad);
    let mut buf = vec![0u8; chunk_size];
    let mut written = 0u64;

    loop {
        let n = read_chunk(reader, &mut buf)?;
        if n == 0 {
            break;
        }
        state.encrypt_in_place(&mut buf[..n])?;
        writer.write_all(&buf[..n])?;
        written += n as u64;
        if n < chunk_size {
            break;
        }
    }
    writer.flush()?;

    Ok((written, state.tag()))
}

/// Decrypt everything `reader` yields into `writer`.
///
/// Plaintext reaches `writer` chunk by chunk before the tag is checked at the
/// end. Until this returns `Ok`, the contents of `writer` are untrusted and
/// must be discarded on error.
pub fn decrypt_stream<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    key: &SecretKey,
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    tag: &[u8; TAG_LEN],
    chunk_size: usize,
) -> Result<u64> {
    check_chunk_size(chunk_size)?;

    let mut state = GcmState::new(key, nonce, aad);
    let mut buf = vec![0u8; chunk_size];
    let mut written = 0u64;

    let result = loop {
        let n = match read_chunk(reader, &mut buf) {
            Ok(n) => n,
            Err(e) => break Err(e.into()),
        };
        if n == 0 {
            break Ok(());
        }
        if let Err(e) = state.decrypt_in_place(&mut buf[..n]) {
            break Err(e);
        }
        if let Err(e) = writer.write_all(&buf[..n]) {
            break Err(e.into());
        }
        written += n as u64;
        if n < chunk_size {
            break Ok(());
        }
    };
    buf.zeroize();
    result?;

    writer.flush()?;
    state.verify(tag)?;
    Ok(written)
}
