//! Resilience tests - tamper with containers and verify nothing is released.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use nyb::config::{Argon2Config, MAGIC};
use nyb::container::header::{self, Header};
use nyb::{ContainerCodec, ErrorKind, Outcome, VaultConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PASSWORD: &[u8] = b"resilience_test";

fn fast_codec() -> ContainerCodec {
    let mut config = VaultConfig::default();
    config.argon2 = Argon2Config {
        m: 1024 * 1024,
        t: 1,
        p: 1,
    };
    config.io.chunk_size = 256;
    config.defaults.remove_nyb_after_decrypt = false;
    ContainerCodec::new(config).unwrap()
}

fn password() -> Vec<u8> {
    PASSWORD.to_vec()
}

/// Encrypt `a.txt` and remove the original, leaving only the container.
fn setup_container(temp_dir: &TempDir, content: &[u8]) -> PathBuf {
    let source = temp_dir.path().join("a.txt");
    fs::write(&source, content).unwrap();
    let container = match fast_codec().encrypt_file(&source, &password).unwrap() {
        Outcome::Processed(path) => path,
        other => panic!("unexpected {other:?}"),
    };
    fs::remove_file(&source).unwrap();
    container
}

fn header_len(bytes: &[u8]) -> usize {
    u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize
}

/// The directory must hold the container and nothing else.
fn assert_nothing_released(temp_dir: &TempDir, container: &Path) {
    let entries: Vec<PathBuf> = fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(entries, vec![container.to_path_buf()], "leftover files: {entries:?}");
}

fn decrypt_error_kind(container: &Path) -> ErrorKind {
    fast_codec()
        .decrypt_file(container, &password)
        .expect_err("decrypt should fail")
        .kind()
}

/// Overwrite `len` bytes at the first match of `needle` plus `skip`.
fn patch_after(bytes: &mut [u8], needle: &[u8], skip: usize, with: &[u8]) {
    let at = bytes
        .windows(needle.len())
        .position(|w| w == needle)
        .expect("needle not found")
        + needle.len()
        + skip;
    bytes[at..at + with.len()].copy_from_slice(with);
}

#[test]
fn test_flipped_ciphertext_byte() {
    let temp_dir = TempDir::new().unwrap();
    let container = setup_container(&temp_dir, &[7u8; 1000]);

    let mut bytes = fs::read(&container).unwrap();
    let payload_start = 8 + header_len(&bytes);
    bytes[payload_start + 500] ^= 0x01;
    fs::write(&container, &bytes).unwrap();

    assert_eq!(decrypt_error_kind(&container), ErrorKind::Integrity);
    assert_nothing_released(&temp_dir, &container);
}

#[test]
fn test_truncated_payload() {
    let temp_dir = TempDir::new().unwrap();
    let container = setup_container(&temp_dir, &[7u8; 1000]);

    let bytes = fs::read(&container).unwrap();
    fs::write(&container, &bytes[..bytes.len() - 1]).unwrap();

    assert_eq!(decrypt_error_kind(&container), ErrorKind::Integrity);
    assert_nothing_released(&temp_dir, &container);
}

#[test]
fn test_tampered_original_name() {
    let temp_dir = TempDir::new().unwrap();
    let container = setup_container(&temp_dir, b"name bound to payload");

    let mut bytes = fs::read(&container).unwrap();
    patch_after(&mut bytes, b"\"original_name\":\"", 0, b"b");
    fs::write(&container, &bytes).unwrap();

    assert_eq!(decrypt_error_kind(&container), ErrorKind::Integrity);
    assert_nothing_released(&temp_dir, &container);
}

#[test]
fn test_tampered_mtime() {
    let temp_dir = TempDir::new().unwrap();
    let container = setup_container(&temp_dir, b"mtime bound to payload");

    let mut bytes = fs::read(&container).unwrap();
    let start = bytes
        .windows(8)
        .position(|w| w == b"\"mtime\":")
        .unwrap()
        + 8;
    let digits = bytes[start..].iter().take_while(|b| b.is_ascii_digit()).count();
    let last = start + digits - 1;
    bytes[last] = if bytes[last] == b'9' { b'0' } else { bytes[last] + 1 };
    fs::write(&container, &bytes).unwrap();

    assert_eq!(decrypt_error_kind(&container), ErrorKind::Integrity);
    assert_nothing_released(&temp_dir, &container);
}

#[test]
fn test_wrong_password() {
    let temp_dir = TempDir::new().unwrap();
    let container = setup_container(&temp_dir, b"secret");

    let err = fast_codec()
        .decrypt_file(&container, &|| b"wrong".to_vec())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert_nothing_released(&temp_dir, &container);
}

#[test]
fn test_bad_magic() {
    let temp_dir = TempDir::new().unwrap();
    let container = setup_container(&temp_dir, b"secret");

    let mut bytes = fs::read(&container).unwrap();
    bytes[..4].copy_from_slice(b"NYB2");
    fs::write(&container, &bytes).unwrap();

    assert_eq!(decrypt_error_kind(&container), ErrorKind::Validation);
    assert_nothing_released(&temp_dir, &container);
}

#[test]
fn test_truncated_header() {
    let temp_dir = TempDir::new().unwrap();
    let container = setup_container(&temp_dir, b"secret");

    let bytes = fs::read(&container).unwrap();
    fs::write(&container, &bytes[..20]).unwrap();

    assert_eq!(decrypt_error_kind(&container), ErrorKind::Validation);
    assert_nothing_released(&temp_dir, &container);
}

#[test]
fn test_oversized_header_length() {
    let temp_dir = TempDir::new().unwrap();
    let container = setup_container(&temp_dir, b"secret");

    let mut bytes = fs::read(&container).unwrap();
    bytes[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
    fs::write(&container, &bytes).unwrap();

    assert_eq!(decrypt_error_kind(&container), ErrorKind::Validation);
    assert_nothing_released(&temp_dir, &container);
}

/// Re-frame the container with an edited header, keeping the payload.
fn rewrite_header(container: &Path, edit: impl FnOnce(&mut serde_json::Value)) {
    let bytes = fs::read(container).unwrap();
    let len = header_len(&bytes);
    let mut json: serde_json::Value = serde_json::from_slice(&bytes[8..8 + len]).unwrap();
    edit(&mut json);

    let mut out = header::pack(&MAGIC, &serde_json::to_vec(&json).unwrap()).unwrap();
    out.extend_from_slice(&bytes[8 + len..]);
    fs::write(container, out).unwrap();
}

/// Rewrite one header value and expect the tag check to catch it.
fn assert_value_tamper_detected(edit: impl FnOnce(&mut serde_json::Value)) {
    let temp_dir = TempDir::new().unwrap();
    let container = setup_container(&temp_dir, b"every header value is bound to the payload");

    rewrite_header(&container, edit);

    assert_eq!(decrypt_error_kind(&container), ErrorKind::Integrity);
    assert_nothing_released(&temp_dir, &container);
}

#[test]
fn test_tampered_read_only_flag() {
    assert_value_tamper_detected(|json| {
        json["meta"]["attribs"]["ro"] = serde_json::json!(true);
    });
}

#[test]
fn test_tampered_hidden_flag() {
    assert_value_tamper_detected(|json| {
        let hidden = json["meta"]["attribs"]["hidden"].as_bool().unwrap();
        json["meta"]["attribs"]["hidden"] = serde_json::json!(!hidden);
    });
}

#[test]
fn test_tampered_kdf_time_cost() {
    assert_value_tamper_detected(|json| {
        assert_eq!(json["kdf"]["t"], 1);
        json["kdf"]["t"] = serde_json::json!(2);
    });
}

#[test]
fn test_tampered_kdf_memory_cost() {
    assert_value_tamper_detected(|json| {
        assert_eq!(json["kdf"]["m"], 1024 * 1024);
        json["kdf"]["m"] = serde_json::json!(2 * 1024 * 1024);
    });
}

#[test]
fn test_tampered_salt() {
    assert_value_tamper_detected(|json| {
        json["kdf"]["salt"] = serde_json::json!(STANDARD.encode([0x5au8; 16]));
    });
}

#[test]
fn test_tampered_nonce() {
    assert_value_tamper_detected(|json| {
        json["cipher"]["nonce"] = serde_json::json!(STANDARD.encode([0xa5u8; 12]));
    });
}

#[test]
fn test_unknown_header_field() {
    let temp_dir = TempDir::new().unwrap();
    let container = setup_container(&temp_dir, b"secret");

    rewrite_header(&container, |json| {
        json["extra"] = serde_json::json!(true);
    });

    assert_eq!(decrypt_error_kind(&container), ErrorKind::Validation);
    assert_nothing_released(&temp_dir, &container);
}

#[test]
fn test_missing_tag() {
    let temp_dir = TempDir::new().unwrap();
    let container = setup_container(&temp_dir, b"secret");

    rewrite_header(&container, |json| {
        json["cipher"].as_object_mut().unwrap().remove("tag");
    });

    assert_eq!(decrypt_error_kind(&container), ErrorKind::Validation);
    assert_nothing_released(&temp_dir, &container);
}

#[test]
fn test_unbounded_kdf_cost_rejected_before_derivation() {
    let temp_dir = TempDir::new().unwrap();
    let container = setup_container(&temp_dir, b"secret");

    rewrite_header(&container, |json| {
        json["kdf"]["t"] = serde_json::json!(1_000_000);
    });

    assert_eq!(decrypt_error_kind(&container), ErrorKind::Validation);
    assert_nothing_released(&temp_dir, &container);
}

#[test]
fn test_traversal_name_restores_beside_container() {
    let temp_dir = TempDir::new().unwrap();
    let inner = temp_dir.path().join("inner");
    fs::create_dir(&inner).unwrap();

    // Build a container whose authenticated name tries to escape its directory.
    let source = inner.join("x.txt");
    fs::write(&source, b"payload").unwrap();
    let codec = fast_codec();
    let container = match codec.encrypt_file(&source, &password).unwrap() {
        Outcome::Processed(path) => path,
        other => panic!("unexpected {other:?}"),
    };
    fs::remove_file(&source).unwrap();

    let bytes = fs::read(&container).unwrap();
    let (parsed, offset) = header::unpack(&mut bytes.as_slice()).unwrap();
    let mut hostile: Header = parsed;
    hostile.meta.original_name = "../escaped.txt".to_string();
    hostile.cipher.tag = None;
    let untagged = hostile.to_canonical_bytes().unwrap();

    // Re-encrypt the payload under the new header so the tag verifies.
    let key = nyb::crypto::KeyDerivation::from_salt(hostile.kdf.salt, hostile.kdf.costs())
        .derive_key(PASSWORD)
        .unwrap();
    let mut ciphertext = Vec::new();
    let (_, tag) = nyb::crypto::encrypt_stream(
        &mut &b"payload"[..],
        &mut ciphertext,
        &key,
        &hostile.cipher.nonce,
        &untagged,
        256,
    )
    .unwrap();
    let mut out = header::pack(&MAGIC, &header::add_tag(&untagged, &tag).unwrap()).unwrap();
    out.extend_from_slice(&ciphertext);
    assert!(offset > 0);
    fs::write(&container, out).unwrap();

    let restored = match codec.decrypt_file(&container, &password).unwrap() {
        Outcome::Processed(path) => path,
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(restored, inner.join("x.txt"));
    assert!(!temp_dir.path().join("escaped.txt").exists());
    assert_eq!(fs::read(restored).unwrap(), b"payload");
}
