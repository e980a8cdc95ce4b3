use std::fmt;

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use rand::RngCore;
use thiserror::Error;

/// Key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;
/// Length of an encoded key: padded base64 of 32 bytes.
pub const ENCODED_KEY_LEN: usize = 44;

const VERSION: u8 = 0x01;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + NONCE_LEN;

/// Per-file 256-bit symmetric key.
#[derive(Clone, PartialEq, Eq)]
pub struct FileKey([u8; KEY_LEN]);

impl From<[u8; KEY_LEN]> for FileKey {
    fn from(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }
}

// Never print key bytes.
impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FileKey(..)")
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    /// Key text is not valid base64 or has the wrong length.
    #[error("decode error: {0}")]
    Decode(String),
    /// Tag did not verify: wrong key, or corrupted/truncated ciphertext.
    #[error("authentication failed: invalid key or corrupted ciphertext")]
    Authentication,
    #[error("encrypt failed: {0}")]
    Encrypt(String),
}

/// Fresh key from the OS CSPRNG.
pub fn generate_key() -> FileKey {
    let mut bytes = [0u8; KEY_LEN];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    FileKey(bytes)
}

pub fn encode_key(key: &FileKey) -> String {
    URL_SAFE.encode(key.0)
}

pub fn decode_key(text: &str) -> Result<FileKey, CipherError> {
    let bytes = URL_SAFE
        .decode(text.trim())
        .map_err(|e| CipherError::Decode(e.to_string()))?;

    if bytes.len() != KEY_LEN {
        return Err(CipherError::Decode(format!(
            "expected {KEY_LEN} bytes, got {}",
            bytes.len()
        )));
    }

    let mut out = [0u8; KEY_LEN];
    out.copy_from_slice(&bytes);
    Ok(FileKey(out))
}

/// Encrypt the whole plaintext in one shot.
///
/// Layout: `version (1) || nonce (12) || ciphertext || tag (16)`.
pub fn encrypt(plaintext: &[u8], key: &FileKey) -> Result<Vec<u8>, CipherError> {
    let cipher = build_cipher(key)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CipherError::Encrypt(e.to_string()))?;

    let mut out = Vec::with_capacity(HEADER_LEN + sealed.len());
    out.push(VERSION);
    out.extend_from_slice(nonce.as_slice());
    out.extend_from_slice(&sealed);
    Ok(out)
}

pub fn decrypt(ciphertext: &[u8], key: &FileKey) -> Result<Vec<u8>, CipherError> {
    if ciphertext.len() < HEADER_LEN + TAG_LEN || ciphertext[0] != VERSION {
        return Err(CipherError::Authentication);
    }
    let (header, sealed) = ciphertext.split_at(HEADER_LEN);
    let nonce = Nonce::from_slice(&header[1..]);

    build_cipher(key)?
        .decrypt(nonce, sealed)
        .map_err(|_| CipherError::Authentication)
}

fn build_cipher(key: &FileKey) -> Result<Aes256Gcm, CipherError> {
    Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| CipherError::Encrypt(format!("cipher init failed: {e}")))
}
