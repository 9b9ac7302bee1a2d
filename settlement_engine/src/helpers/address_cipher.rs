//! # Delivery address encryption
//!
//! Customer delivery addresses are stored encrypted with a key that belongs to the tenant. Each tenant has a 32-byte
//! XChaCha20-Poly1305 key, stored base64-encoded on the tenant record.
//!
//! The ciphertext format is
//!
//! ```text
//!    base64( nonce (24 bytes) || ciphertext + tag )
//! ```
//!
//! A fresh random nonce is used for every message, so encrypting the same address twice gives different results.
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Key,
    XChaCha20Poly1305,
    XNonce,
};
use thiserror::Error;

const NONCE_LENGTH: usize = 24;
const KEY_LENGTH: usize = 32;

#[derive(Debug, Clone, Error)]
pub enum CipherError {
    #[error("The encryption key is invalid: {0}")]
    InvalidKey(String),
    #[error("The ciphertext is not valid base64 or is too short")]
    MalformedCiphertext,
    #[error("Decryption failed. The ciphertext was tampered with, or the wrong key was used")]
    DecryptionFailed,
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("The decrypted address is not valid UTF-8")]
    InvalidUtf8,
}

/// Creates a new random tenant key, base64-encoded.
pub fn generate_tenant_key() -> String {
    let key = XChaCha20Poly1305::generate_key(&mut OsRng);
    base64::encode(key.as_slice())
}

fn cipher_for(key: &str) -> Result<XChaCha20Poly1305, CipherError> {
    let bytes = base64::decode(key.trim()).map_err(|e| CipherError::InvalidKey(e.to_string()))?;
    if bytes.len() != KEY_LENGTH {
        return Err(CipherError::InvalidKey(format!("expected {KEY_LENGTH} bytes, got {}", bytes.len())));
    }
    Ok(XChaCha20Poly1305::new(Key::from_slice(&bytes)))
}

pub fn encrypt_address(plaintext: &str, key: &str) -> Result<String, CipherError> {
    let cipher = cipher_for(key)?;
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher.encrypt(&nonce, plaintext.as_bytes()).map_err(|_| CipherError::EncryptionFailed)?;
    let mut message = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
    message.extend_from_slice(nonce.as_slice());
    message.extend_from_slice(&ciphertext);
    Ok(base64::encode(message))
}

pub fn decrypt_address(ciphertext: &str, key: &str) -> Result<String, CipherError> {
    let cipher = cipher_for(key)?;
    let message = base64::decode(ciphertext.trim()).map_err(|_| CipherError::MalformedCiphertext)?;
    if message.len() <= NONCE_LENGTH {
        return Err(CipherError::MalformedCiphertext);
    }
    let (nonce, data) = message.split_at(NONCE_LENGTH);
    let plaintext = cipher.decrypt(XNonce::from_slice(nonce), data).map_err(|_| CipherError::DecryptionFailed)?;
    String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
}
