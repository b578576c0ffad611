//! Single-frame text encryption for short in-memory payloads

use secrecy::SecretString;

use crate::frame::{open_frame, seal_frame, Frame};
use crate::kdf::derive_key;
use crate::{SealError, SealResult};

/// Encrypt `plaintext` under `passphrase`, returning the `nonce::ciphertext` text form.
pub fn encrypt_text(plaintext: &str, passphrase: &SecretString) -> SealResult<String> {
    if plaintext.is_empty() {
        return Err(SealError::InvalidInput("text is required".into()));
    }
    let key = derive_key(passphrase)?;
    let frame = seal_frame(&key, plaintext.as_bytes())?;
    Ok(frame.to_text())
}

/// Decrypt a text-form frame produced by [`encrypt_text`].
pub fn decrypt_text(encoded: &str, passphrase: &SecretString) -> SealResult<String> {
    if encoded.is_empty() {
        return Err(SealError::InvalidInput("ciphertext is required".into()));
    }
    let key = derive_key(passphrase)?;
    let frame = Frame::from_text(encoded)?;
    let plaintext = open_frame(&key, &frame.nonce, &frame.ciphertext, 0)?;
    String::from_utf8(plaintext)
        .map_err(|e| SealError::InvalidEncoding(format!("decrypted text is not UTF-8: {e}")))
}
