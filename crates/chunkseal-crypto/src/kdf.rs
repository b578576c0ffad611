//! Key derivation: BLAKE2b-256 passphrase → symmetric key

use blake2::{digest::consts::U32, Blake2b, Digest};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use crate::{SealError, SealResult, KEY_LEN};

type Blake2b256 = Blake2b<U32>;

/// A 256-bit key derived from a passphrase.
///
/// Lives for one encrypt/decrypt call. Zeroized on drop.
#[derive(Clone)]
pub struct SymmetricKey {
    bytes: [u8; KEY_LEN],
}

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive the key for `passphrase`, rejecting an empty one.
///
/// Equivalent to libsodium `crypto_generichash(32, passphrase)`. Deliberately
/// unsalted so the same passphrase opens data sealed on any machine.
pub fn derive_key(passphrase: &SecretString) -> SealResult<SymmetricKey> {
    let passphrase = passphrase.expose_secret();
    if passphrase.is_empty() {
        return Err(SealError::InvalidInput("passphrase is required".into()));
    }
    Ok(derive_key_bytes(passphrase.as_bytes()))
}

/// Raw primitive: unkeyed BLAKE2b with a 32-byte digest. Accepts empty input.
pub fn derive_key_bytes(input: &[u8]) -> SymmetricKey {
    let mut bytes = [0u8; KEY_LEN];
    let mut hasher = Blake2b256::new();
    hasher.update(input);
    hasher.finalize_into((&mut bytes).into());
    SymmetricKey::from_bytes(bytes)
}
