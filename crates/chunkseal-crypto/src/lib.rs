//! chunkseal-crypto: passphrase-based authenticated encryption for text and files
//!
//! Primitives are byte-compatible with libsodium:
//! ```text
//! Passphrase ──BLAKE2b-256 (unkeyed, unsalted)──▶ SymmetricKey (32 bytes)
//!   └── Frame AEAD: XSalsa20-Poly1305 secretbox (nonce = random 192-bit, tag first)
//! ```
//!
//! Text form:   `base64url(nonce) "::" base64url(tag || ciphertext)`
//!
//! Stream form: `[24-byte nonce][tag || ciphertext]` repeated, no delimiters.
//! Every frame but the last carries exactly [`MAX_CHUNK`] plaintext bytes, so a
//! reader recovers frame boundaries from the stream length alone. An opt-in
//! versioned header (see [`header`]) records the chunk size and total length.
//!
//! Key derivation has no salt and no work factor. Identical passphrases yield
//! identical keys across machines and time; weak passphrases are brute-forceable.

pub mod frame;
pub mod header;
pub mod kdf;
pub mod stream;
pub mod text;

pub use chunkseal_core::{ProgressFn, SealError, SealResult, StreamFormat};
pub use frame::{decode_frame, encode_frame, open_frame, seal_frame, Frame};
pub use header::StreamHeader;
pub use kdf::{derive_key, derive_key_bytes, SymmetricKey};
pub use stream::{
    decrypt_reader, decrypt_stream, decrypt_stream_with, encrypt_reader, encrypt_stream,
    encrypt_stream_with, plan_chunks, stream_len, DecryptFrames, DecryptedChunk, EncryptFrames,
    StreamOptions,
};
pub use text::{decrypt_text, encrypt_text};

/// Size of a derived key in bytes (256-bit)
pub const KEY_LEN: usize = 32;

/// Size of an XSalsa20 nonce (192-bit)
pub const NONCE_LEN: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_LEN: usize = 16;

/// Largest ciphertext (tag included) a single stream frame carries
pub const MAX_CHUNK_ON_WIRE: usize = 5_600_000;

/// Largest plaintext chunk sealed into one stream frame
pub const MAX_CHUNK: usize = MAX_CHUNK_ON_WIRE - TAG_LEN;
