//! Single-frame XSalsa20-Poly1305 sealing and the two frame encodings
//!
//! Binary form (one stream frame):
//! ```text
//! [24 bytes: random nonce][16 bytes: Poly1305 tag][N bytes: ciphertext]
//! ```
//! The ciphertext length is not recorded; it is whatever the stream's chunk
//! plan leaves for this frame (see `decode_frame`).
//!
//! Text form: `base64url(nonce) + "::" + base64url(tag || ciphertext)`.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use crypto_secretbox::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    XSalsa20Poly1305,
};
use rand::RngCore;

use crate::kdf::SymmetricKey;
use crate::{SealError, SealResult, MAX_CHUNK_ON_WIRE, NONCE_LEN, TAG_LEN};

/// Separator between the nonce and ciphertext in the text form
pub const TEXT_SEPARATOR: &str = "::";

/// URL-safe alphabet, unpadded on encode, padding-tolerant on decode.
const TEXT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// One sealed unit: a nonce and the authenticated ciphertext it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub nonce: [u8; NONCE_LEN],
    /// Tag followed by ciphertext; always `plaintext.len() + TAG_LEN` bytes
    pub ciphertext: Vec<u8>,
}

impl Frame {
    /// Length of the binary encoding
    pub fn encoded_len(&self) -> usize {
        NONCE_LEN + self.ciphertext.len()
    }

    /// Append the binary encoding to `out`.
    pub fn write_binary(&self, out: &mut Vec<u8>) {
        out.reserve(self.encoded_len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
    }

    pub fn to_text(&self) -> String {
        format!(
            "{}{TEXT_SEPARATOR}{}",
            TEXT_ENGINE.encode(self.nonce),
            TEXT_ENGINE.encode(&self.ciphertext)
        )
    }

    /// Parse the text form. Splits on the first `::`.
    pub fn from_text(encoded: &str) -> SealResult<Self> {
        let (nonce_b64, cipher_b64) = encoded.split_once(TEXT_SEPARATOR).ok_or_else(|| {
            SealError::MalformedFrame(format!("missing '{TEXT_SEPARATOR}' separator"))
        })?;
        if nonce_b64.is_empty() || cipher_b64.is_empty() {
            return Err(SealError::MalformedFrame(
                "nonce and ciphertext must both be present".into(),
            ));
        }

        let nonce_bytes = TEXT_ENGINE
            .decode(nonce_b64)
            .map_err(|e| SealError::MalformedFrame(format!("nonce is not valid base64: {e}")))?;
        let nonce: [u8; NONCE_LEN] = nonce_bytes.as_slice().try_into().map_err(|_| {
            SealError::MalformedFrame(format!(
                "nonce is {} bytes (expected {NONCE_LEN})",
                nonce_bytes.len()
            ))
        })?;

        let ciphertext = TEXT_ENGINE.decode(cipher_b64).map_err(|e| {
            SealError::MalformedFrame(format!("ciphertext is not valid base64: {e}"))
        })?;
        if ciphertext.len() < TAG_LEN {
            return Err(SealError::MalformedFrame(format!(
                "ciphertext is {} bytes (minimum {TAG_LEN})",
                ciphertext.len()
            )));
        }

        Ok(Self { nonce, ciphertext })
    }
}

/// Binary encoding of one frame: nonce immediately followed by ciphertext.
pub fn encode_frame(nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(nonce);
    out.extend_from_slice(ciphertext);
    out
}

/// Decode the legacy-layout frame starting at `offset` in `bytes`.
///
/// The ciphertext spans `min(MAX_CHUNK_ON_WIRE, bytes remaining after the nonce)`.
/// Returns `(nonce, ciphertext, bytes_consumed)`.
pub fn decode_frame(bytes: &[u8], offset: usize) -> SealResult<([u8; NONCE_LEN], &[u8], usize)> {
    decode_frame_with(bytes, offset, MAX_CHUNK_ON_WIRE)
}

/// `decode_frame` with an explicit per-frame ciphertext ceiling.
pub fn decode_frame_with(
    bytes: &[u8],
    offset: usize,
    max_ciphertext: usize,
) -> SealResult<([u8; NONCE_LEN], &[u8], usize)> {
    let available = bytes.len().saturating_sub(offset);
    if available < NONCE_LEN {
        return Err(SealError::TruncatedStream {
            offset: offset as u64,
            needed: NONCE_LEN as u64,
            available: available as u64,
        });
    }

    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&bytes[offset..offset + NONCE_LEN]);

    let cipher_start = offset + NONCE_LEN;
    let cipher_len = max_ciphertext.min(available - NONCE_LEN);
    if cipher_len < TAG_LEN {
        return Err(SealError::TruncatedStream {
            offset: cipher_start as u64,
            needed: TAG_LEN as u64,
            available: cipher_len as u64,
        });
    }

    let ciphertext = &bytes[cipher_start..cipher_start + cipher_len];
    Ok((nonce, ciphertext, NONCE_LEN + cipher_len))
}

/// Seal `plaintext` under a fresh random nonce.
pub fn seal_frame(key: &SymmetricKey, plaintext: &[u8]) -> SealResult<Frame> {
    let cipher = XSalsa20Poly1305::new(key.as_bytes().into());
    let nonce = fresh_nonce();

    let ciphertext = cipher
        .encrypt(GenericArray::from_slice(&nonce), plaintext)
        .map_err(|e| SealError::EncryptionFailed(e.to_string()))?;

    Ok(Frame { nonce, ciphertext })
}

/// Authenticate and decrypt one frame. `offset` is only used for diagnostics.
pub fn open_frame(
    key: &SymmetricKey,
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
    offset: u64,
) -> SealResult<Vec<u8>> {
    let cipher = XSalsa20Poly1305::new(key.as_bytes().into());
    cipher
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| SealError::DecryptionFailed { offset })
}

fn fresh_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::derive_key_bytes;
    use base64::Engine as _;

    fn test_key() -> SymmetricKey {
        SymmetricKey::from_bytes([42u8; 32])
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = test_key();
        let frame = seal_frame(&key, b"hello, sealed world!").unwrap();
        let plaintext = open_frame(&key, &frame.nonce, &frame.ciphertext, 0).unwrap();
        assert_eq!(plaintext, b"hello, sealed world!");
    }

    #[test]
    fn test_sealed_size() {
        let frame = seal_frame(&test_key(), &[0u8; 1000]).unwrap();
        assert_eq!(frame.ciphertext.len(), 1000 + TAG_LEN);
        assert_eq!(frame.encoded_len(), NONCE_LEN + 1000 + TAG_LEN);
    }

    #[test]
    fn test_open_wrong_key() {
        let frame = seal_frame(&derive_key_bytes(b"one"), b"secret data").unwrap();
        let err = open_frame(&derive_key_bytes(b"two"), &frame.nonce, &frame.ciphertext, 77)
            .unwrap_err();
        assert!(matches!(err, SealError::DecryptionFailed { offset: 77 }));
    }

    #[test]
    fn test_open_tampered_tag() {
        let key = test_key();
        let mut frame = seal_frame(&key, b"secret data").unwrap();
        frame.ciphertext[0] ^= 0x01;
        assert!(open_frame(&key, &frame.nonce, &frame.ciphertext, 0).is_err());
    }

    #[test]
    fn test_text_form_roundtrip() {
        let frame = seal_frame(&test_key(), b"text").unwrap();
        let encoded = frame.to_text();
        assert_eq!(encoded.matches(TEXT_SEPARATOR).count(), 1);
        assert!(!encoded.contains('='), "text form is unpadded");
        assert_eq!(Frame::from_text(&encoded).unwrap(), frame);
    }

    #[test]
    fn test_text_form_accepts_padding() {
        let frame = seal_frame(&test_key(), b"pad me").unwrap();
        let padded = format!(
            "{}::{}",
            base64::engine::general_purpose::URL_SAFE.encode(frame.nonce),
            base64::engine::general_purpose::URL_SAFE.encode(&frame.ciphertext)
        );
        assert_eq!(Frame::from_text(&padded).unwrap(), frame);
    }

    #[test]
    fn test_text_form_missing_separator() {
        let err = Frame::from_text("abcdef").unwrap_err();
        assert!(matches!(err, SealError::MalformedFrame(_)));
    }

    #[test]
    fn test_text_form_empty_part() {
        assert!(matches!(
            Frame::from_text("::abcd").unwrap_err(),
            SealError::MalformedFrame(_)
        ));
        assert!(matches!(
            Frame::from_text("abcd::").unwrap_err(),
            SealError::MalformedFrame(_)
        ));
    }

    #[test]
    fn test_text_form_bad_base64() {
        let err = Frame::from_text("!!!!::????").unwrap_err();
        assert!(matches!(err, SealError::MalformedFrame(_)));
    }

    #[test]
    fn test_text_form_wrong_nonce_length() {
        let short = TEXT_ENGINE.encode([0u8; 12]);
        let ct = TEXT_ENGINE.encode([0u8; 32]);
        let err = Frame::from_text(&format!("{short}::{ct}")).unwrap_err();
        assert!(matches!(err, SealError::MalformedFrame(_)));
    }

    #[test]
    fn test_decode_frame_consumes_remaining() {
        let frame = seal_frame(&test_key(), b"abc").unwrap();
        let bytes = encode_frame(&frame.nonce, &frame.ciphertext);

        let (nonce, ciphertext, consumed) = decode_frame(&bytes, 0).unwrap();
        assert_eq!(nonce, frame.nonce);
        assert_eq!(ciphertext, frame.ciphertext.as_slice());
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_decode_frame_caps_ciphertext() {
        let bytes = vec![7u8; NONCE_LEN + 100];
        let (_, ciphertext, consumed) = decode_frame_with(&bytes, 0, 40).unwrap();
        assert_eq!(ciphertext.len(), 40);
        assert_eq!(consumed, NONCE_LEN + 40);
    }

    #[test]
    fn test_decode_frame_short_nonce() {
        let bytes = vec![0u8; 10];
        let err = decode_frame(&bytes, 0).unwrap_err();
        assert!(matches!(
            err,
            SealError::TruncatedStream {
                offset: 0,
                needed: 24,
                available: 10
            }
        ));
    }

    #[test]
    fn test_decode_frame_short_ciphertext() {
        let bytes = vec![0u8; 100 + NONCE_LEN + 5];
        let err = decode_frame(&bytes, 100).unwrap_err();
        assert!(matches!(
            err,
            SealError::TruncatedStream {
                offset: 124,
                needed: 16,
                available: 5
            }
        ));
    }
}
