//! Opt-in versioned stream header
//!
//! ```text
//! [8 bytes: magic "CHNKSEAL"][1 byte: version = 1]
//! [4 bytes: chunk size, BE][8 bytes: total plaintext length, BE]
//! ```
//!
//! Frames follow in the legacy layout. With the chunk size and total length
//! recorded, every frame boundary and the exact stream length are known up
//! front, so truncation is detected before any frame is opened and files stay
//! readable if the default chunk size ever changes.

use crate::{SealError, SealResult, NONCE_LEN, TAG_LEN};

pub const MAGIC: &[u8; 8] = b"CHNKSEAL";
pub const VERSION: u8 = 1;
pub const HEADER_LEN: usize = MAGIC.len() + 1 + 4 + 8;

/// Upper bound on a recorded chunk size; bounds per-frame allocation.
pub const MAX_HEADER_CHUNK: u32 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    pub chunk_size: u32,
    pub total_len: u64,
}

impl StreamHeader {
    pub fn new(chunk_size: usize, total_len: u64) -> Self {
        Self {
            chunk_size: chunk_size as u32,
            total_len,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..8].copy_from_slice(MAGIC);
        out[8] = VERSION;
        out[9..13].copy_from_slice(&self.chunk_size.to_be_bytes());
        out[13..21].copy_from_slice(&self.total_len.to_be_bytes());
        out
    }

    /// Parse a header if `bytes` starts with the magic.
    ///
    /// `Ok(None)` means a headerless legacy stream.
    pub fn detect(bytes: &[u8]) -> SealResult<Option<Self>> {
        if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
            return Ok(None);
        }
        if bytes.len() < HEADER_LEN {
            return Err(SealError::TruncatedStream {
                offset: 0,
                needed: HEADER_LEN as u64,
                available: bytes.len() as u64,
            });
        }
        if bytes[8] != VERSION {
            return Err(SealError::UnsupportedVersion(bytes[8]));
        }

        let chunk_size = u32::from_be_bytes([bytes[9], bytes[10], bytes[11], bytes[12]]);
        if chunk_size == 0 || chunk_size > MAX_HEADER_CHUNK {
            return Err(SealError::MalformedFrame(format!(
                "header chunk size {chunk_size} out of range (1..={MAX_HEADER_CHUNK})"
            )));
        }
        let mut total = [0u8; 8];
        total.copy_from_slice(&bytes[13..21]);

        let header = Self {
            chunk_size,
            total_len: u64::from_be_bytes(total),
        };
        if header.checked_stream_len().is_none() {
            return Err(SealError::MalformedFrame(format!(
                "header total length {} exceeds the addressable stream size",
                header.total_len
            )));
        }
        Ok(Some(header))
    }

    /// Exact length of the stream this header describes, header included.
    ///
    /// Saturates at `u64::MAX`; [`StreamHeader::detect`] rejects headers
    /// for which that would happen.
    pub fn stream_len(&self) -> u64 {
        self.checked_stream_len().unwrap_or(u64::MAX)
    }

    fn checked_stream_len(&self) -> Option<u64> {
        frames_len(self.total_len, self.chunk_size as usize)?.checked_add(HEADER_LEN as u64)
    }
}

/// Encoded length of the frames for `total` plaintext bytes split at
/// `chunk_size`, or `None` if it does not fit in a `u64`.
pub(crate) fn frames_len(total: u64, chunk_size: usize) -> Option<u64> {
    let chunk = chunk_size.max(1) as u64;
    let frames = total.div_ceil(chunk);
    frames
        .checked_mul((NONCE_LEN + TAG_LEN) as u64)?
        .checked_add(total)
}
