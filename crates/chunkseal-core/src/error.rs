use thiserror::Error;

pub type SealResult<T> = Result<T, SealError>;

/// Every variant is terminal for the operation that raised it.
#[derive(Debug, Error)]
pub enum SealError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error(
        "truncated stream at offset {offset}: needed {needed} bytes, {available} available"
    )]
    TruncatedStream {
        offset: u64,
        needed: u64,
        available: u64,
    },

    #[error("decryption failed for frame at offset {offset}: wrong passphrase or corrupted data")]
    DecryptionFailed { offset: u64 },

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("unsupported stream version {0}")]
    UnsupportedVersion(u8),

    #[error("operation cancelled at offset {offset}")]
    Cancelled { offset: u64 },

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SealError {
    /// Byte offset of the frame the error refers to, if any.
    pub fn offset(&self) -> Option<u64> {
        match self {
            SealError::TruncatedStream { offset, .. }
            | SealError::DecryptionFailed { offset }
            | SealError::Cancelled { offset } => Some(*offset),
            _ => None,
        }
    }

    /// Shift a frame-relative offset by `base` to make it stream-absolute.
    pub fn rebased(self, base: u64) -> Self {
        match self {
            SealError::TruncatedStream {
                offset,
                needed,
                available,
            } => SealError::TruncatedStream {
                offset: offset + base,
                needed,
                available,
            },
            SealError::DecryptionFailed { offset } => SealError::DecryptionFailed {
                offset: offset + base,
            },
            SealError::Cancelled { offset } => SealError::Cancelled {
                offset: offset + base,
            },
            other => other,
        }
    }
}
