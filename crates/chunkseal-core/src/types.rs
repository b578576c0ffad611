use serde::{Deserialize, Serialize};

/// File name suffix appended to encrypted outputs
pub const ENC_SUFFIX: &str = ".enc";

/// Progress callback type (processed_bytes, total_bytes, started_at)
///
/// Invoked synchronously once per chunk. Callers throttle rendering themselves.
pub type ProgressFn = Box<dyn Fn(u64, u64, std::time::Instant) + Send + Sync>;

/// On-disk layout of an encrypted stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamFormat {
    /// Headerless concatenated `[nonce][ciphertext]` frames
    #[default]
    Legacy,
    /// Legacy frames preceded by a magic/version/chunk-size/length header
    Versioned,
}

impl std::fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamFormat::Legacy => f.write_str("legacy"),
            StreamFormat::Versioned => f.write_str("versioned"),
        }
    }
}

impl std::str::FromStr for StreamFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" => Ok(StreamFormat::Legacy),
            "versioned" => Ok(StreamFormat::Versioned),
            other => Err(format!("unknown stream format '{other}' (legacy|versioned)")),
        }
    }
}

/// Name of the encrypted output for `original`.
pub fn encrypted_name(original: &str) -> String {
    encrypted_name_with(original, ENC_SUFFIX)
}

/// Name of the decrypted output for `encrypted`: strips one trailing `.enc`.
pub fn decrypted_name(encrypted: &str) -> String {
    decrypted_name_with(encrypted, ENC_SUFFIX)
}

pub fn encrypted_name_with(original: &str, suffix: &str) -> String {
    format!("{original}{suffix}")
}

/// No-op when `suffix` is absent.
pub fn decrypted_name_with(encrypted: &str, suffix: &str) -> String {
    encrypted
        .strip_suffix(suffix)
        .unwrap_or(encrypted)
        .to_string()
}
