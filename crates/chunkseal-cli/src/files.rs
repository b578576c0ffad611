//! File encryption/decryption with atomic output
//!
//! Output is streamed into `<dst>.part` and renamed over `dst` only once the
//! whole operation succeeds, so a failed or cancelled run never leaves a
//! file that looks complete.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chunkseal_core::{decrypted_name_with, encrypted_name_with, ProgressFn, SealResult};
use chunkseal_crypto::{decrypt_reader, encrypt_reader, StreamOptions, SymmetricKey};
use tokio::fs::File;
use tokio::io::BufWriter;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// Result of one file operation
#[derive(Debug)]
pub struct FileOutcome {
    pub output: PathBuf,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// Default destination for `input`: append `suffix` on encrypt, strip it on decrypt.
pub fn default_output(input: &Path, direction: Direction, suffix: &str) -> Result<PathBuf> {
    let name = input
        .file_name()
        .with_context(|| format!("{} has no file name", input.display()))?
        .to_string_lossy();
    let derived = match direction {
        Direction::Encrypt => encrypted_name_with(&name, suffix),
        Direction::Decrypt => decrypted_name_with(&name, suffix),
    };
    if derived == name || derived.is_empty() {
        anyhow::bail!(
            "{} does not end in '{suffix}'; pass --output to choose a destination",
            input.display()
        );
    }
    Ok(input.with_file_name(derived))
}

fn part_path(dst: &Path) -> PathBuf {
    let mut name = dst.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Run `direction` over `input`, writing to `output`.
pub async fn process_file(
    direction: Direction,
    input: &Path,
    output: &Path,
    key: &SymmetricKey,
    opts: &StreamOptions,
    overwrite: bool,
    progress: Option<&ProgressFn>,
) -> Result<FileOutcome> {
    let meta = tokio::fs::metadata(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;
    if !meta.is_file() {
        anyhow::bail!("{} is not a regular file", input.display());
    }
    if input == output {
        anyhow::bail!("input and output are the same file: {}", input.display());
    }
    if !overwrite && tokio::fs::try_exists(output).await.unwrap_or(false) {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    let total = meta.len();
    let part = part_path(output);
    debug!(input = %input.display(), part = %part.display(), total, ?direction, "starting");

    let mut reader = File::open(input)
        .await
        .with_context(|| format!("opening {}", input.display()))?;
    let mut writer = BufWriter::new(
        File::create(&part)
            .await
            .with_context(|| format!("creating {}", part.display()))?,
    );

    let result = match direction {
        Direction::Encrypt => {
            encrypt_reader(&mut reader, &mut writer, key, total, progress, opts).await
        }
        Direction::Decrypt => {
            decrypt_reader(&mut reader, &mut writer, key, total, progress, opts).await
        }
    };

    let bytes_out = commit(result, writer, &part, output)
        .await
        .with_context(|| format!("{} {}", direction.verb(), input.display()))?;

    info!(
        input = %input.display(),
        output = %output.display(),
        bytes_in = total,
        bytes_out,
        "{} complete",
        direction.verb()
    );
    Ok(FileOutcome {
        output: output.to_path_buf(),
        bytes_in: total,
        bytes_out,
    })
}

/// Rename the finished `.part` file into place, or remove it on failure.
async fn commit(
    result: SealResult<u64>,
    writer: BufWriter<File>,
    part: &Path,
    dst: &Path,
) -> Result<u64> {
    match result {
        Ok(bytes) => {
            writer
                .into_inner()
                .sync_all()
                .await
                .with_context(|| format!("syncing {}", part.display()))?;
            tokio::fs::rename(part, dst)
                .await
                .with_context(|| format!("renaming {} to {}", part.display(), dst.display()))?;
            Ok(bytes)
        }
        Err(e) => {
            drop(writer);
            if let Err(rm) = tokio::fs::remove_file(part).await {
                debug!(part = %part.display(), error = %rm, "could not remove partial output");
            }
            Err(e.into())
        }
    }
}

impl Direction {
    fn verb(self) -> &'static str {
        match self {
            Direction::Encrypt => "encrypting",
            Direction::Decrypt => "decrypting",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkseal_core::SealError;
    use chunkseal_crypto::derive_key_bytes;
    use tempfile::TempDir;

    #[test]
    fn test_default_output_names() {
        let enc = default_output(Path::new("/tmp/report.pdf"), Direction::Encrypt, ".enc").unwrap();
        assert_eq!(enc, PathBuf::from("/tmp/report.pdf.enc"));

        let dec =
            default_output(Path::new("/tmp/report.pdf.enc"), Direction::Decrypt, ".enc").unwrap();
        assert_eq!(dec, PathBuf::from("/tmp/report.pdf"));
    }

    #[test]
    fn test_default_output_requires_suffix_on_decrypt() {
        assert!(default_output(Path::new("/tmp/report.pdf"), Direction::Decrypt, ".enc").is_err());
    }

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path(Path::new("/tmp/a.txt.enc")),
            PathBuf::from("/tmp/a.txt.enc.part")
        );
    }

    #[tokio::test]
    async fn test_file_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let key = derive_key_bytes(b"file test");
        let src = tmp.path().join("notes.txt");
        let content: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        tokio::fs::write(&src, &content).await.unwrap();

        let enc = default_output(&src, Direction::Encrypt, ".enc").unwrap();
        let opts = StreamOptions::default();
        let outcome = process_file(Direction::Encrypt, &src, &enc, &key, &opts, false, None)
            .await
            .unwrap();
        assert_eq!(outcome.bytes_in, content.len() as u64);
        assert!(!part_path(&enc).exists());

        let dst = tmp.path().join("restored.txt");
        let outcome = process_file(Direction::Decrypt, &enc, &dst, &key, &opts, false, None)
            .await
            .unwrap();
        assert_eq!(outcome.bytes_out, content.len() as u64);
        assert_eq!(tokio::fs::read(&dst).await.unwrap(), content);
    }

    #[tokio::test]
    async fn test_failed_decrypt_leaves_no_output() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("secret.bin");
        tokio::fs::write(&src, b"top secret payload").await.unwrap();
        let enc = tmp.path().join("secret.bin.enc");
        let opts = StreamOptions::default();

        process_file(
            Direction::Encrypt,
            &src,
            &enc,
            &derive_key_bytes(b"right"),
            &opts,
            false,
            None,
        )
        .await
        .unwrap();

        let dst = tmp.path().join("out.bin");
        let err = process_file(
            Direction::Decrypt,
            &enc,
            &dst,
            &derive_key_bytes(b"wrong"),
            &opts,
            false,
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SealError>(),
            Some(SealError::DecryptionFailed { offset: 0 })
        ));
        assert!(!dst.exists());
        assert!(!part_path(&dst).exists());
    }

    #[tokio::test]
    async fn test_refuses_to_overwrite() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.txt");
        let dst = tmp.path().join("a.txt.enc");
        tokio::fs::write(&src, b"a").await.unwrap();
        tokio::fs::write(&dst, b"existing").await.unwrap();
        let key = derive_key_bytes(b"k");
        let opts = StreamOptions::default();

        let err = process_file(Direction::Encrypt, &src, &dst, &key, &opts, false, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(tokio::fs::read(&dst).await.unwrap(), b"existing");

        process_file(Direction::Encrypt, &src, &dst, &key, &opts, true, None)
            .await
            .unwrap();
        assert_ne!(tokio::fs::read(&dst).await.unwrap(), b"existing");
    }
}
