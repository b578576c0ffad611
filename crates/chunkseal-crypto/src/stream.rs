//! Chunked streaming encryption: bounded-size frames, strict order, progress
//!
//! A source is split into chunks of at most [`MAX_CHUNK`] bytes. Each chunk is
//! sealed under its own random nonce and appended as a binary frame. Decryption
//! walks the stream frame by frame and is all-or-nothing: the first frame that
//! fails authentication aborts the operation and no plaintext is returned.
//!
//! Drivers suspend to the tokio scheduler between chunks (see
//! [`StreamOptions::yield_every`]) and poll an optional cancellation token at
//! the same points. Frame order is not authenticated; reordered frames decrypt
//! to reordered plaintext.

use std::ops::Range;
use std::time::Instant;

use chunkseal_core::ProgressFn;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use zeroize::Zeroize;

use crate::frame::{decode_frame_with, open_frame, seal_frame, Frame};
use crate::header::{frames_len, StreamHeader, HEADER_LEN, MAX_HEADER_CHUNK};
use crate::kdf::SymmetricKey;
use crate::{
    SealError, SealResult, StreamFormat, MAX_CHUNK, MAX_CHUNK_ON_WIRE, NONCE_LEN, TAG_LEN,
};

/// Tuning for one streaming operation.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Layout written by encryption. Decryption detects the layout itself.
    pub format: StreamFormat,
    /// Plaintext bytes per frame. Legacy streams require [`MAX_CHUNK`].
    pub chunk_size: usize,
    /// Chunks processed between scheduler yields (0 is treated as 1)
    pub yield_every: u32,
    /// Polled at every yield point
    pub cancel: Option<CancellationToken>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            format: StreamFormat::Legacy,
            chunk_size: MAX_CHUNK,
            yield_every: 1,
            cancel: None,
        }
    }
}

impl StreamOptions {
    pub fn versioned(chunk_size: usize) -> Self {
        Self {
            format: StreamFormat::Versioned,
            chunk_size,
            ..Self::default()
        }
    }

    fn checked_chunk_size(&self) -> SealResult<usize> {
        match self.format {
            StreamFormat::Legacy if self.chunk_size != MAX_CHUNK => {
                Err(SealError::InvalidInput(format!(
                    "legacy streams use a fixed {MAX_CHUNK}-byte chunk (got {})",
                    self.chunk_size
                )))
            }
            StreamFormat::Versioned
                if self.chunk_size == 0 || self.chunk_size > MAX_HEADER_CHUNK as usize =>
            {
                Err(SealError::InvalidInput(format!(
                    "chunk size {} out of range (1..={MAX_HEADER_CHUNK})",
                    self.chunk_size
                )))
            }
            _ => Ok(self.chunk_size),
        }
    }

    fn check_cancelled(&self, offset: u64) -> SealResult<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(SealError::Cancelled { offset }),
            _ => Ok(()),
        }
    }

    /// Between-chunk suspension point.
    async fn checkpoint(&self, frames_done: u64, offset: u64) -> SealResult<()> {
        if frames_done % u64::from(self.yield_every.max(1)) == 0 {
            tokio::task::yield_now().await;
        }
        self.check_cancelled(offset)
    }
}

/// Partition `total` bytes into consecutive ranges of at most `chunk_size`.
pub fn plan_chunks(total: u64, chunk_size: usize) -> impl Iterator<Item = Range<u64>> {
    let chunk = chunk_size.max(1) as u64;
    (0..total.div_ceil(chunk)).map(move |i| {
        let start = i * chunk;
        start..(start + chunk).min(total)
    })
}

/// Encrypted length of `total` plaintext bytes at the default chunk size.
pub fn stream_len(total: u64, format: StreamFormat) -> u64 {
    stream_len_with(total, format, MAX_CHUNK)
}

/// Saturates at `u64::MAX`.
fn stream_len_with(total: u64, format: StreamFormat, chunk_size: usize) -> u64 {
    let frames = frames_len(total, chunk_size).unwrap_or(u64::MAX);
    match format {
        StreamFormat::Legacy => frames,
        StreamFormat::Versioned => frames.saturating_add(HEADER_LEN as u64),
    }
}

// ── Lazy frame sequences ──────────────────────────────────────────────────────

/// Seals `source` one chunk at a time, yielding frames in order.
pub struct EncryptFrames<'a> {
    key: &'a SymmetricKey,
    source: &'a [u8],
    offset: usize,
    chunk_size: usize,
}

impl<'a> EncryptFrames<'a> {
    pub fn new(source: &'a [u8], key: &'a SymmetricKey) -> Self {
        Self::with_chunk_size(source, key, MAX_CHUNK)
    }

    pub fn with_chunk_size(source: &'a [u8], key: &'a SymmetricKey, chunk_size: usize) -> Self {
        Self {
            key,
            source,
            offset: 0,
            chunk_size: chunk_size.max(1),
        }
    }
}

impl Iterator for EncryptFrames<'_> {
    type Item = SealResult<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.source.len() {
            return None;
        }
        let end = self
            .offset
            .saturating_add(self.chunk_size)
            .min(self.source.len());
        let frame = seal_frame(self.key, &self.source[self.offset..end]);
        self.offset = end;
        Some(frame)
    }
}

/// One opened frame.
#[derive(Debug)]
pub struct DecryptedChunk {
    /// Stream offset of the frame's nonce
    pub offset: u64,
    /// Encoded bytes the frame occupied
    pub consumed: usize,
    pub plaintext: Vec<u8>,
}

/// Opens the frames of an encrypted stream in order.
///
/// Stops after the first error.
pub struct DecryptFrames<'a> {
    key: &'a SymmetricKey,
    source: &'a [u8],
    offset: usize,
    max_ciphertext: usize,
    header: Option<StreamHeader>,
    failed: bool,
}

impl<'a> DecryptFrames<'a> {
    /// Detects a versioned header and, if present, checks the stream is
    /// exactly as long as the header says.
    pub fn new(source: &'a [u8], key: &'a SymmetricKey) -> SealResult<Self> {
        let header = StreamHeader::detect(source)?;
        let (offset, max_ciphertext) = match header {
            Some(h) => {
                check_stream_len(&h, source.len() as u64)?;
                (HEADER_LEN, h.chunk_size as usize + TAG_LEN)
            }
            None => (0, MAX_CHUNK_ON_WIRE),
        };
        Ok(Self {
            key,
            source,
            offset,
            max_ciphertext,
            header,
            failed: false,
        })
    }

    pub fn header(&self) -> Option<StreamHeader> {
        self.header
    }

    /// Upper bound on the plaintext this stream decrypts to.
    pub fn plaintext_hint(&self) -> usize {
        match self.header {
            Some(h) => h.total_len as usize,
            None => self.source.len(),
        }
    }
}

impl Iterator for DecryptFrames<'_> {
    type Item = SealResult<DecryptedChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.source.len() {
            return None;
        }
        let (key, source, at) = (self.key, self.source, self.offset);

        let opened = decode_frame_with(source, at, self.max_ciphertext).and_then(
            |(nonce, ciphertext, consumed)| {
                let plaintext = open_frame(key, &nonce, ciphertext, at as u64)?;
                Ok(DecryptedChunk {
                    offset: at as u64,
                    consumed,
                    plaintext,
                })
            },
        );

        match opened {
            Ok(chunk) => {
                self.offset += chunk.consumed;
                Some(Ok(chunk))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

fn check_stream_len(header: &StreamHeader, actual: u64) -> SealResult<()> {
    let expected = header.stream_len();
    if actual < expected {
        return Err(SealError::TruncatedStream {
            offset: actual,
            needed: expected - actual,
            available: 0,
        });
    }
    if actual > expected {
        return Err(SealError::MalformedFrame(format!(
            "{} trailing bytes after final frame at offset {expected}",
            actual - expected
        )));
    }
    Ok(())
}

// ── In-memory drivers ─────────────────────────────────────────────────────────

/// Encrypt `source` into a legacy (headerless) frame stream.
pub async fn encrypt_stream(
    source: &[u8],
    key: &SymmetricKey,
    progress: Option<&ProgressFn>,
) -> SealResult<Vec<u8>> {
    encrypt_stream_with(source, key, progress, &StreamOptions::default()).await
}

/// Encrypt `source` with explicit format, chunking and cancellation.
///
/// `progress` receives plaintext bytes sealed so far against `source.len()`.
pub async fn encrypt_stream_with(
    source: &[u8],
    key: &SymmetricKey,
    progress: Option<&ProgressFn>,
    opts: &StreamOptions,
) -> SealResult<Vec<u8>> {
    let chunk_size = opts.checked_chunk_size()?;
    opts.check_cancelled(0)?;

    let total = source.len() as u64;
    let started = Instant::now();
    let mut out = Vec::with_capacity(stream_len_with(total, opts.format, chunk_size) as usize);
    if opts.format == StreamFormat::Versioned {
        out.extend_from_slice(&StreamHeader::new(chunk_size, total).encode());
    }

    let mut processed = 0u64;
    let mut index = 0u64;
    for frame in EncryptFrames::with_chunk_size(source, key, chunk_size) {
        let frame = frame?;
        frame.write_binary(&mut out);
        processed += (frame.ciphertext.len() - TAG_LEN) as u64;

        debug!(index, processed, total, frame_len = frame.encoded_len(), "sealed chunk");
        if let Some(cb) = progress {
            cb(processed, total, started);
        }
        index += 1;
        opts.checkpoint(index, processed).await?;
    }

    info!(frames = index, bytes = total, format = %opts.format, "stream encrypted");
    Ok(out)
}

/// Decrypt a frame stream produced by [`encrypt_stream`] or
/// [`encrypt_stream_with`].
pub async fn decrypt_stream(
    source: &[u8],
    key: &SymmetricKey,
    progress: Option<&ProgressFn>,
) -> SealResult<Vec<u8>> {
    decrypt_stream_with(source, key, progress, &StreamOptions::default()).await
}

/// Decrypt with cancellation and yield tuning. `opts.format` is ignored.
///
/// `progress` receives stream bytes consumed so far against `source.len()`.
/// On any error the partial plaintext is wiped and dropped.
pub async fn decrypt_stream_with(
    source: &[u8],
    key: &SymmetricKey,
    progress: Option<&ProgressFn>,
    opts: &StreamOptions,
) -> SealResult<Vec<u8>> {
    opts.check_cancelled(0)?;

    let total = source.len() as u64;
    let started = Instant::now();
    let frames = DecryptFrames::new(source, key)?;
    let mut out = Vec::with_capacity(frames.plaintext_hint());

    let mut index = 0u64;
    for chunk in frames {
        let mut chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                out.zeroize();
                return Err(e);
            }
        };
        out.extend_from_slice(&chunk.plaintext);
        chunk.plaintext.zeroize();
        let processed = chunk.offset + chunk.consumed as u64;

        debug!(index, offset = chunk.offset, processed, total, "opened frame");
        if let Some(cb) = progress {
            cb(processed, total, started);
        }
        index += 1;
        if let Err(e) = opts.checkpoint(index, processed).await {
            out.zeroize();
            return Err(e);
        }
    }

    info!(frames = index, bytes = out.len(), "stream decrypted");
    Ok(out)
}

// ── Reader/writer drivers ─────────────────────────────────────────────────────

/// Encrypt from `reader` to `writer`, holding one chunk in memory.
///
/// `total` is the declared source length; a source that ends early or runs
/// past it is rejected. Returns the number of bytes written.
pub async fn encrypt_reader<R, W>(
    reader: &mut R,
    writer: &mut W,
    key: &SymmetricKey,
    total: u64,
    progress: Option<&ProgressFn>,
    opts: &StreamOptions,
) -> SealResult<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let chunk_size = opts.checked_chunk_size()?;
    opts.check_cancelled(0)?;

    let started = Instant::now();
    let mut written = 0u64;
    if opts.format == StreamFormat::Versioned {
        writer
            .write_all(&StreamHeader::new(chunk_size, total).encode())
            .await?;
        written += HEADER_LEN as u64;
    }

    let mut buf = vec![0u8; chunk_size];
    let mut processed = 0u64;
    let mut index = 0u64;
    loop {
        let n = read_full(reader, &mut buf).await?;
        if n == 0 {
            break;
        }
        processed += n as u64;
        if processed > total {
            buf.zeroize();
            return Err(SealError::InvalidInput(format!(
                "source grew past its declared length of {total} bytes"
            )));
        }

        let frame = seal_frame(key, &buf[..n])?;
        writer.write_all(&frame.nonce).await?;
        writer.write_all(&frame.ciphertext).await?;
        written += frame.encoded_len() as u64;

        debug!(index, processed, total, frame_len = frame.encoded_len(), "sealed chunk");
        if let Some(cb) = progress {
            cb(processed, total, started);
        }
        index += 1;
        opts.checkpoint(index, processed).await?;

        if n < chunk_size {
            break;
        }
    }
    buf.zeroize();

    if processed != total {
        return Err(SealError::InvalidInput(format!(
            "source ended after {processed} of {total} declared bytes"
        )));
    }
    writer.flush().await?;

    info!(frames = index, bytes = total, written, format = %opts.format, "stream encrypted");
    Ok(written)
}

/// Decrypt from `reader` to `writer`, holding one frame in memory.
///
/// `total` is the encrypted stream length, used only for progress. Plaintext
/// reaches `writer` frame by frame, so the output must be treated as
/// provisional until this returns `Ok`. Returns plaintext bytes written.
pub async fn decrypt_reader<R, W>(
    reader: &mut R,
    writer: &mut W,
    key: &SymmetricKey,
    total: u64,
    progress: Option<&ProgressFn>,
    opts: &StreamOptions,
) -> SealResult<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    opts.check_cancelled(0)?;
    let started = Instant::now();

    let mut head = [0u8; HEADER_LEN];
    let head_len = read_full(reader, &mut head).await?;
    let header = StreamHeader::detect(&head[..head_len])?;

    // Legacy streams have no header; the bytes already read open the first frame.
    let (chunk_size, mut carry, mut offset, mut remaining) = match header {
        Some(h) => (h.chunk_size as usize, 0, HEADER_LEN as u64, Some(h.total_len)),
        None => (MAX_CHUNK, head_len, 0u64, None),
    };
    let max_ciphertext = chunk_size + TAG_LEN;
    let mut buf = vec![0u8; NONCE_LEN + max_ciphertext];
    buf[..carry].copy_from_slice(&head[..carry]);

    let mut written = 0u64;
    let mut index = 0u64;
    loop {
        let want = match remaining {
            Some(0) => break,
            Some(rem) => NONCE_LEN + rem.min(chunk_size as u64) as usize + TAG_LEN,
            None => buf.len(),
        };
        let filled = carry + read_full(reader, &mut buf[carry..want]).await?;
        carry = 0;
        if filled == 0 && remaining.is_none() {
            break;
        }
        if remaining.is_some() && filled < want {
            return Err(SealError::TruncatedStream {
                offset,
                needed: want as u64,
                available: filled as u64,
            });
        }

        let (nonce, ciphertext, consumed) =
            decode_frame_with(&buf[..filled], 0, max_ciphertext).map_err(|e| e.rebased(offset))?;
        let mut plaintext = open_frame(key, &nonce, ciphertext, offset)?;
        writer.write_all(&plaintext).await?;
        written += plaintext.len() as u64;
        if let Some(rem) = remaining.as_mut() {
            *rem -= plaintext.len() as u64;
        }
        plaintext.zeroize();
        offset += consumed as u64;

        debug!(index, offset, total, "opened frame");
        if let Some(cb) = progress {
            cb(offset, total, started);
        }
        index += 1;
        opts.checkpoint(index, offset).await?;

        // A short fill is the final legacy frame
        if remaining.is_none() && filled < want {
            break;
        }
    }

    if remaining == Some(0) {
        let mut probe = [0u8; 1];
        if reader.read(&mut probe).await? > 0 {
            return Err(SealError::MalformedFrame(format!(
                "trailing data after final frame at offset {offset}"
            )));
        }
    }
    writer.flush().await?;

    info!(frames = index, bytes = written, "stream decrypted");
    Ok(written)
}

/// Read until `buf` is full or the reader is exhausted.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
