//! chunkseal: passphrase-based encryption for text and files
//!
//! Commands:
//!   encrypt-text [TEXT]          - seal a string into `nonce::ciphertext` form
//!   decrypt-text [TEXT]          - open a string produced by encrypt-text
//!   encrypt-file <IN> [-o OUT]   - seal a file into a chunked frame stream
//!   decrypt-file <IN> [-o OUT]   - open a chunked frame stream
//!   config show                  - display the active configuration

mod files;
mod passphrase;
mod progress;

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;

use chunkseal_core::config::{default_config_path, ChunksealConfig};
use chunkseal_core::StreamFormat;
use chunkseal_crypto::{decrypt_text, derive_key, encrypt_text, StreamOptions, MAX_CHUNK};

use crate::files::{default_output, process_file, Direction};
use crate::progress::{bar_callback, fmt_bytes, make_progress_bar};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "chunkseal",
    version,
    about = "Passphrase-based chunked encryption for text and files"
)]
struct Cli {
    /// Path to config.toml (default: ~/.config/chunkseal/config.toml)
    #[arg(long, short = 'c', env = "CHUNKSEAL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level filter (overrides config)
    #[arg(long, env = "CHUNKSEAL_LOG")]
    log: Option<String>,

    /// Log format (overrides config)
    #[arg(long, env = "CHUNKSEAL_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Passphrase; prompted on the terminal when unset
    #[arg(long, env = "CHUNKSEAL_PASSPHRASE", hide_env_values = true, global = true)]
    passphrase: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a string (read from stdin when omitted)
    #[command(name = "encrypt-text")]
    EncryptText { text: Option<String> },

    /// Decrypt a `nonce::ciphertext` string (read from stdin when omitted)
    #[command(name = "decrypt-text")]
    DecryptText { text: Option<String> },

    /// Encrypt a file into a chunked frame stream
    #[command(name = "encrypt-file")]
    EncryptFile {
        input: PathBuf,
        /// Destination (default: input name plus the configured suffix)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Stream layout (overrides config)
        #[arg(long)]
        format: Option<StreamFormat>,
        /// Plaintext bytes per frame; versioned layout only
        #[arg(long, requires = "format")]
        chunk_size: Option<usize>,
        /// Overwrite an existing destination
        #[arg(long)]
        force: bool,
    },

    /// Decrypt a chunked frame stream back into a file
    #[command(name = "decrypt-file")]
    DecryptFile {
        input: PathBuf,
        /// Destination (default: input name with the configured suffix removed)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Overwrite an existing destination
        #[arg(long)]
        force: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (defaults merged with the config file)
    Show,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = ChunksealConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.as_deref().unwrap_or(config.log.level.as_str());
    let format = cli.log_format.unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(level, format);

    match cli.command {
        Commands::EncryptText { text } => cmd_encrypt_text(text, cli.passphrase),
        Commands::DecryptText { text } => cmd_decrypt_text(text, cli.passphrase),
        Commands::EncryptFile {
            input,
            output,
            format,
            chunk_size,
            force,
        } => {
            let format = format.unwrap_or(config.stream.format);
            let chunk_size = chunk_size.unwrap_or(MAX_CHUNK);
            let opts = StreamOptions {
                format,
                chunk_size,
                yield_every: config.stream.yield_every,
                cancel: None,
            };
            let output = match output {
                Some(p) => p,
                None => default_output(&input, Direction::Encrypt, &config.output.suffix)?,
            };
            let overwrite = force || config.output.overwrite;
            cmd_file(Direction::Encrypt, &input, &output, opts, overwrite, cli.passphrase).await
        }
        Commands::DecryptFile {
            input,
            output,
            force,
        } => {
            let opts = StreamOptions {
                yield_every: config.stream.yield_every,
                ..StreamOptions::default()
            };
            let output = match output {
                Some(p) => p,
                None => default_output(&input, Direction::Decrypt, &config.output.suffix)?,
            };
            let overwrite = force || config.output.overwrite;
            cmd_file(Direction::Decrypt, &input, &output, opts, overwrite, cli.passphrase).await
        }
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output; logs go to stderr
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Take `arg` or read all of stdin, dropping one trailing line break.
fn text_input(arg: Option<String>) -> Result<String> {
    match arg {
        Some(text) => Ok(text),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            Ok(strip_line_break(buf))
        }
    }
}

fn strip_line_break(mut text: String) -> String {
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
    text
}

// ── `chunkseal encrypt-text` / `decrypt-text` ─────────────────────────────────

fn cmd_encrypt_text(text: Option<String>, passphrase: Option<String>) -> Result<()> {
    let text = text_input(text)?;
    let passphrase = passphrase::resolve(passphrase, true)?;
    let encoded = encrypt_text(&text, &passphrase).context("encrypting text")?;
    println!("{encoded}");
    Ok(())
}

fn cmd_decrypt_text(text: Option<String>, passphrase: Option<String>) -> Result<()> {
    let text = text_input(text)?;
    let passphrase = passphrase::resolve(passphrase, false)?;
    let decoded = decrypt_text(text.trim(), &passphrase).context("decrypting text")?;
    println!("{decoded}");
    Ok(())
}

// ── `chunkseal encrypt-file` / `decrypt-file` ─────────────────────────────────

async fn cmd_file(
    direction: Direction,
    input: &Path,
    output: &Path,
    mut opts: StreamOptions,
    overwrite: bool,
    passphrase: Option<String>,
) -> Result<()> {
    let passphrase = passphrase::resolve(passphrase, direction == Direction::Encrypt)?;
    let key = derive_key(&passphrase).context("deriving key")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });
    opts.cancel = Some(cancel);

    let prefix = match direction {
        Direction::Encrypt => "encrypt",
        Direction::Decrypt => "decrypt",
    };
    let pb = make_progress_bar(0, prefix);
    pb.set_message(input.display().to_string());
    let callback = bar_callback(pb.clone());

    let result = process_file(
        direction,
        input,
        output,
        &key,
        &opts,
        overwrite,
        Some(&callback),
    )
    .await;
    pb.finish_and_clear();
    let outcome = result?;

    println!(
        "{} → {} ({} → {})",
        input.display(),
        outcome.output.display(),
        fmt_bytes(outcome.bytes_in),
        fmt_bytes(outcome.bytes_out),
    );
    Ok(())
}

// ── `chunkseal config show` ───────────────────────────────────────────────────

fn cmd_config_show(config: &ChunksealConfig, path: &Path) -> Result<()> {
    let source = if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found, using defaults)", path.display())
    };
    println!("# config: {source}");
    let rendered = toml::to_string_pretty(config).context("serializing config")?;
    print!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_encrypt_file_flags() {
        let cli = Cli::try_parse_from([
            "chunkseal",
            "encrypt-file",
            "report.pdf",
            "-o",
            "out.bin",
            "--format",
            "versioned",
            "--chunk-size",
            "65536",
            "--force",
        ])
        .unwrap();
        match cli.command {
            Commands::EncryptFile {
                input,
                output,
                format,
                chunk_size,
                force,
            } => {
                assert_eq!(input, PathBuf::from("report.pdf"));
                assert_eq!(output, Some(PathBuf::from("out.bin")));
                assert_eq!(format, Some(StreamFormat::Versioned));
                assert_eq!(chunk_size, Some(65536));
                assert!(force);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_chunk_size_requires_format() {
        let err = Cli::try_parse_from([
            "chunkseal",
            "encrypt-file",
            "a.txt",
            "--chunk-size",
            "1024",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn test_strip_line_break() {
        assert_eq!(strip_line_break("abc\n".into()), "abc");
        assert_eq!(strip_line_break("abc\r\n".into()), "abc");
        assert_eq!(strip_line_break("abc\n\n".into()), "abc\n");
        assert_eq!(strip_line_break("abc".into()), "abc");
    }

    #[test]
    fn test_unknown_format_rejected() {
        let err = Cli::try_parse_from(["chunkseal", "encrypt-file", "a.txt", "--format", "zip"]);
        assert!(err.is_err());
    }
}
