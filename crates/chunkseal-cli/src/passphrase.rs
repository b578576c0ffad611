//! Passphrase acquisition: flag/env value or interactive prompt

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};

/// Use `given` if set, otherwise prompt on the terminal.
///
/// With `confirm`, the prompt is repeated and both entries must match.
pub fn resolve(given: Option<String>, confirm: bool) -> Result<SecretString> {
    let passphrase = match given {
        Some(p) => SecretString::from(p),
        None => prompt(confirm)?,
    };
    if passphrase.expose_secret().is_empty() {
        anyhow::bail!("passphrase is required");
    }
    Ok(passphrase)
}

fn prompt(confirm: bool) -> Result<SecretString> {
    let first = SecretString::from(
        rpassword::prompt_password("Passphrase: ").context("reading passphrase")?,
    );
    if confirm {
        let second = SecretString::from(
            rpassword::prompt_password("Confirm passphrase: ")
                .context("reading passphrase confirmation")?,
        );
        if first.expose_secret() != second.expose_secret() {
            anyhow::bail!("passphrases do not match");
        }
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_given_passphrase_is_used() {
        let p = resolve(Some("hunter2".into()), true).unwrap();
        assert_eq!(p.expose_secret(), "hunter2");
    }

    #[test]
    fn test_empty_given_passphrase_rejected() {
        assert!(resolve(Some(String::new()), false).is_err());
    }
}
