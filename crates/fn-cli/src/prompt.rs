use std::path::Path;

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Password};
use fn_cloud::PassphraseSource;

/// Asks for private key passphrases on the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPassphrase;

impl PassphraseSource for TerminalPassphrase {
    fn passphrase(&self, key_file: &Path) -> fn_cloud::Result<String> {
        Password::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Passphrase for private key {}", key_file.display()))
            .interact()
            .map_err(|e| fn_cloud::Error::Passphrase {
                source: std::io::Error::other(e.to_string()),
            })
    }
}

/// Y/N question, defaulting to no.
pub fn confirm(question: &str) -> anyhow::Result<bool> {
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(question)
        .default(false)
        .interact()?)
}
