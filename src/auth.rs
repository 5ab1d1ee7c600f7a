use anyhow::{Result, bail};
use std::io::{self, IsTerminal};
use zeroize::Zeroizing;

/// Reads one line from piped stdin, without the trailing newline.
fn read_stdin_line() -> Result<Option<Zeroizing<String>>> {
    if io::stdin().is_terminal() {
        return Ok(None);
    }

    let mut buf = Zeroizing::new(String::new());
    io::stdin().read_line(&mut buf)?;
    trim_newline(&mut buf);

    if buf.is_empty() {
        return Ok(None);
    }
    Ok(Some(buf))
}

fn read_secret(env_var: &str, prompt: &str, what: &str) -> Result<Zeroizing<String>> {
    //  Environment Variable
    //  SEEDVAULT_PASSPHRASE="supersecret" seedvault restore --name main
    if let Ok(value) = std::env::var(env_var) {
        if !value.is_empty() {
            return Ok(Zeroizing::new(value));
        }
    }

    //  stdin (Pipeline), one value per line
    if let Some(value) = read_stdin_line()? {
        return Ok(value);
    }

    //  Interactive (TTY)
    if io::stdin().is_terminal() {
        let value = Zeroizing::new(rpassword::prompt_password(prompt)?);
        if !value.is_empty() {
            return Ok(value);
        }
    }

    bail!("no {what} provided")
}

/// Identity assertion from `SEEDVAULT_ASSERTION`, stdin, or a hidden prompt.
pub fn read_assertion() -> Result<Zeroizing<String>> {
    read_secret("SEEDVAULT_ASSERTION", "Identity assertion: ", "identity assertion")
}

/// Passphrase from `SEEDVAULT_PASSPHRASE`, stdin, or a hidden prompt.
pub fn read_passphrase() -> Result<Zeroizing<String>> {
    read_secret("SEEDVAULT_PASSPHRASE", "Passphrase: ", "passphrase")
}

/// Like [`read_passphrase`], but asks twice when prompting on a TTY.
pub fn read_new_passphrase_with_confirmation() -> Result<Zeroizing<String>> {
    let from_env = std::env::var("SEEDVAULT_PASSPHRASE").is_ok_and(|v| !v.is_empty());
    if from_env || !io::stdin().is_terminal() {
        return read_passphrase();
    }

    let pw1 = Zeroizing::new(rpassword::prompt_password("New passphrase: ")?);
    let pw2 = Zeroizing::new(rpassword::prompt_password("Confirm passphrase: ")?);

    if pw1.is_empty() {
        bail!("passphrase cannot be empty");
    }

    if pw1 != pw2 {
        bail!("passphrases do not match");
    }

    Ok(pw1)
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}
