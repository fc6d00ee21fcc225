//! Registry credential acquisition and in-memory handling.
//!
//! A [`Credential`] is acquired once per publish run, either interactively
//! or from the environment for unattended runs, and passed by reference to
//! the publisher. The secret half is never rendered by `Debug`, never
//! serialised, and its buffer is overwritten when dropped.

use crate::error::{PackagerError, Result};
use std::fmt;
use std::io::{BufRead, Write};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Prompt shown before reading the registry username.
pub const USERNAME_PROMPT: &str = "Enter the plugin-manager username: ";
/// Prompt shown before reading the registry secret.
pub const SECRET_PROMPT: &str = "Enter the plugin-manager password: ";

/// A secret string whose buffer is zeroed on drop.
///
/// # Examples
///
/// ```
/// use native_packager::credential::Secret;
///
/// let secret = Secret::new("hunter2");
/// assert_eq!(secret.expose(), "hunter2");
/// assert_eq!(format!("{secret:?}"), "Secret(<redacted>)");
/// ```
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the secret value.
    ///
    /// Callers must not log or persist the returned string.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Return true when the secret is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// A registry username and secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    username: String,
    secret: Secret,
}

impl Credential {
    /// Create a credential, rejecting an empty username or secret.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::Credential`] if either half is empty.
    pub fn new(username: impl Into<String>, secret: Secret) -> Result<Self> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(PackagerError::Credential {
                reason: "username must not be empty".to_owned(),
            });
        }
        if secret.is_empty() {
            return Err(PackagerError::Credential {
                reason: "password must not be empty".to_owned(),
            });
        }
        Ok(Self { username, secret })
    }

    /// Return the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Return the secret.
    #[must_use]
    pub fn secret(&self) -> &Secret {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &self.secret)
            .finish()
    }
}

/// Where the publish run obtains its credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Prompt on the terminal for both values.
    Interactive,
    /// Use the given username and read the secret from an environment variable.
    Environment {
        /// Registry username.
        username: String,
        /// Name of the variable holding the secret.
        secret_var: String,
    },
}

impl CredentialSource {
    /// Acquire a credential from this source.
    ///
    /// Interactive acquisition writes prompts to `output` and reads lines
    /// from `input`.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::Credential`] when input ends early, a value
    /// is empty, or the environment variable is unset.
    pub fn acquire(&self, input: &mut dyn BufRead, output: &mut dyn Write) -> Result<Credential> {
        match self {
            Self::Interactive => prompt_credential(input, output),
            Self::Environment {
                username,
                secret_var,
            } => credential_from_env(username, secret_var),
        }
    }
}

/// Prompt for a username and secret on a line-oriented stream.
///
/// # Errors
///
/// Returns [`PackagerError::Credential`] if input ends before both values
/// are read or either value is empty.
///
/// # Examples
///
/// ```
/// use native_packager::credential::prompt_credential;
///
/// let mut input = std::io::Cursor::new("alice\ns3cret\n");
/// let mut prompts = Vec::new();
/// let credential = prompt_credential(&mut input, &mut prompts)?;
/// assert_eq!(credential.username(), "alice");
/// assert_eq!(credential.secret().expose(), "s3cret");
/// # Ok::<(), native_packager::error::PackagerError>(())
/// ```
pub fn prompt_credential(input: &mut dyn BufRead, output: &mut dyn Write) -> Result<Credential> {
    let username = prompt_line(input, output, USERNAME_PROMPT)?;
    let secret = Secret::new(prompt_line(input, output, SECRET_PROMPT)?);
    Credential::new(username, secret)
}

fn prompt_line(input: &mut dyn BufRead, output: &mut dyn Write, prompt: &str) -> Result<String> {
    write!(output, "{prompt}")?;
    output.flush()?;

    let mut line = String::new();
    let read = input.read_line(&mut line)?;
    if read == 0 {
        return Err(PackagerError::Credential {
            reason: "input closed before a value was entered".to_owned(),
        });
    }
    let trimmed_len = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed_len);
    Ok(line)
}

fn credential_from_env(username: &str, secret_var: &str) -> Result<Credential> {
    let secret = std::env::var(secret_var).map_err(|_| PackagerError::Credential {
        reason: format!("environment variable {secret_var} is not set"),
    })?;
    Credential::new(username, Secret::new(secret))
}
