//! Secure credential handling with memory zeroization.
//!
//! Requires the `zeroize` feature. [`SecretString`] wraps an owned `String`
//! that is wiped from memory when dropped, and [`SecureCredentials`] builds
//! [`Credentials`] from zeroizing inputs so a plaintext password never sits
//! in a plain `String` longer than it has to.
//!
//! The connection handshake still needs the password as an owned value to
//! hand to [`Login7`](tds_protocol::login7::Login7) for XOR obfuscation, so
//! this narrows the window a secret is held in unprotected memory rather
//! than eliminating it.

use std::borrow::Cow;
use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::credentials::Credentials;

/// An owned string that is zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    /// Wrap an owned string for zeroization on drop.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the secret value.
    ///
    /// Avoid copying the result into a buffer that outlives this
    /// `SecretString`.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(\"[REDACTED]\")")
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Builds [`Credentials`] from [`SecretString`]-wrapped inputs.
pub struct SecureCredentials {
    username: String,
    password: SecretString,
}

impl SecureCredentials {
    /// Create SQL Server credentials from a zeroizing password.
    pub fn sql_server(username: impl Into<String>, password: impl Into<SecretString>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Consume `self`, producing [`Credentials::SqlServer`].
    ///
    /// The source `SecretString` is zeroized once this value is dropped.
    #[must_use]
    pub fn into_credentials(self) -> Credentials {
        Credentials::SqlServer {
            username: Cow::Owned(self.username),
            password: Cow::Owned(self.password.expose_secret().to_owned()),
        }
    }
}

impl fmt::Debug for SecureCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secret() {
        let secret = SecretString::new("hunter2");
        assert_eq!(format!("{:?}", secret), "SecretString(\"[REDACTED]\")");
    }

    #[test]
    fn exposes_underlying_value() {
        let secret = SecretString::new("hunter2");
        assert_eq!(secret.expose_secret(), "hunter2");
    }

    #[test]
    fn builds_sql_server_credentials() {
        let creds = SecureCredentials::sql_server("user", "hunter2").into_credentials();
        assert!(creds.is_sql_auth());
    }
}
