//! Bearer credential lookup for the stream handshake.
//!
//! The manager reads one token per connection attempt and attaches it as the
//! `token` query parameter. Refresh and expiry belong to whoever writes the
//! token, not to this crate.

use secrecy::SecretString;

/// Source of the bearer token read at connect time.
pub trait CredentialSource: Send + Sync {
    fn bearer_token(&self) -> Option<SecretString>;
}

/// Reads the token from an environment variable on every attempt.
#[derive(Debug, Clone)]
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialSource for EnvCredential {
    fn bearer_token(&self) -> Option<SecretString> {
        std::env::var(&self.var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(SecretString::new)
    }
}

/// Fixed token, e.g. one obtained from a login flow before connecting.
pub struct StaticCredential {
    token: SecretString,
}

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::new(token.into()),
        }
    }
}

impl CredentialSource for StaticCredential {
    fn bearer_token(&self) -> Option<SecretString> {
        Some(self.token.clone())
    }
}

/// Always connects unauthenticated.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredential;

impl CredentialSource for NoCredential {
    fn bearer_token(&self) -> Option<SecretString> {
        None
    }
}

impl<F> CredentialSource for F
where
    F: Fn() -> Option<SecretString> + Send + Sync,
{
    fn bearer_token(&self) -> Option<SecretString> {
        self()
    }
}
