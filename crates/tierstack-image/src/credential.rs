//! Registry credential resolution.
//!
//! A registry hands out short-lived tokens: base64 of `username:password`.
//! A token is fetched for every publish and never cached.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tierstack_common::error::{Result, StackError};
use tierstack_common::types::RegistryCredential;
use tierstack_provider::RegistryApi;

/// Decodes an authorization token and splits it at the first colon.
///
/// Everything after the first colon is the password, colons included.
///
/// # Errors
///
/// Returns `StackError::InvalidCredential` if the token is not base64 of
/// UTF-8 text, has no colon, or either half is empty.
pub fn decode_token(encoded: &str) -> Result<(String, String)> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| StackError::invalid_credential(format!("token is not base64: {e}")))?;
    let decoded = String::from_utf8(bytes)
        .map_err(|_| StackError::invalid_credential("token is not UTF-8 text"))?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| StackError::invalid_credential("token has no username/password separator"))?;
    if username.is_empty() {
        return Err(StackError::invalid_credential("username is empty"));
    }
    if password.is_empty() {
        return Err(StackError::invalid_credential("password is empty"));
    }
    Ok((username.to_string(), password.to_string()))
}

/// Fetches and decodes registry credentials.
#[derive(Debug)]
pub struct CredentialResolver<R: ?Sized> {
    registry: Arc<R>,
}

impl<R> CredentialResolver<R>
where
    R: RegistryApi + ?Sized,
{
    /// Creates a resolver that asks `registry` for tokens.
    #[must_use]
    pub const fn new(registry: Arc<R>) -> Self {
        Self { registry }
    }

    /// Fetches a fresh token for `registry_id` and decodes it.
    ///
    /// The credential is returned whole or not at all.
    ///
    /// # Errors
    ///
    /// Returns the token request's error unchanged, or
    /// `StackError::InvalidCredential` for a malformed token.
    pub async fn resolve(&self, registry_id: &str) -> Result<RegistryCredential> {
        tracing::debug!(registry = registry_id, "requesting registry authorization token");
        let token = self.registry.authorization_token(registry_id).await?;
        let (username, password) = decode_token(&token.authorization_token)?;
        tracing::info!(registry = registry_id, server = %token.proxy_endpoint, "registry credential resolved");
        Ok(RegistryCredential {
            server: token.proxy_endpoint,
            username,
            password,
        })
    }
}
