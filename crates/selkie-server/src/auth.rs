//! Bearer-token authentication
//!
//! When a token is configured, every method except `health` must present it,
//! either in the `Authorization: Bearer <t>` handshake header or as a
//! `token` field inside params. Tokens are opaque strings compared in
//! constant time.

use selkie_core::{Error, Result};
use subtle::ConstantTimeEq;

/// Header prefix for bearer tokens
const BEARER_PREFIX: &str = "Bearer ";

/// Methods that never require auth
const PUBLIC_METHODS: &[&str] = &["health"];

/// Token validator
#[derive(Debug, Clone)]
pub struct TokenAuth {
    token: Option<String>,
}

impl TokenAuth {
    /// Create with an optional configured token; None disables auth
    pub fn new(token: Option<String>) -> Self {
        if let Some(ref token) = token {
            assert!(!token.is_empty(), "configured token must not be empty");
        }
        Self { token }
    }

    /// Whether auth is enabled at all
    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    /// Extract the token from an Authorization header value
    pub fn from_header(header: &str) -> Option<&str> {
        header.strip_prefix(BEARER_PREFIX)
    }

    /// Check a request: method name, header-derived token, params token
    ///
    /// The handshake header wins over the params field when both are set.
    pub fn check(
        &self,
        method: &str,
        header_token: Option<&str>,
        params_token: Option<&str>,
    ) -> Result<()> {
        let Some(expected) = &self.token else {
            return Ok(());
        };
        if PUBLIC_METHODS.contains(&method) {
            return Ok(());
        }

        let provided = header_token.or(params_token).ok_or_else(|| {
            Error::unauthorized("missing token")
        })?;

        let matches: bool = provided
            .as_bytes()
            .ct_eq(expected.as_bytes())
            .into();
        if matches {
            Ok(())
        } else {
            Err(Error::unauthorized("invalid token"))
        }
    }
}
