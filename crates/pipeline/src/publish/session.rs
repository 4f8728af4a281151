//! Session and authorization seam.
//!
//! The pipeline never stores credentials. It asks a [`SessionProvider`] for a
//! pre-authorized [`RequestTemplate`] right before uploading; `None` means
//! there is no valid session and the run fails with `AuthInvalid` before any
//! I/O.

use crate::config::API_URL_ENV;
use reqwest::Method;
use std::fmt;

/// Environment variable for the bearer token
pub const TOKEN_ENV: &str = "ROOMSCAN_TOKEN";

/// Bearer token. `Debug` and `Display` never print the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token, only for building the Authorization header
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

impl fmt::Display for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Authorized request target for one upload
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    pub method: Method,
    pub url: String,
    pub token: BearerToken,
}

/// Source of authorized requests
pub trait SessionProvider: Send + Sync {
    /// Request template for `path`, or `None` when there is no valid session
    fn authorize(&self, path: &str, method: Method) -> Option<RequestTemplate>;
}

/// Fixed base URL and optional token
#[derive(Debug, Clone)]
pub struct StaticSession {
    base_url: String,
    token: Option<BearerToken>,
}

impl StaticSession {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()).map(BearerToken::new),
        }
    }

    /// Session without a token; every `authorize` returns `None`
    pub fn anonymous(base_url: impl Into<String>) -> Self {
        Self::new(base_url, None)
    }

    /// Read `ROOMSCAN_API_URL` (falling back to `default_url`) and `ROOMSCAN_TOKEN`
    pub fn from_env(default_url: &str) -> Self {
        let base_url = std::env::var(API_URL_ENV).unwrap_or_else(|_| default_url.to_string());
        Self::new(base_url, std::env::var(TOKEN_ENV).ok())
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

impl SessionProvider for StaticSession {
    fn authorize(&self, path: &str, method: Method) -> Option<RequestTemplate> {
        let token = self.token.clone()?;
        let path = if path.starts_with('/') { path.to_string() } else { format!("/{}", path) };
        Some(RequestTemplate {
            method,
            url: format!("{}{}", self.base_url, path),
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_redacted() {
        let session = StaticSession::new("https://api.example.com/", Some("s3cr3t".into()));
        let template = session.authorize("/api/scans", Method::POST).unwrap();
        assert_eq!(template.url, "https://api.example.com/api/scans");
        assert_eq!(template.token.expose(), "s3cr3t");
        assert!(!format!("{:?}", template).contains("s3cr3t"));
        assert!(!format!("{:?}", session).contains("s3cr3t"));
        assert_eq!(template.token.to_string(), "***");
    }

    #[test]
    fn test_no_session_without_token() {
        assert!(StaticSession::anonymous("http://localhost").authorize("/api/scans", Method::POST).is_none());
        assert!(!StaticSession::new("http://localhost", Some("  ".into())).has_token());
    }

    #[test]
    fn test_relative_path() {
        let template = StaticSession::new("http://localhost:8080", Some("t".into()))
            .authorize("api/scans", Method::POST)
            .unwrap();
        assert_eq!(template.url, "http://localhost:8080/api/scans");
    }
}
