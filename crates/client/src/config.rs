//! Client configuration from code or the environment.

use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const API_URL_ENV: &str = "CARGOLANE_API_URL";
pub const API_TOKEN_ENV: &str = "CARGOLANE_API_TOKEN";
pub const HTTP_TIMEOUT_ENV: &str = "CARGOLANE_HTTP_TIMEOUT_SECS";
pub const SESSION_DB_ENV: &str = "CARGOLANE_SESSION_DB";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("invalid API base URL {value:?}: {source}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid CARGOLANE_HTTP_TIMEOUT_SECS value {0:?}: expected whole seconds above zero")]
    InvalidTimeout(String),
    #[error("failed to build HTTP client: {0}")]
    Http(String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub token: Option<String>,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(base_url.trim()).map_err(|source| ConfigError::InvalidUrl {
            value: base_url.to_string(),
            source,
        })?;
        Ok(Self {
            base_url: parsed,
            token: None,
            request_timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Read `CARGOLANE_API_URL` (required), `CARGOLANE_API_TOKEN` and
    /// `CARGOLANE_HTTP_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] over an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup(API_URL_ENV)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(API_URL_ENV))?;
        let mut config = Self::new(&base_url)?;

        if let Some(token) = lookup(API_TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
            config = config.with_token(token.trim());
        }

        if let Some(raw) = lookup(HTTP_TIMEOUT_ENV) {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
            if secs == 0 {
                return Err(ConfigError::InvalidTimeout(raw));
            }
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Absolute URL for an API path such as `/auth/me`.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn base_url_is_required() {
        let err = ClientConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(API_URL_ENV)));
    }

    #[test]
    fn defaults_apply_when_optional_vars_are_absent() {
        let config =
            ClientConfig::from_lookup(lookup(&[(API_URL_ENV, "https://api.example/v1/")])).unwrap();
        assert_eq!(config.token, None);
        assert_eq!(config.request_timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.endpoint("/auth/me"), "https://api.example/v1/auth/me");
    }

    #[test]
    fn token_and_timeout_are_read() {
        let config = ClientConfig::from_lookup(lookup(&[
            (API_URL_ENV, "http://localhost:3000"),
            (API_TOKEN_ENV, " secret "),
            (HTTP_TIMEOUT_ENV, "3"),
        ]))
        .unwrap();
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[(API_URL_ENV, "not a url")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));

        let err = ClientConfig::from_lookup(lookup(&[
            (API_URL_ENV, "http://localhost:3000"),
            (HTTP_TIMEOUT_ENV, "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout(_)));
    }
}
