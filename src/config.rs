//! Environment configuration for the gateway binary.
//!
//! Every setting has a default; unparsable values fall back to the default
//! rather than refusing to start.
//!
//! | Variable | Default |
//! |---|---|
//! | `PETCARE_PORT` | `3000` |
//! | `PETCARE_API_URL` | `http://localhost:8000/api` |
//! | `PETCARE_AUTH_URL` | unset (no token endpoint) |
//! | `PETCARE_API_KEY` | unset |
//! | `PETCARE_REFRESH_TOKEN` | unset |
//! | `PETCARE_ACCESS_TOKEN` | unset (static bearer token) |
//! | `PETCARE_PET_ID` | unset (no pet selected at start) |
//! | `PETCARE_DATABASE_URL` | `sqlite:petcare.db?mode=rwc` |
//! | `PETCARE_REFRESH_SECS` | `60` |
//! | `PETCARE_TOKEN_TTL_SECS` | `300` |
//! | `PETCARE_REQUEST_TIMEOUT_SECS` | `15` |

use std::env;
use std::time::Duration;

use crate::controller::DEFAULT_REFRESH_PERIOD;
use crate::remote::TokenProvider;

/// Default port if not specified via environment variable.
pub const DEFAULT_PORT: u16 = 3000;

/// Default backend URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Default database path if not specified via environment variable.
pub const DEFAULT_DB_PATH: &str = "sqlite:petcare.db?mode=rwc";

const DEFAULT_TOKEN_TTL_SECS: u64 = 300;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub api_url: String,
    pub auth_url: Option<String>,
    pub api_key: Option<String>,
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    pub pet_id: Option<String>,
    pub database_url: String,
    pub refresh_period: Duration,
    pub token_ttl: Duration,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let secs = |key: &str, default: u64| {
            Duration::from_secs(
                text(key)
                    .and_then(|v| v.parse().ok())
                    .filter(|v| *v > 0)
                    .unwrap_or(default),
            )
        };

        Self {
            port: text("PETCARE_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            api_url: text("PETCARE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            auth_url: text("PETCARE_AUTH_URL"),
            api_key: text("PETCARE_API_KEY"),
            refresh_token: text("PETCARE_REFRESH_TOKEN"),
            access_token: text("PETCARE_ACCESS_TOKEN"),
            pet_id: text("PETCARE_PET_ID"),
            database_url: text("PETCARE_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            refresh_period: secs("PETCARE_REFRESH_SECS", DEFAULT_REFRESH_PERIOD.as_secs()),
            token_ttl: secs("PETCARE_TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS),
            request_timeout: secs("PETCARE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Token provider for the configured credentials, if any.
    ///
    /// A token endpoint takes precedence over a static access token.
    pub fn token_provider(&self, client: &reqwest::Client) -> Option<TokenProvider> {
        if let Some(auth_url) = &self.auth_url {
            return Some(TokenProvider::new(
                client.clone(),
                auth_url,
                self.api_key.clone(),
                self.refresh_token.clone(),
                self.token_ttl,
            ));
        }
        self.access_token.as_deref().map(TokenProvider::fixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.refresh_period, DEFAULT_REFRESH_PERIOD);
        assert_eq!(config.token_ttl, Duration::from_secs(300));
        assert!(config.pet_id.is_none());
        assert!(config.token_provider(&reqwest::Client::new()).is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PETCARE_PORT", "8081"),
            ("PETCARE_API_URL", "https://pets.example.com"),
            ("PETCARE_PET_ID", "pet-42"),
            ("PETCARE_REFRESH_SECS", "15"),
        ]);

        assert_eq!(config.port, 8081);
        assert_eq!(config.api_url, "https://pets.example.com");
        assert_eq!(config.pet_id.as_deref(), Some("pet-42"));
        assert_eq!(config.refresh_period, Duration::from_secs(15));
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = config_from(&[
            ("PETCARE_PORT", "not-a-port"),
            ("PETCARE_REFRESH_SECS", "0"),
            ("PETCARE_PET_ID", "   "),
        ]);

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.refresh_period, DEFAULT_REFRESH_PERIOD);
        assert!(config.pet_id.is_none());
    }

    #[test]
    fn test_static_token() {
        let config = config_from(&[("PETCARE_ACCESS_TOKEN", "secret")]);
        assert!(config.token_provider(&reqwest::Client::new()).is_some());
    }
}
