//! Client configuration, loaded from environment variables with defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration for the booking client.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend endpoint configuration.
    pub api: ApiConfig,
    /// Credential persistence configuration.
    pub credentials: CredentialsConfig,
    /// Seat-availability refresh behavior.
    pub refresh: RefreshConfig,
}

/// Backend endpoint configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the booking backend, including any path prefix.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout: u64,
}

/// Credential persistence configuration.
#[derive(Debug, Clone)]
pub struct CredentialsConfig {
    /// Explicit path for the token file; the platform config directory is
    /// used when absent.
    pub path: Option<PathBuf>,
}

/// Seat-availability refresh behavior.
///
/// Read once at controller construction; toggling at runtime takes effect on
/// the next trip selection.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Whether the controller polls the seat map while a trip is selected.
    pub auto_refresh_enabled: bool,
    /// Polling interval in seconds.
    pub interval_secs: u64,
}

impl RefreshConfig {
    /// The polling interval as a `Duration`.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig {
                base_url: env::var("SAWARI_API_URL")
                    .unwrap_or_else(|_| "http://localhost:8000/api".to_string()),
                request_timeout: env::var("SAWARI_REQUEST_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            },
            credentials: CredentialsConfig {
                path: env::var("SAWARI_CREDENTIALS_PATH").ok().map(PathBuf::from),
            },
            refresh: RefreshConfig {
                auto_refresh_enabled: env::var("SAWARI_AUTO_REFRESH")
                    .ok()
                    .and_then(|s| parse_bool(&s))
                    .unwrap_or(false),
                interval_secs: env::var("SAWARI_REFRESH_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://localhost:8000/api".to_string(),
                request_timeout: 30,
            },
            credentials: CredentialsConfig { path: None },
            refresh: RefreshConfig {
                auto_refresh_enabled: false,
                interval_secs: 30,
            },
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_auto_refresh_off() {
        let config = Config::default();
        assert!(!config.refresh.auto_refresh_enabled);
        assert_eq!(config.refresh.interval(), Duration::from_secs(30));
    }

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
