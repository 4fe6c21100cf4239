//! Configuration management for MangaClip.
//!
//! Handles loading, saving, and validating configuration from
//! platform-specific config directories.

use crate::error::ConfigError;
use crate::extract::SiteProfile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Application name used for config directory.
const APP_NAME: &str = "MangaClip";

/// Default config filename.
const CONFIG_FILENAME: &str = "config.toml";

/// Production host application.
pub const DEFAULT_SERVER_URL: &str = "https://thelib.vercel.app";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host application endpoints.
    pub server: ServerConfig,

    /// Sign-in handshake settings.
    pub auth: AuthConfig,

    /// Metadata extraction settings.
    pub extraction: ExtractionConfig,

    /// Page fetching settings.
    pub scraping: ScrapingConfig,

    /// File paths.
    pub paths: PathsConfig,
}

/// Host application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL used when no server URL has been stored yet.
    pub base_url: String,

    /// Creation endpoint path.
    pub create_path: String,

    /// Session probe path.
    pub session_path: String,

    /// Page that issues an extension token after sign-in.
    pub sign_in_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVER_URL.to_string(),
            create_path: "/api/manga".to_string(),
            session_path: "/api/auth/session".to_string(),
            sign_in_path: "/auth/extension-callback".to_string(),
        }
    }
}

/// Sign-in handshake configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Interval between session probes while waiting for sign-in.
    pub poll_interval_ms: u64,

    /// Interval between handoff slot checks.
    pub monitor_interval_ms: u64,

    /// Command used to open the sign-in page.
    /// If not set, will try to auto-detect a browser opener.
    /// Examples: "xdg-open", "open", "firefox"
    pub browser_command: Option<String>,

    /// Host substrings that belong to the host application.
    pub host_domains: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            monitor_interval_ms: 1000,
            browser_command: None,
            host_domains: vec!["thelib".to_string(), "vercel.app".to_string()],
        }
    }
}

impl AuthConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    /// Checks whether a hostname belongs to the host application.
    pub fn is_host_page(&self, hostname: &str) -> bool {
        self.host_domains
            .iter()
            .any(|domain| !domain.is_empty() && hostname.contains(domain.as_str()))
    }
}

/// Metadata extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Minimum width and height (exclusive) for the fallback cover scan.
    pub cover_min_dimension: u32,

    /// Seconds before an unanswered floating offer hides itself.
    pub offer_timeout_sec: u64,

    /// Enable extraction debug logging.
    pub debug: bool,

    /// Extra site profiles, tested before the built-in ones.
    pub sites: Vec<SiteProfile>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            cover_min_dimension: 200,
            offer_timeout_sec: 10,
            debug: false,
            sites: Vec::new(),
        }
    }
}

/// Page fetching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// User agent sent with page requests.
    pub user_agent: String,

    /// Page request timeout in seconds.
    pub timeout_sec: u64,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            timeout_sec: 30,
        }
    }
}

/// File path configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory for the extension store and handoff slot.
    pub data_directory: Option<PathBuf>,
}

impl Config {
    /// Returns the platform-specific config directory path.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Returns the full path to the config file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Loads configuration from the default location.
    ///
    /// If the config file doesn't exist, creates a default one.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Saves configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if Url::parse(&self.server.base_url).is_err() {
            return Err(ConfigError::InvalidValue {
                key: "server.base_url".to_string(),
                message: format!("'{}' is not an absolute URL", self.server.base_url),
            });
        }

        for (key, path) in [
            ("server.create_path", &self.server.create_path),
            ("server.session_path", &self.server.session_path),
            ("server.sign_in_path", &self.server.sign_in_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must start with '/'".to_string(),
                });
            }
        }

        for (key, value) in [
            ("auth.poll_interval_ms", self.auth.poll_interval_ms),
            ("auth.monitor_interval_ms", self.auth.monitor_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must be greater than 0".to_string(),
                });
            }
        }

        for site in &self.extraction.sites {
            if site.host.trim().is_empty() || site.label.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "extraction.sites".to_string(),
                    message: "every site needs a host and a label".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Returns the effective data directory, using config or default.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref dir) = self.paths.data_directory {
            Ok(dir.clone())
        } else {
            Self::config_dir()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ImageRule, ListRule, TextRule};
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.base_url, DEFAULT_SERVER_URL);
        assert_eq!(config.server.create_path, "/api/manga");
        assert_eq!(config.auth.poll_interval_ms, 2000);
        assert_eq!(config.auth.monitor_interval_ms, 1000);
        assert_eq!(config.extraction.cover_min_dimension, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_host_page_detection() {
        let auth = AuthConfig::default();
        assert!(auth.is_host_page("thelib.vercel.app"));
        assert!(auth.is_host_page("preview-thelib.example.com"));
        assert!(!auth.is_host_page("mangadex.org"));
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = Config::default();
        config.extraction.sites.push(SiteProfile {
            host: "example-scans.net".to_string(),
            label: "Example Scans".to_string(),
            title: TextRule::First {
                selectors: vec!["h1.entry-title".to_string()],
            },
            description: TextRule::Absent,
            author: TextRule::Absent,
            status: TextRule::Fixed {
                value: "ongoing".to_string(),
            },
            genres: ListRule::Absent,
            cover: ImageRule::Absent,
        });
        let file = NamedTempFile::new().unwrap();

        config.save_to(file.path()).unwrap();

        let loaded = Config::load_from(file.path()).unwrap();
        assert_eq!(loaded.server.base_url, config.server.base_url);
        assert_eq!(loaded.extraction.sites, config.extraction.sites);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            "[server]\nbase_url = \"http://localhost:3000\"\n",
        )
        .unwrap();

        let loaded = Config::load_from(file.path()).unwrap();
        assert_eq!(loaded.server.base_url, "http://localhost:3000");
        assert_eq!(loaded.server.session_path, "/api/auth/session");
        assert_eq!(loaded.auth.poll_interval_ms, 2000);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.server.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.auth.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.create_path = "api/manga".to_string();
        assert!(config.validate().is_err());
    }
}
