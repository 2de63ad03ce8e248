//! Configuration management for floodwatch.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::analyzer::{gemini::DEFAULT_ENDPOINT, DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT};
use crate::error::{Error, Result};
use crate::merger::DEFAULT_REQUEST_DEADLINE;
use crate::status::Override;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default config directory name.
const CONFIG_DIR_NAME: &str = "floodwatch";

/// Environment variable prefix; nested keys use `__`.
const ENV_PREFIX: &str = "FLOODWATCH_";

/// The King County road alert feed.
pub const DEFAULT_FEED_URL: &str = "https://gismaps.kingcounty.gov/roadalert/rss.aspx";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `FLOODWATCH_`, `__` between sections)
/// 2. The bare `OVERRIDE` and `GEMINI_API_KEY` environment variables
/// 3. TOML config file at `~/.config/floodwatch/config.toml`
/// 4. Default values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Road name to look for in feed titles (case-sensitive substring).
    pub road: String,
    /// IANA timezone used to display update times.
    pub timezone: String,
    /// Manual override: `none`, `open` or `closed`.
    #[serde(rename = "override")]
    pub override_status: Override,
    /// Feed configuration.
    pub feed: FeedConfig,
    /// Camera analysis configuration.
    pub analyzer: AnalyzerConfig,
    /// HTTP server configuration.
    pub server: ServerConfig,
}

/// Road alert feed configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Feed URL.
    pub url: String,
    /// Feed fetch timeout in seconds.
    pub timeout_secs: u64,
}

/// Camera analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Gemini API key. Analysis is disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model name.
    pub model: String,
    /// REST endpoint base URL.
    pub endpoint: String,
    /// Camera image URLs, in the order they are sent to the model.
    pub camera_urls: Vec<String>,
    /// How long a verdict is reused, in seconds.
    pub cache_ttl_secs: u64,
    /// Per-camera fetch timeout in seconds.
    pub fetch_timeout_secs: u64,
    /// Model request timeout in seconds.
    pub request_timeout_secs: u64,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: String,
    /// Deadline for a single status request in seconds.
    pub request_deadline_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            road: "124th".to_string(),
            timezone: "America/Los_Angeles".to_string(),
            override_status: Override::None,
            feed: FeedConfig::default(),
            analyzer: AnalyzerConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            camera_urls: Vec::new(),
            cache_ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
            request_timeout_secs: 60,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            request_deadline_secs: DEFAULT_REQUEST_DEADLINE.as_secs(),
        }
    }
}

impl AnalyzerConfig {
    /// Check if an API key is present.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

fn check_http_url(field: &str, value: &str) -> Result<()> {
    let url = reqwest::Url::parse(value)
        .map_err(|e| Error::config(format!("{field} is not a valid URL ({value}): {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::config(format!(
            "{field} must use http or https, not {other} ({value})"
        ))),
    }
}

fn check_nonzero(field: &str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(Error::config(format!("{field} must be greater than 0")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// A missing file is not an error; defaults and the environment apply.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Self::figment(&config_file)
            .merge(Env::raw().only(&["OVERRIDE"]))
            .merge(Env::raw().only(&["GEMINI_API_KEY"]).map(|_| "analyzer.api_key".into()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate exactly one TOML file, ignoring the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigNotFound`] if the file does not exist, or a
    /// load/validation error.
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let config: Config = Self::figment(path).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_file: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.road.trim().is_empty() {
            return Err(Error::config("road must not be empty"));
        }

        self.tz()?;
        check_http_url("feed.url", &self.feed.url)?;
        check_nonzero("feed.timeout_secs", self.feed.timeout_secs)?;

        check_nonzero("analyzer.cache_ttl_secs", self.analyzer.cache_ttl_secs)?;
        check_nonzero("analyzer.fetch_timeout_secs", self.analyzer.fetch_timeout_secs)?;
        check_nonzero(
            "analyzer.request_timeout_secs",
            self.analyzer.request_timeout_secs,
        )?;
        for (i, url) in self.analyzer.camera_urls.iter().enumerate() {
            check_http_url(&format!("analyzer.camera_urls[{i}]"), url)?;
        }
        if self.analyzer.is_enabled() {
            check_http_url("analyzer.endpoint", &self.analyzer.endpoint)?;
            if self.analyzer.model.trim().is_empty() {
                return Err(Error::config("analyzer.model must not be empty"));
            }
            if self.analyzer.camera_urls.is_empty() {
                return Err(Error::config(
                    "analyzer.camera_urls must list at least one camera when an API key is set",
                ));
            }
        }

        self.bind_addr()?;
        check_nonzero("server.request_deadline_secs", self.server.request_deadline_secs)?;

        Ok(())
    }

    /// Parse the display timezone.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a known IANA timezone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| Error::config(format!("unknown timezone '{}'", self.timezone)))
    }

    /// Parse the server bind address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is malformed.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server.bind.parse().map_err(|e| {
            Error::config(format!("server.bind is not a socket address ({}): {e}", self.server.bind))
        })
    }

    /// Get the feed fetch timeout as a Duration.
    #[must_use]
    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed.timeout_secs)
    }

    /// Get the per-camera fetch timeout as a Duration.
    #[must_use]
    pub fn camera_timeout(&self) -> Duration {
        Duration::from_secs(self.analyzer.fetch_timeout_secs)
    }

    /// Get the model request timeout as a Duration.
    #[must_use]
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.analyzer.request_timeout_secs)
    }

    /// Get the verdict cache TTL as a Duration.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.analyzer.cache_ttl_secs)
    }

    /// Get the per-request deadline as a Duration.
    #[must_use]
    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.server.request_deadline_secs)
    }
}
