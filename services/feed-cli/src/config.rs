//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Service base URLs can be overridden with FEEDSTREAM_AUTH_URL and
//! FEEDSTREAM_USERS_URL so one config file works across deployments.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub services: ServicesConfig,
    #[serde(default)]
    pub session: SessionSettings,
}

/// Base URLs of the credential-issuing and protected services
#[derive(Debug, Deserialize)]
pub struct ServicesConfig {
    pub auth_url: String,
    pub users_url: String,
}

/// Session manager tuning
#[derive(Debug, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_expiry_threshold")]
    pub expiry_threshold_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            token_file: default_token_file(),
            refresh_interval_secs: default_refresh_interval(),
            expiry_threshold_secs: default_expiry_threshold(),
        }
    }
}

fn default_token_file() -> PathBuf {
    PathBuf::from("feedstream-tokens.json")
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_expiry_threshold() -> u64 {
    300
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment
    /// variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(url) = std::env::var("FEEDSTREAM_AUTH_URL") {
            config.services.auth_url = url;
        }
        if let Ok(url) = std::env::var("FEEDSTREAM_USERS_URL") {
            config.services.users_url = url;
        }

        for (name, url) in [
            ("auth_url", &config.services.auth_url),
            ("users_url", &config.services.users_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {url}"
                )));
            }
        }

        if config.session.refresh_interval_secs == 0 {
            return Err(common::Error::Config(
                "refresh_interval_secs must be greater than 0".into(),
            ));
        }
        if config.session.expiry_threshold_secs == 0 {
            return Err(common::Error::Config(
                "expiry_threshold_secs must be greater than 0".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("feedstream.toml")
    }

    /// Session manager settings derived from this config.
    pub fn session_config(&self) -> feed_session::SessionConfig {
        let mut session = feed_session::SessionConfig::new(
            self.services.auth_url.clone(),
            self.services.users_url.clone(),
            self.session.token_file.clone(),
        );
        session.refresh_interval = Duration::from_secs(self.session.refresh_interval_secs);
        session.expiry_threshold = Duration::from_secs(self.session.expiry_threshold_secs);
        session
    }
}
