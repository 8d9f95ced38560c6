//! Service configuration: TOML file plus environment overrides, loaded once
//! at startup. The token signing secret has no default — startup fails fast
//! without one.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `[auth] token_secret`.
pub const TOKEN_SECRET_ENV: &str = "FLIXD_TOKEN_SECRET";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// HMAC secret for token signing. Required; empty means unset.
    pub token_secret: String,
    /// Token lifetime in days. Policy choice, not a constant.
    pub token_ttl_days: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: String::new(),
            token_ttl_days: 7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("flixd.db"),
        }
    }
}

impl Config {
    /// Load from `path` if given, falling back to defaults when no file
    /// exists. `FLIXD_TOKEN_SECRET` overrides the file's secret.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("reading config file {}", p.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("parsing config file {}", p.display()))?
            }
            None => Config::default(),
        };

        if let Ok(secret) = std::env::var(TOKEN_SECRET_ENV) {
            if !secret.is_empty() {
                config.auth.token_secret = secret;
            }
        }

        Ok(config)
    }

    /// The signing secret, or an error if it was never provided. Called at
    /// startup so a misconfigured deployment dies before binding a socket.
    pub fn token_secret(&self) -> Result<&str> {
        if self.auth.token_secret.is_empty() {
            bail!(
                "no token signing secret configured: set [auth] token_secret or {}",
                TOKEN_SECRET_ENV
            );
        }
        Ok(&self.auth.token_secret)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.auth.token_ttl_days * 24 * 3600)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
