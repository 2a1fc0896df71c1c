//! Configuration management

use std::{env, path::Path, path::PathBuf, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default header carrying the shared secret
pub const DEFAULT_HEADER_NAME: &str = "X-API-Key";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before resolving `env:` references.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    pub env_files: Vec<String>,
    /// Server configuration
    pub server: ServerConfig,
    /// Access gate configuration
    pub auth: AuthConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
    /// Directory holding the browser frontend (`index.html` + assets).
    /// No static routes are mounted when unset.
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            request_timeout: Duration::from_secs(30),
            max_body_size: 64 * 1024,
            static_dir: None,
        }
    }
}

/// Access gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Enforce the shared secret (default: false)
    pub enabled: bool,

    /// Shared secret.
    /// Supports: literal value, `env:VAR_NAME`, or `auto` (generates a random key).
    /// A numeric value (`api_key: 123456`, `ITEMTRACK_AUTH__API_KEY=123456`)
    /// is taken as its decimal text.
    #[serde(deserialize_with = "secret_text")]
    pub api_key: Option<String>,

    /// Request header carrying the secret
    pub header_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            header_name: DEFAULT_HEADER_NAME.to_string(),
        }
    }
}

/// Accept a secret written as a string or as a bare number
fn secret_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Secret {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
    }

    Ok(Option::<Secret>::deserialize(deserializer)?.map(|secret| match secret {
        Secret::Text(text) => text,
        Secret::Unsigned(n) => n.to_string(),
        Secret::Signed(n) => n.to_string(),
        Secret::Float(n) => n.to_string(),
    }))
}

impl AuthConfig {
    /// Resolve the API key (expand `env:` references, generate if `auto`)
    pub fn resolve_api_key(&self) -> Result<Option<String>> {
        let Some(key) = self.api_key.as_deref() else {
            return Ok(None);
        };

        if key == "auto" {
            use rand::Rng;
            let random_bytes: [u8; 32] = rand::rng().random();
            return Ok(Some(format!(
                "itk_{}",
                base64::Engine::encode(
                    &base64::engine::general_purpose::URL_SAFE_NO_PAD,
                    random_bytes
                )
            )));
        }

        if let Some(var_name) = key.strip_prefix("env:") {
            return env::var(var_name).map(Some).map_err(|_| {
                Error::Config(format!(
                    "auth.api_key references unset environment variable {var_name}"
                ))
            });
        }

        Ok(Some(key.to_string()))
    }

    /// Whether `api_key` holds the secret itself rather than a reference
    fn is_literal_key(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|k| k != "auto" && !k.starts_with("env:"))
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // ITEMTRACK_AUTH__ENABLED=true -> auth.enabled
        figment = figment.merge(Env::prefixed("ITEMTRACK_").split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        // Must run before the gate resolves `env:` keys
        config.load_env_files();

        Ok(config)
    }

    /// Check settings that do not depend on the environment.
    pub fn validate(&self) -> Result<()> {
        if self.auth.header_name.trim().is_empty() {
            return Err(Error::Config("auth.header_name must not be empty".into()));
        }
        if self.auth.enabled && self.auth.api_key.is_none() {
            return Err(Error::Config(
                "auth.enabled requires auth.api_key (literal, env:VAR or auto)".into(),
            ));
        }
        Ok(())
    }

    /// Copy of this configuration safe to print: a literal key is masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.auth.is_literal_key() {
            config.auth.api_key = Some("********".to_string());
        }
        config
    }

    /// Effective configuration as YAML, with a literal key masked
    pub fn to_redacted_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.redacted())?)
    }

    /// Load environment files into the process environment.
    /// Supports ~ expansion. Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = if path_str.starts_with('~') {
                if let Some(home) = dirs::home_dir() {
                    path_str.replacen('~', &home.display().to_string(), 1)
                } else {
                    path_str.clone()
                }
            } else {
                path_str.clone()
            };

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => tracing::info!("Loaded env file: {expanded}"),
                    Err(e) => tracing::warn!("Failed to load env file {expanded}: {e}"),
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }
}

/// Serde helpers for `Duration` written as `"30s"`, `"5m"` or `"100ms"`
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize a Duration as whole seconds, or milliseconds when sub-second
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    /// Deserialize a human-readable duration; a bare number means seconds
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        // "ms" before "s": "100ms" also ends with 's'
        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(serde::de::Error::custom)
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        }
    }
}
