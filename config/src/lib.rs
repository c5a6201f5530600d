//! Configuration loading and credential resolution.
//!
//! Mermake reads an optional TOML config from `~/.mermake/config.toml`:
//!
//! ```toml
//! [api_keys]
//! gemini = "${GEMINI_API_KEY}"
//!
//! [service]
//! endpoint = "http://127.0.0.1:3000/api/gemini"
//!
//! [history]
//! record_unchanged = true
//! ```
//!
//! A missing or unparsable file falls back to defaults with a warning. The
//! generation-service credential is the one hard requirement: it must be
//! resolvable at startup (env var first, then config), and its absence is a
//! fatal error rather than something surfaced per request.

use serde::Deserialize;
use std::{env, path::Path, path::PathBuf};
use thiserror::Error;

/// Environment variable consulted before the config file.
pub const API_KEY_ENV_VAR: &str = "GEMINI_API_KEY";

/// Default address of the diagram generation service.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000/api/gemini";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "no generation service credential found: set {API_KEY_ENV_VAR} or add \
         [api_keys].gemini to {config_hint}"
    )]
    MissingApiKey { config_hint: String },
}

#[derive(Debug, Default, Deserialize)]
pub struct MermakeConfig {
    pub api_keys: Option<ApiKeys>,
    pub service: Option<ServiceConfig>,
    pub history: Option<HistoryConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiKeys {
    pub gemini: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceConfig {
    pub endpoint: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryConfig {
    /// Whether committing text identical to the current document still
    /// appends a history entry. Defaults to true (the observed behavior).
    pub record_unchanged: Option<bool>,
}

impl MermakeConfig {
    /// Load the config file, falling back to defaults if absent or invalid.
    #[must_use]
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    #[must_use]
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Self::default();
            }
        };

        match toml::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Self::default()
            }
        }
    }

    /// Generation service endpoint, defaulting to [`DEFAULT_ENDPOINT`].
    #[must_use]
    pub fn endpoint(&self) -> String {
        self.service
            .as_ref()
            .and_then(|service| service.endpoint.clone())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
    }

    /// Whether unchanged commits still append history entries.
    #[must_use]
    pub fn record_unchanged(&self) -> bool {
        self.history
            .as_ref()
            .and_then(|history| history.record_unchanged)
            .unwrap_or(true)
    }

    /// Resolve the generation service credential.
    ///
    /// Order: `GEMINI_API_KEY` environment variable, then the config file's
    /// `[api_keys].gemini` (with `${VAR}` expansion). A missing credential is
    /// a fatal startup condition.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        self.resolve_api_key_with(env::var(API_KEY_ENV_VAR).ok())
    }

    fn resolve_api_key_with(&self, env_value: Option<String>) -> Result<String, ConfigError> {
        if let Some(key) = env_value
            && !key.trim().is_empty()
        {
            return Ok(key);
        }

        let from_config = self
            .api_keys
            .as_ref()
            .and_then(|keys| keys.gemini.as_deref())
            .map(expand_env_vars)
            .filter(|key| !key.trim().is_empty());

        from_config.ok_or_else(|| ConfigError::MissingApiKey {
            config_hint: config_path().map_or_else(
                || "~/.mermake/config.toml".to_string(),
                |p| p.display().to_string(),
            ),
        })
    }
}

/// Expand `${VAR}` references against the process environment.
///
/// Unset variables expand to the empty string; malformed references are
/// passed through verbatim.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut i = 0;

    while i < value.len() {
        if value[i..].starts_with("${") {
            let start = i + 2;
            if let Some(end_rel) = value[start..].find('}') {
                let end = start + end_rel;
                let var = &value[start..end];
                if !var.is_empty() {
                    let replacement = env::var(var).unwrap_or_default();
                    out.push_str(&replacement);
                }
                i = end + 1;
                continue;
            }
        }

        let ch = value[i..].chars().next().unwrap_or_default();
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}

/// `~/.mermake/config.toml`, or `None` when the home directory is unknown.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".mermake").join("config.toml"))
}
