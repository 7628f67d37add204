use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{MarqueeError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub image_base_url: String,
    /// Environment variable consulted first for the API key.
    pub key_env: String,
    /// Shell command whose stdout is used as the key if nothing else matches.
    pub key_command: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.themoviedb.org/3".to_string(),
            image_base_url: "https://image.tmdb.org/t/p".to_string(),
            key_env: "TMDB_API_KEY".to_string(),
            key_command: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
}

fn config_dir() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("marquee"))
}

fn config_path() -> Option<PathBuf> {
    Some(config_dir()?.join("config.toml"))
}

impl Config {
    /// Load the config file, falling back to defaults if it is missing or
    /// does not parse.
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            return Config::default();
        };

        let Ok(content) = std::fs::read_to_string(&path) else {
            return Config::default();
        };

        toml::from_str(&content).unwrap_or_default()
    }
}

/// Read a stored key from ~/.config/marquee/api_key
fn load_stored_key() -> Option<String> {
    let path = config_dir()?.join("api_key");
    let key = std::fs::read_to_string(path).ok()?;
    let key = key.trim().to_string();
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// Run a CLI command and capture stdout as the key
fn try_key_command(command: &str) -> Option<String> {
    let output = std::process::Command::new("sh")
        .args(["-c", command])
        .output()
        .ok()?;

    if output.status.success() {
        let key = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !key.is_empty() {
            return Some(key);
        }
    }
    None
}

/// Resolve the TMDB API key, trying multiple sources:
/// 1. The configured environment variable
/// 2. Stored key at ~/.config/marquee/api_key
/// 3. The configured key_command
pub fn resolve_api_key(api: &ApiConfig) -> Result<String> {
    if let Ok(key) = std::env::var(&api.key_env) {
        if !key.is_empty() {
            return Ok(key);
        }
    }

    if let Some(key) = load_stored_key() {
        return Ok(key);
    }

    if let Some(cmd) = &api.key_command {
        if let Some(key) = try_key_command(cmd) {
            return Ok(key);
        }
    }

    Err(MarqueeError::Config(format!(
        "No TMDB API key found. Set {} or configure a key_command.",
        api.key_env
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[api]
base_url = "https://proxy.example/3"
image_base_url = "https://img.example/t/p"
key_env = "MOVIES_KEY"
key_command = "pass show tmdb"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api.base_url, "https://proxy.example/3");
        assert_eq!(config.api.image_base_url, "https://img.example/t/p");
        assert_eq!(config.api.key_env, "MOVIES_KEY");
        assert_eq!(config.api.key_command.as_deref(), Some("pass show tmdb"));
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.api.base_url, "https://api.themoviedb.org/3");
        assert_eq!(config.api.key_env, "TMDB_API_KEY");
        assert!(config.api.key_command.is_none());
    }

    #[test]
    fn partial_api_section_keeps_other_defaults() {
        let config: Config = toml::from_str("[api]\nkey_env = \"OTHER\"\n").unwrap();
        assert_eq!(config.api.key_env, "OTHER");
        assert_eq!(config.api.image_base_url, "https://image.tmdb.org/t/p");
    }
}
