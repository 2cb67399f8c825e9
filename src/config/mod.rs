use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> String {
    "static/dist".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the real-estate API this gateway fronts.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// CEP (postal code) lookup provider.
    #[serde(default = "default_cep_base_url")]
    pub cep_base_url: String,
    /// Public host where property photos live.
    #[serde(default = "default_image_host")]
    pub image_host: String,
    /// Reference lists (states/cities/neighborhoods/owners) staleness
    /// window, in minutes. Clamped to 30..=60.
    #[serde(default = "default_reference_ttl_minutes")]
    pub reference_ttl_minutes: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            cep_base_url: default_cep_base_url(),
            image_host: default_image_host(),
            reference_ttl_minutes: default_reference_ttl_minutes(),
        }
    }
}

fn default_api_base_url() -> String {
    std::env::var("IMOVIA_API_BASE_URL").unwrap_or_default()
}

fn default_cep_base_url() -> String {
    "https://viacep.com.br/ws".to_string()
}

fn default_image_host() -> String {
    std::env::var("IMOVIA_IMAGE_HOST").unwrap_or_default()
}

fn default_reference_ttl_minutes() -> u64 {
    30
}

impl UpstreamConfig {
    pub fn api_base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    pub fn reference_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.reference_ttl_minutes.clamp(30, 60) * 60)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Loads configuration from a TOML file, falling back to defaults
    /// (plus `IMOVIA_*` env vars) when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        if config.upstream.api_base_url.is_empty() {
            anyhow::bail!("upstream.api_base_url is required (or set IMOVIA_API_BASE_URL)");
        }
        if !config.upstream.api_base_url.starts_with("http://")
            && !config.upstream.api_base_url.starts_with("https://")
        {
            anyhow::bail!("upstream.api_base_url must be an http(s) URL");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let config: Config = toml::from_str(
            r#"
            [upstream]
            api_base_url = "https://api.example.com/"

            [server]
            port = 4000
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.upstream.api_base(), "https://api.example.com");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn reference_ttl_is_clamped() {
        let mut upstream = UpstreamConfig::default();
        upstream.reference_ttl_minutes = 5;
        assert_eq!(upstream.reference_ttl().as_secs(), 30 * 60);
        upstream.reference_ttl_minutes = 120;
        assert_eq!(upstream.reference_ttl().as_secs(), 60 * 60);
    }
}
