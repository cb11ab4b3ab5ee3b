use std::env;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host to bind to.
    pub host: String,
    /// Server port to bind to.
    pub port: u16,
    /// Log level (e.g., "info", "debug", "trace").
    pub log_level: String,
    /// Renderer binary, looked up on `PATH` unless absolute.
    pub d2_bin: String,
    /// Layout engine forwarded to the renderer.
    pub d2_layout: Option<String>,
    /// Theme id forwarded to the renderer.
    pub d2_theme: Option<u32>,
    /// Largest accepted query text, in bytes.
    pub max_query_bytes: usize,
}

impl AppConfig {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse("PORT", "u16", var("PORT"))?.unwrap_or(3030),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            d2_bin: var("D2_BIN").unwrap_or_else(|| "d2".to_string()),
            d2_layout: var("D2_LAYOUT"),
            d2_theme: parse("D2_THEME", "u32", var("D2_THEME"))?,
            max_query_bytes: parse("MAX_QUERY_BYTES", "usize", var("MAX_QUERY_BYTES"))?
                .unwrap_or(64 * 1024),
        })
    }

    /// Build the socket address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3030,
            log_level: "info".to_string(),
            d2_bin: "d2".to_string(),
            d2_layout: None,
            d2_theme: None,
            max_query_bytes: 64 * 1024,
        }
    }
}

fn parse<T: FromStr>(
    name: &'static str,
    expected: &'static str,
    value: Option<String>,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|value| {
            value.trim().parse().map_err(|_| ConfigError::Invalid {
                name,
                expected,
                value,
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.addr(), "0.0.0.0:3030");
        assert_eq!(config.d2_bin, "d2");
        assert_eq!(config.d2_layout, None);
        assert_eq!(config.d2_theme, None);
        assert_eq!(config.max_query_bytes, 65536);
    }

    #[test]
    fn reads_overrides() {
        let config = load(&[
            ("PORT", "8080"),
            ("D2_BIN", "/opt/d2/bin/d2"),
            ("D2_LAYOUT", "elk"),
            ("D2_THEME", "200"),
            ("MAX_QUERY_BYTES", "1024"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.d2_bin, "/opt/d2/bin/d2");
        assert_eq!(config.d2_layout.as_deref(), Some("elk"));
        assert_eq!(config.d2_theme, Some(200));
        assert_eq!(config.max_query_bytes, 1024);
    }

    #[test]
    fn invalid_numbers_are_errors() {
        let err = load(&[("PORT", "http")]).unwrap_err();
        assert!(err.to_string().starts_with("PORT must be a valid u16"));
        assert!(load(&[("D2_THEME", "dark")]).is_err());
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[("D2_LAYOUT", ""), ("PORT", " ")]).unwrap();
        assert_eq!(config.d2_layout, None);
        assert_eq!(config.port, 3030);
    }
}
