//! Declarative proxy settings
//!
//! Settings documents are YAML or TOML. `${VAR}` and `${VAR:-default}` are
//! expanded from the environment before parsing.
//!
//! ```yaml
//! targets: ["127.0.0.1:8081", "127.0.0.1:8082"]
//! methods: ["GET", "POST"]
//! rules:
//!   - pattern: "/api/*"
//!     replacement: "/$1"
//! client:
//!   request_timeout: ${UPSTREAM_TIMEOUT:-30s}
//! ```

use crate::config::ProxyConfig;
use regex::Regex;
use relay_core::{Error, Result};
use relay_proxy::{Balancing, ClientConfig, PoolConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Settings document format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFormat {
    /// YAML format
    Yaml,
    /// TOML format
    Toml,
}

impl SettingsFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| Error::Config("Settings file has no extension".to_string()))?;

        match extension.to_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            other => Err(Error::Config(format!(
                "Unsupported settings format: {other}"
            ))),
        }
    }
}

/// One rewrite rule as written in a settings document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSettings {
    /// Path pattern, `*` matches any run of characters
    pub pattern: String,
    /// Replacement template with `$1`, `$2`, ...
    pub replacement: String,
}

/// Serializable proxy settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxySettings {
    /// Backend servers (`host:port`)
    pub targets: Vec<String>,

    /// Methods to proxy; empty proxies all
    #[serde(default)]
    pub methods: Vec<String>,

    /// Rewrite rules in precedence order
    #[serde(default)]
    pub rules: Vec<RuleSettings>,

    /// Relay the inbound Host header
    #[serde(default = "default_preserve_host")]
    pub preserve_host: bool,

    /// Backend selection policy
    #[serde(default)]
    pub balancing: Balancing,

    /// Client pool settings
    #[serde(default)]
    pub pool: PoolConfig,

    /// Transport settings
    #[serde(default)]
    pub client: ClientConfig,
}

fn default_preserve_host() -> bool {
    true
}

impl ProxySettings {
    /// Parse a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        Self::parse(content, SettingsFormat::Yaml)
    }

    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        Self::parse(content, SettingsFormat::Toml)
    }

    /// Parse a document in the given format
    pub fn parse(content: &str, format: SettingsFormat) -> Result<Self> {
        let expanded = expand_env_vars(content)?;

        let settings = match format {
            SettingsFormat::Yaml => serde_yaml::from_str(&expanded)
                .map_err(|e| Error::Config(format!("Failed to parse YAML: {e}")))?,
            SettingsFormat::Toml => toml::from_str(&expanded)
                .map_err(|e| Error::Config(format!("Failed to parse TOML: {e}")))?,
        };

        Ok(settings)
    }

    /// Load settings from a `.yaml`, `.yml`, or `.toml` file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read settings file: {e}")))?;

        Self::parse(&content, SettingsFormat::from_path(path)?)
    }

    /// Convert into a builder. Filters and error handlers are code-only and
    /// can be attached to the result.
    pub fn into_config(self) -> ProxyConfig {
        ProxyConfig::new()
            .targets(self.targets)
            .methods(self.methods)
            .rules(self.rules.into_iter().map(|r| (r.pattern, r.replacement)))
            .preserve_host(self.preserve_host)
            .balancing(self.balancing)
            .pool(self.pool)
            .client(self.client)
    }
}

/// Expand `${VAR}` and `${VAR:-default}` from the environment
fn expand_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}")
        .map_err(|e| Error::Config(format!("Invalid regex: {e}")))?;

    let mut result = String::with_capacity(content.len());
    let mut last_match = 0;

    for cap in re.captures_iter(content) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let var_name = var_name.as_str();

        let value = match env::var(var_name) {
            Ok(value) => value,
            Err(_) => match cap.get(3) {
                Some(default) => default.as_str().to_string(),
                None => {
                    return Err(Error::Config(format!(
                        "Environment variable '{var_name}' not set and no default provided"
                    )));
                }
            },
        };

        result.push_str(&content[last_match..full_match.start()]);
        result.push_str(&value);
        last_match = full_match.end();
    }

    result.push_str(&content[last_match..]);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const YAML: &str = r#"
targets: ["127.0.0.1:8081", "127.0.0.1:8082"]
methods: ["GET", "post"]
balancing: first
rules:
  - pattern: "/api/*"
    replacement: "/$1"
  - pattern: "/static/*/*"
    replacement: "/assets/$2/$1"
pool:
  max_idle: 8
  idle_timeout: 30s
client:
  connect_timeout: 2s
  request_timeout: 10s
"#;

    const TOML: &str = r#"
targets = ["127.0.0.1:8081", "127.0.0.1:8082"]
methods = ["GET", "post"]
balancing = "first"

[[rules]]
pattern = "/api/*"
replacement = "/$1"

[[rules]]
pattern = "/static/*/*"
replacement = "/assets/$2/$1"

[pool]
max_idle = 8
idle_timeout = "30s"

[client]
connect_timeout = "2s"
request_timeout = "10s"
"#;

    #[test]
    fn test_yaml_settings() {
        let settings = ProxySettings::from_yaml(YAML).unwrap();
        assert_eq!(settings.targets.len(), 2);
        assert_eq!(settings.rules.len(), 2);
        assert!(settings.preserve_host);
        assert_eq!(settings.balancing, Balancing::First);
        assert_eq!(settings.pool.max_idle, 8);
        assert_eq!(settings.pool.idle_timeout, Duration::from_secs(30));
        assert_eq!(settings.client.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_yaml_and_toml_agree() {
        let yaml = ProxySettings::from_yaml(YAML).unwrap();
        let toml = ProxySettings::from_toml(TOML).unwrap();
        assert_eq!(yaml, toml);
    }

    #[test]
    fn test_minimal_settings_defaults() {
        let settings = ProxySettings::from_yaml("targets: [\"localhost:8080\"]").unwrap();
        assert!(settings.methods.is_empty());
        assert!(settings.rules.is_empty());
        assert!(settings.preserve_host);
        assert_eq!(settings.balancing, Balancing::RoundRobin);
        assert_eq!(settings.pool, PoolConfig::default());
        assert_eq!(settings.client, ClientConfig::default());
    }

    #[test]
    fn test_malformed_document() {
        let err = ProxySettings::from_yaml("targets: {").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = ProxySettings::from_toml("methods = [\"GET\"]").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_into_config_builds() {
        let proxy = ProxySettings::from_yaml(YAML)
            .unwrap()
            .into_config()
            .build()
            .unwrap();

        assert_eq!(proxy.selector().targets().len(), 2);
        assert_eq!(
            proxy.rules().rewrite("/static/css/site.css").as_deref(),
            Some("/assets/site.css/css")
        );
    }

    #[test]
    fn test_env_expansion() {
        env::set_var("RELAY_SETTINGS_TEST_HOST", "10.0.0.7:9000");
        let settings = ProxySettings::from_yaml(
            "targets: [\"${RELAY_SETTINGS_TEST_HOST}\", \"${RELAY_SETTINGS_TEST_UNSET:-localhost:80}\"]",
        )
        .unwrap();
        assert_eq!(settings.targets, vec!["10.0.0.7:9000", "localhost:80"]);
    }

    #[test]
    fn test_env_expansion_missing() {
        let err = expand_env_vars("${RELAY_SETTINGS_TEST_MISSING}").unwrap_err();
        assert!(err.to_string().contains("RELAY_SETTINGS_TEST_MISSING"));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            SettingsFormat::from_path(Path::new("proxy.yml")).unwrap(),
            SettingsFormat::Yaml
        );
        assert_eq!(
            SettingsFormat::from_path(Path::new("proxy.TOML")).unwrap(),
            SettingsFormat::Toml
        );
        assert!(SettingsFormat::from_path(Path::new("proxy.json")).is_err());
        assert!(SettingsFormat::from_path(Path::new("proxy")).is_err());
    }
}
