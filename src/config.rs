//! Federation configuration
//!
//! An ordered list of source descriptors plus pipeline settings, loaded
//! from YAML or JSON. Only the shape is checked here; unknown adapter
//! kinds are rejected when the federation is built.

use crate::pipeline::{Backoff, RetryPolicy};
use crate::source::SourceDescriptor;
use crate::transport::Method;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),
}

/// Retry settings as written in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrySettings {
    pub methods: Vec<Method>,
    pub statuses: Vec<u16>,
    pub max_retries: u32,
    /// Delay before the first retry
    pub delay_ms: u64,
    /// Added per further retry
    pub increment_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            methods: policy.methods,
            statuses: policy.statuses,
            max_retries: policy.max_retries,
            delay_ms: 300,
            increment_ms: 300,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            methods: self.methods.clone(),
            statuses: self.statuses.clone(),
            max_retries: self.max_retries,
            backoff: Backoff::Linear {
                initial: Duration::from_millis(self.delay_ms),
                increment: Duration::from_millis(self.increment_ms),
            },
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationConfig {
    /// Sources in priority order
    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,
    /// Preferred languages, ahead of the defaults
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            languages: Vec::new(),
            retry: RetrySettings::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl FederationConfig {
    /// Load from a `.yaml`, `.yml` or `.json` file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let text = std::fs::read_to_string(path)?;
        match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml_str(&text),
            "json" => Self::from_json_str(&text),
            other => Err(ConfigError::UnsupportedFormat(format!(
                "{} (extension `{other}`)",
                path.display()
            ))),
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capability;
    use std::io::Write;

    const YAML: &str = r#"
sources:
  - uri: http://bartoc.org/en/node/18785
    provider: jskos
    api: https://coli-conc.gbv.de/api/
    prefLabel:
      en: coli-conc
  - uri: urn:local
    provider: memory
languages: [de]
retry:
  methods: [GET]
  maxRetries: 2
  delayMs: 50
timeoutSecs: 5
"#;

    #[test]
    fn yaml_config_keeps_source_order() {
        let config = FederationConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].provider, "jskos");
        assert_eq!(config.sources[1].uri, "urn:local");
        assert_eq!(config.languages, vec!["de"]);
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn retry_settings_fill_defaults() {
        let config = FederationConfig::from_yaml_str(YAML).unwrap();
        let policy = config.retry.policy();
        assert_eq!(policy.methods, vec![Method::Get]);
        assert_eq!(policy.statuses, vec![429, 502, 503, 504]);
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.backoff.delay(1), Duration::from_millis(50));
        assert_eq!(policy.backoff.delay(2), Duration::from_millis(350));
    }

    #[test]
    fn load_dispatches_on_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"sources": [{{"uri": "urn:a", "provider": "jskos", "endpoints": {{"schemes": "https://example.org/voc"}}}}]}}"#
        )
        .unwrap();

        let config = FederationConfig::load(file.path()).unwrap();
        assert_eq!(
            config.sources[0].endpoints.get(&Capability::Schemes).map(String::as_str),
            Some("https://example.org/voc")
        );
        assert_eq!(config.retry, RetrySettings::default());
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        let err = FederationConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = FederationConfig::load(Path::new("/nonexistent/termfed.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
