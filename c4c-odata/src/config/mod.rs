//! Client configuration
//!
//! Resolved in three layers, later layers winning:
//! 1. built-in defaults
//! 2. `config.toml` in the user config directory (`~/.config/c4c-odata/` on Linux)
//! 3. `C4C_ODATA_*` environment variables, including those from a `.env` file

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::{Credential, ODataError, ODataVersion};

pub const ENV_ENDPOINT: &str = "C4C_ODATA_ENDPOINT";
pub const ENV_USERNAME: &str = "C4C_ODATA_USERNAME";
pub const ENV_PASSWORD: &str = "C4C_ODATA_PASSWORD";
pub const ENV_VERSION: &str = "C4C_ODATA_VERSION";
pub const ENV_TIMEOUT: &str = "C4C_ODATA_TIMEOUT_SECS";

/// Connection settings for an OData service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ODataConfig {
    /// Service root, e.g. `https://my000000.crm.ondemand.com/sap/c4c/odata/v1/c4codata/`
    pub endpoint: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub version: ODataVersion,
    pub timeout_secs: u64,
    /// Fetch an `x-csrf-token` before the first write request
    pub csrf: bool,
}

impl Default for ODataConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            username: None,
            password: None,
            version: ODataVersion::V2,
            timeout_secs: 60,
            csrf: true,
        }
    }
}

impl ODataConfig {
    pub fn builder() -> ODataConfigBuilder {
        ODataConfigBuilder::new()
    }

    /// Default location of the config file
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("c4c-odata").join("config.toml"))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ODataError> {
        toml::from_str(content).map_err(|e| ODataError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ODataError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ODataError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load defaults, then the config file if present, then the environment
    pub fn load() -> Result<Self, ODataError> {
        dotenvy::dotenv().ok();

        let config = match Self::config_path() {
            Some(path) if path.exists() => {
                log::debug!("Loading config from {}", path.display());
                Self::from_file(&path)?
            }
            _ => Self::default(),
        };

        config.apply_env()
    }

    /// Override fields from `C4C_ODATA_*` environment variables
    pub fn apply_env(self) -> Result<Self, ODataError> {
        self.apply_lookup(|key| std::env::var(key).ok())
    }

    /// Override fields from any key/value source
    pub fn apply_lookup(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ODataError> {
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            self.endpoint = endpoint;
        }
        if let Some(username) = lookup(ENV_USERNAME) {
            self.username = Some(username);
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.password = Some(password);
        }
        if let Some(version) = lookup(ENV_VERSION) {
            self.version = version.parse()?;
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT) {
            self.timeout_secs = timeout.parse().map_err(|_| {
                ODataError::Config(format!(
                    "{} must be a number of seconds, got '{}'",
                    ENV_TIMEOUT, timeout
                ))
            })?;
        }
        Ok(self)
    }

    /// Check that the service root is usable
    pub fn validate(&self) -> Result<(), ODataError> {
        if self.endpoint.is_empty() {
            return Err(ODataError::Config(format!(
                "no endpoint configured; set {} or add `endpoint` to the config file",
                ENV_ENDPOINT
            )));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(ODataError::Config(format!(
                "endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }
        Ok(())
    }

    pub fn credential(&self) -> Option<Credential> {
        self.username.as_ref().map(|username| Credential {
            username: username.clone(),
            password: self.password.clone().unwrap_or_default(),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Builder for ODataConfig
#[derive(Debug)]
pub struct ODataConfigBuilder {
    config: ODataConfig,
}

impl ODataConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ODataConfig::default(),
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Set basic auth credentials
    pub fn credential(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self.config.password = Some(password.into());
        self
    }

    pub fn version(mut self, version: ODataVersion) -> Self {
        self.config.version = version;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn csrf(mut self, enabled: bool) -> Self {
        self.config.csrf = enabled;
        self
    }

    pub fn build(self) -> ODataConfig {
        self.config
    }
}

impl Default for ODataConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ODataConfig::default();

        assert!(config.endpoint.is_empty());
        assert_eq!(config.version, ODataVersion::V2);
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert!(config.csrf);
        assert!(config.credential().is_none());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ODataConfig::builder()
            .endpoint("https://tenant.crm.ondemand.com/sap/c4c/odata/v1/c4codata/")
            .credential("user", "secret")
            .version(ODataVersion::V4)
            .timeout_secs(5)
            .csrf(false)
            .build();

        assert_eq!(config.version, ODataVersion::V4);
        assert_eq!(config.timeout_secs, 5);
        assert!(!config.csrf);
        let credential = config.credential().unwrap();
        assert_eq!(credential.username, "user");
        assert_eq!(credential.password, "secret");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let config = ODataConfig::from_toml_str(
            r#"
            endpoint = "https://tenant.crm.ondemand.com/sap/c4c/odata/v1/c4codata/"
            username = "user"
            version = "v4"
            "#,
        )
        .unwrap();

        assert_eq!(config.username.as_deref(), Some("user"));
        assert_eq!(config.version, ODataVersion::V4);
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = ODataConfig::from_toml_str("endpoint = ").unwrap_err();
        assert!(matches!(err, ODataError::Config(_)));
    }

    #[test]
    fn test_lookup_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_ENDPOINT, "https://other/"),
            (ENV_PASSWORD, "pw"),
            (ENV_VERSION, "v4"),
            (ENV_TIMEOUT, "10"),
        ]);

        let config = ODataConfig::builder()
            .endpoint("https://tenant/")
            .credential("user", "old")
            .build()
            .apply_lookup(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.endpoint, "https://other/");
        assert_eq!(config.username.as_deref(), Some("user"));
        assert_eq!(config.password.as_deref(), Some("pw"));
        assert_eq!(config.version, ODataVersion::V4);
        assert_eq!(config.timeout_secs, 10);
    }

    #[test]
    fn test_bad_timeout_is_rejected() {
        let result = ODataConfig::default().apply_lookup(|key| {
            (key == ENV_TIMEOUT).then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ODataError::Config(_))));
    }

    #[test]
    fn test_validate() {
        assert!(ODataConfig::default().validate().is_err());
        assert!(
            ODataConfig::builder()
                .endpoint("ftp://tenant/")
                .build()
                .validate()
                .is_err()
        );
    }
}
