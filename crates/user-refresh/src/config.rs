//! Refresh configuration
//!
//! Config precedence: env vars > config file > defaults. Every field has a
//! default, so a config file is optional. Secrets never live here; client
//! identity comes from the `authorized_user` credential file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::constants::{DEFAULT_TIMEOUT_SECS, EAGER_REFRESH_THRESHOLD_SECS, TOKEN_ENDPOINT};

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Root of the TOML file. Only the `[refresh]` table is read.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    refresh: RefreshConfig,
}

/// Token refresh settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Cached access tokens expiring within this many seconds are refreshed
    #[serde(default = "default_eager_refresh_threshold")]
    pub eager_refresh_threshold_secs: u64,
}

fn default_token_endpoint() -> String {
    TOKEN_ENDPOINT.to_owned()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_eager_refresh_threshold() -> u64 {
    EAGER_REFRESH_THRESHOLD_SECS
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            token_endpoint: default_token_endpoint(),
            timeout_secs: default_timeout(),
            eager_refresh_threshold_secs: default_eager_refresh_threshold(),
        }
    }
}

impl RefreshConfig {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// `TOKEN_ENDPOINT` overrides `token_endpoint` from the file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&contents)?;
        file.refresh.finish()
    }

    /// Like `load`, but a missing file yields defaults (plus env overrides).
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Self::default().finish()
        }
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("user-refresh.toml")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn eager_refresh_threshold(&self) -> Duration {
        Duration::from_secs(self.eager_refresh_threshold_secs)
    }

    fn finish(mut self) -> Result<Self, ConfigError> {
        if let Ok(endpoint) = std::env::var("TOKEN_ENDPOINT") {
            self.token_endpoint = endpoint;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.token_endpoint.starts_with("http://")
            && !self.token_endpoint.starts_with("https://")
        {
            return Err(ConfigError::Invalid(format!(
                "token_endpoint must start with http:// or https://, got: {}",
                self.token_endpoint
            )));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that read or mutate environment variables,
    /// preventing data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("user-refresh.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_full_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("TOKEN_ENDPOINT") };

        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[refresh]
token_endpoint = "http://127.0.0.1:9000/token"
timeout_secs = 5
eager_refresh_threshold_secs = 60
"#,
        );

        let config = RefreshConfig::load(&path).unwrap();
        assert_eq!(config.token_endpoint, "http://127.0.0.1:9000/token");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.eager_refresh_threshold(), Duration::from_secs(60));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("TOKEN_ENDPOINT") };

        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "");

        let config = RefreshConfig::load(&path).unwrap();
        assert_eq!(config, RefreshConfig::default());
        assert_eq!(config.token_endpoint, "https://oauth2.googleapis.com/token");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.eager_refresh_threshold_secs, 300);
    }

    #[test]
    fn test_load_missing_file() {
        let result = RefreshConfig::load(Path::new("/nonexistent/path/user-refresh.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("TOKEN_ENDPOINT") };

        let config =
            RefreshConfig::load_or_default(Path::new("/nonexistent/path/user-refresh.toml"))
                .unwrap();
        assert_eq!(config, RefreshConfig::default());
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");

        let result = RefreshConfig::load(&path);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("TOKEN_ENDPOINT") };

        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[refresh]\ntoken_endpoint = \"ftp://example.com\"\n");

        let err = RefreshConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("token_endpoint"), "got: {err}");
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("TOKEN_ENDPOINT") };

        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[refresh]\ntimeout_secs = 0\n");

        let err = RefreshConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"), "got: {err}");
    }

    #[test]
    fn test_env_overrides_endpoint() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("TOKEN_ENDPOINT", "https://sts.example.test/token") };

        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[refresh]\ntoken_endpoint = \"https://file.example/token\"\n",
        );
        let config = RefreshConfig::load(&path);

        unsafe { remove_env("TOKEN_ENDPOINT") };
        assert_eq!(
            config.unwrap().token_endpoint,
            "https://sts.example.test/token"
        );
    }

    #[test]
    fn test_resolve_path_prefers_cli() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/from/env.toml") };

        assert_eq!(
            RefreshConfig::resolve_path(Some("/from/cli.toml")),
            PathBuf::from("/from/cli.toml")
        );
        assert_eq!(
            RefreshConfig::resolve_path(None),
            PathBuf::from("/from/env.toml")
        );

        unsafe { remove_env("CONFIG_PATH") };
        assert_eq!(
            RefreshConfig::resolve_path(None),
            PathBuf::from("user-refresh.toml")
        );
    }
}
