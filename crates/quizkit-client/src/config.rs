//! Client configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level quizkit configuration, read from `quizkit.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API root, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Automatic retries for GET transport failures. Capped at 3.
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,
    /// Base delay between retries; attempt `n` waits `n` times this.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,
    #[serde(default = "default_error_log_capacity")]
    pub error_log_capacity: usize,
    /// Send System and Critical errors to `error_report_path`.
    #[serde(default = "default_true")]
    pub report_errors: bool,
    #[serde(default = "default_error_report_path")]
    pub error_report_path: String,
    /// Where credentials and in-progress sessions are stored.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_base_url() -> String {
    "http://localhost:9090/api".to_string()
}
fn default_timeout() -> u64 {
    10
}
fn default_retry_limit() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1000
}
fn default_cache_ttl() -> u64 {
    300
}
fn default_cache_max_entries() -> usize {
    256
}
fn default_error_log_capacity() -> usize {
    quizkit_core::classify::DEFAULT_LOG_CAPACITY
}
fn default_true() -> bool {
    true
}
fn default_error_report_path() -> String {
    "/errors/report".to_string()
}
fn default_data_dir() -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(".local").join("share").join("quizkit"))
        .unwrap_or_else(|_| PathBuf::from(".quizkit"))
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            retry_limit: default_retry_limit(),
            retry_delay_ms: default_retry_delay(),
            cache_ttl_secs: default_cache_ttl(),
            cache_max_entries: default_cache_max_entries(),
            error_log_capacity: default_error_log_capacity(),
            report_errors: true,
            error_report_path: default_error_report_path(),
            data_dir: default_data_dir(),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// `base_url` joined with `path`.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `quizkit.toml` in the current directory
/// 2. `~/.config/quizkit/config.toml`
///
/// Environment override: `QUIZKIT_BASE_URL`.
pub fn load_config() -> Result<ClientConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("quizkit.toml");
            if local.exists() {
                Some(local)
            } else {
                config_dir()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = toml::from_str::<ClientConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loaded config");
            config
        }
        None => ClientConfig::default(),
    };

    if let Ok(url) = std::env::var("QUIZKIT_BASE_URL") {
        if !url.trim().is_empty() {
            config.base_url = url;
        }
    }

    Ok(config)
}

fn config_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("quizkit"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:9090/api");
        assert_eq!(config.retry_limit, 3);
        assert_eq!(config.retry_delay(), Duration::from_secs(1));
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.error_log_capacity, 100);
        assert!(config.report_errors);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
base_url = "https://quiz.example.com/api/"
retry_limit = 1
"#,
        )
        .unwrap();
        assert_eq!(config.retry_limit, 1);
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.url("/banks"), "https://quiz.example.com/api/banks");
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let err = load_config_from(Some(Path::new("/nonexistent/quizkit.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn explicit_path_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quizkit.toml");
        std::fs::write(&path, "cache_ttl_secs = 5\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.cache_ttl_secs, 5);
    }
}
