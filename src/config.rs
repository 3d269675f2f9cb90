use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::transport::retry::RetryPolicy;

/// Fallback API root when neither the config file nor the environment sets one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

// ---------------------------------------------------------------------------
// Environment override tracking
// ---------------------------------------------------------------------------

/// Tracks which configuration settings are overridden by environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    overrides: HashMap<String, String>,
}

impl EnvOverrides {
    /// Check whether a setting key (e.g. "api.base_url") is overridden by an env var.
    pub fn is_overridden(&self, key: &str) -> bool {
        self.overrides.contains_key(key)
    }

    /// Get the env var name that overrides the given setting key.
    pub fn env_var_for(&self, key: &str) -> Option<&str> {
        self.overrides.get(key).map(String::as_str)
    }

    /// Get all overrides as a map of setting key -> env var name.
    pub fn all(&self) -> &HashMap<String, String> {
        &self.overrides
    }

    fn record(&mut self, key: &str, env_var: &str) {
        self.overrides.insert(key.to_string(), env_var.to_string());
    }
}

// ---------------------------------------------------------------------------
// Main configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Env var overrides are not serialized to TOML.
    #[serde(skip)]
    pub env_overrides: EnvOverrides,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Endpoint root every request path is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Whole-request timeout for regular (non-streaming) calls.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// File holding the persisted token/user/login-flag group.
    #[serde(default = "default_session_path")]
    pub storage_path: PathBuf,
    /// Route the unauthorized handler redirects to.
    #[serde(default = "default_login_route")]
    pub login_route: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_path: default_session_path(),
            login_route: default_login_route(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Size limit applied to generic file uploads.
    #[serde(default = "default_upload_max_size")]
    pub max_size_bytes: u64,
    /// MIME types accepted for image uploads (chat images, avatars).
    #[serde(default = "default_image_types")]
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: default_upload_max_size(),
            allowed_types: default_image_types(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Ceiling for a single backoff delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(self.max_retries)
            .with_initial_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
const fn default_timeout_secs() -> u64 {
    15
}
const fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_session_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chatdesk")
        .join("session.json")
}
fn default_login_route() -> String {
    "/auth/login".to_string()
}
const fn default_upload_max_size() -> u64 {
    10 * 1024 * 1024
}
fn default_image_types() -> Vec<String> {
    ["image/jpeg", "image/png", "image/gif", "image/webp"]
        .into_iter()
        .map(String::from)
        .collect()
}
const fn default_max_retries() -> u32 {
    3
}
const fn default_initial_delay_ms() -> u64 {
    1000
}
const fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_log_level() -> String {
    "info".to_string()
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a TOML file, then apply `CHATDESK_*` env overrides.
    ///
    /// A missing file is not an error: defaults are used instead.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            config
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults with `CHATDESK_*` env overrides applied, for callers with no
    /// config file.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Write the configuration back to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        let mut ov = EnvOverrides::default();

        macro_rules! env_str {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = val;
                    ov.record($key, $env);
                }
            };
        }
        macro_rules! env_bool {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
                    ov.record($key, $env);
                }
            };
        }
        macro_rules! env_parse {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    if let Ok(parsed) = val.parse() {
                        $field = parsed;
                        ov.record($key, $env);
                    }
                }
            };
        }
        macro_rules! env_path {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = PathBuf::from(val);
                    ov.record($key, $env);
                }
            };
        }

        // -- API --
        env_str!("api.base_url", "CHATDESK_API_BASE_URL", self.api.base_url);
        env_parse!("api.timeout_secs", "CHATDESK_API_TIMEOUT_SECS", self.api.timeout_secs);
        env_parse!(
            "api.connect_timeout_secs",
            "CHATDESK_API_CONNECT_TIMEOUT_SECS",
            self.api.connect_timeout_secs
        );

        // -- Session --
        env_path!(
            "session.storage_path",
            "CHATDESK_SESSION_STORAGE_PATH",
            self.session.storage_path
        );
        env_str!(
            "session.login_route",
            "CHATDESK_SESSION_LOGIN_ROUTE",
            self.session.login_route
        );

        // -- Upload --
        env_parse!(
            "upload.max_size_bytes",
            "CHATDESK_UPLOAD_MAX_SIZE_BYTES",
            self.upload.max_size_bytes
        );
        if let Ok(val) = std::env::var("CHATDESK_UPLOAD_ALLOWED_TYPES") {
            self.upload.allowed_types = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            ov.record("upload.allowed_types", "CHATDESK_UPLOAD_ALLOWED_TYPES");
        }

        // -- Retry --
        env_parse!("retry.max_retries", "CHATDESK_RETRY_MAX_RETRIES", self.retry.max_retries);
        env_parse!(
            "retry.initial_delay_ms",
            "CHATDESK_RETRY_INITIAL_DELAY_MS",
            self.retry.initial_delay_ms
        );
        env_parse!("retry.max_delay_ms", "CHATDESK_RETRY_MAX_DELAY_MS", self.retry.max_delay_ms);

        // -- Logging --
        env_str!("logging.level", "CHATDESK_LOG_LEVEL", self.logging.level);
        env_bool!("logging.json", "CHATDESK_LOG_JSON", self.logging.json);

        self.env_overrides = ov;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api.timeout(), Duration::from_secs(15));
        assert_eq!(config.session.login_route, "/auth/login");
        assert_eq!(config.upload.max_size_bytes, 10 * 1024 * 1024);
        assert_eq!(config.upload.allowed_types.len(), 4);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_env_overrides_tracking() {
        let mut ov = EnvOverrides::default();
        assert!(!ov.is_overridden("api.base_url"));

        ov.record("api.base_url", "CHATDESK_API_BASE_URL");
        assert!(ov.is_overridden("api.base_url"));
        assert_eq!(ov.env_var_for("api.base_url"), Some("CHATDESK_API_BASE_URL"));
        assert_eq!(ov.all().len(), 1);
    }

    #[test]
    fn test_env_override_applies() {
        // SAFETY: these variables are only touched by this test.
        unsafe {
            std::env::set_var("CHATDESK_API_CONNECT_TIMEOUT_SECS", "3");
            std::env::set_var("CHATDESK_RETRY_MAX_DELAY_MS", "5000");
            std::env::set_var("CHATDESK_UPLOAD_ALLOWED_TYPES", "image/png, application/pdf");
        }

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.api.connect_timeout_secs, 3);
        assert_eq!(config.retry.max_delay_ms, 5000);
        assert_eq!(config.upload.allowed_types, vec!["image/png", "application/pdf"]);
        assert!(config.env_overrides.is_overridden("retry.max_delay_ms"));
        assert!(!config.env_overrides.is_overridden("session.login_route"));

        unsafe {
            std::env::remove_var("CHATDESK_API_CONNECT_TIMEOUT_SECS");
            std::env::remove_var("CHATDESK_RETRY_MAX_DELAY_MS");
            std::env::remove_var("CHATDESK_UPLOAD_ALLOWED_TYPES");
        }
    }

    #[test]
    fn test_retry_policy_from_config() {
        let retry = RetryConfig {
            max_retries: 5,
            initial_delay_ms: 100,
            max_delay_ms: 400,
        };
        let policy = retry.policy();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.calculate_backoff(1), Duration::from_millis(100));
        assert_eq!(policy.calculate_backoff(10), Duration::from_millis(400));
    }

    #[test]
    fn test_config_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.session.login_route, "/auth/login");
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatdesk.toml");
        std::fs::write(
            &path,
            r#"
[session]
login_route = "/login"

[upload]
max_size_bytes = 2048

[logging]
level = "debug"
json = true
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.session.login_route, "/login");
        assert_eq!(config.upload.max_size_bytes, 2048);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        // Untouched sections keep their defaults.
        assert_eq!(config.retry.initial_delay_ms, 1000);
    }

    #[test]
    fn test_config_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("save.toml");

        let mut config = Config::default();
        config.session.storage_path = dir.path().join("session.json");
        config.retry.max_retries = 7;
        config.save(&path).unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.session.storage_path, dir.path().join("session.json"));
        assert_eq!(reloaded.retry.max_retries, 7);
    }
}
