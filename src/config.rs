//! Configuration file parser for ~/.config/jotter/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as warnings, since they are
//! usually typos.
use crate::paging::ViewportConfig;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable that overrides `api_token`.
pub const TOKEN_ENV_VAR: &str = "JOTTER_TOKEN";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
///
/// Custom Debug impl masks `api_token`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend root, e.g. `https://journal.example.com`.
    pub base_url: String,

    /// Id of the signed-in user. Owner of notifications and the default
    /// subject of follower/following lists.
    pub user_id: String,

    /// Bearer token (alternative to the JOTTER_TOKEN env var).
    /// Env var takes precedence over config file.
    pub api_token: Option<String>,

    /// Items requested per page.
    pub page_size: u32,

    /// Quiet period after the last keystroke before a search is issued.
    pub search_debounce_ms: u64,

    /// Per-request timeout.
    pub request_timeout_secs: u64,

    /// Fraction of the end-of-list sentinel that must be visible.
    pub viewport_threshold: f32,

    /// Start loading when the sentinel is this many rows below the viewport.
    pub scroll_margin_rows: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8747".to_string(),
            user_id: String::new(),
            api_token: None,
            page_size: 10,
            search_debounce_ms: 300,
            request_timeout_secs: 20,
            viewport_threshold: 0.5,
            scroll_margin_rows: 3,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("user_id", &self.user_id)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("page_size", &self.page_size)
            .field("search_debounce_ms", &self.search_debounce_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("viewport_threshold", &self.viewport_threshold)
            .field("scroll_margin_rows", &self.scroll_margin_rows)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 8] = [
        "base_url",
        "user_id",
        "api_token",
        "page_size",
        "search_debounce_ms",
        "request_timeout_secs",
        "viewport_threshold",
        "scroll_margin_rows",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check size before reading so a corrupted file can't exhaust memory.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::parse(&content)?;
        tracing::info!(
            path = %path.display(),
            base_url = %config.base_url,
            page_size = config.page_size,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.viewport_threshold) {
            return Err(ConfigError::Invalid(format!(
                "viewport_threshold must be between 0 and 1, got {}",
                self.viewport_threshold
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Token from the environment if set, else from the file.
    pub fn resolve_token(&self) -> Option<SecretString> {
        Self::pick_token(std::env::var(TOKEN_ENV_VAR).ok(), self.api_token.as_deref())
    }

    fn pick_token(env: Option<String>, file: Option<&str>) -> Option<SecretString> {
        env.filter(|t| !t.trim().is_empty())
            .or_else(|| file.map(str::to_string))
            .map(SecretString::from)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Viewport tuning for the terminal list, where distance is in rows.
    pub fn viewport(&self) -> ViewportConfig {
        ViewportConfig::new(self.viewport_threshold, self.scroll_margin_rows)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.base_url, "http://localhost:8747");
        assert_eq!(config.page_size, 10);
        assert_eq!(config.search_debounce(), Duration::from_millis(300));
        assert_eq!(config.request_timeout(), Duration::from_secs(20));
        assert_eq!(config.viewport().threshold, 0.5);
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/jotter_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.page_size, 10);
    }

    #[test]
    fn test_empty_file_returns_default() {
        let dir = std::env::temp_dir().join("jotter_config_test_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "   \n  \n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.page_size, 10);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
base_url = "https://journal.example.com"
user_id = "665f1c"
api_token = "file-token"
page_size = 25
search_debounce_ms = 150
request_timeout_secs = 10
viewport_threshold = 0.75
scroll_margin_rows = 5
"#;
        let config = Config::parse(content).unwrap();
        assert_eq!(config.base_url, "https://journal.example.com");
        assert_eq!(config.user_id, "665f1c");
        assert_eq!(config.page_size, 25);
        assert_eq!(config.search_debounce(), Duration::from_millis(150));
        assert_eq!(config.viewport().margin, 5);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let config = Config::parse("page_size = 5\n").unwrap();
        assert_eq!(config.page_size, 5);
        assert_eq!(config.search_debounce_ms, 300);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::parse("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::parse("page_size = 7\ntheme = \"dark\"\n").unwrap();
        assert_eq!(config.page_size, 7);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let err = Config::parse("page_size = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let err = Config::parse("viewport_threshold = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("jotter_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_env_token_wins_over_file() {
        let token = Config::pick_token(Some("env-token".into()), Some("file-token")).unwrap();
        assert_eq!(token.expose_secret(), "env-token");

        let token = Config::pick_token(Some("  ".into()), Some("file-token")).unwrap();
        assert_eq!(token.expose_secret(), "file-token");

        assert!(Config::pick_token(None, None).is_none());
    }

    #[test]
    fn test_debug_masks_api_token() {
        let config = Config {
            api_token: Some("super-secret-token-12345".to_string()),
            ..Config::default()
        };
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret-token-12345"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
