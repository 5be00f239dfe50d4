//! Configuration system for the Ripple client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/ripple/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use ripple_proto::message::UserId;

use crate::client::{ClientSettings, ReconnectPolicy};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// A URL setting does not parse or uses the wrong scheme.
    #[error("invalid {field}: {reason}")]
    InvalidUrl {
        /// Name of the setting.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    network: NetworkFileConfig,
    reconnect: ReconnectFileConfig,
    typing: TypingFileConfig,
}

/// `[network]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct NetworkFileConfig {
    realtime_url: Option<String>,
    api_url: Option<String>,
    user_id: Option<u64>,
    token: Option<String>,
    connect_timeout_secs: Option<u64>,
    event_buffer: Option<usize>,
}

/// `[reconnect]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ReconnectFileConfig {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

/// `[typing]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct TypingFileConfig {
    timeout_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Network --
    /// Realtime WebSocket endpoint.
    pub realtime_url: String,
    /// Base URL of the REST API.
    pub api_url: String,
    /// The authenticated user id.
    pub user_id: Option<UserId>,
    /// Bearer token for the REST API.
    pub token: Option<String>,
    /// Timeout for the WebSocket handshake.
    pub connect_timeout: Duration,
    /// Capacity of the client event channel.
    pub event_buffer: usize,

    // -- Reconnect --
    /// Backoff policy after unintentional closes.
    pub reconnect: ReconnectPolicy,

    // -- Typing --
    /// Quiet interval after which typing indicators expire.
    pub typing_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            realtime_url: "ws://localhost:8080/ws".to_string(),
            api_url: "http://localhost:8080/api".to_string(),
            user_id: None,
            token: None,
            connect_timeout: Duration::from_secs(10),
            event_buffer: 256,
            reconnect: ReconnectPolicy::default(),
            typing_timeout: Duration::from_millis(3000),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// Otherwise the default path (`~/.config/ripple/config.toml`) is tried
    /// and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read or
    /// parsed, or if a URL setting is invalid.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        let config = Self::resolve(cli, &file);
        config.validate()?;
        Ok(config)
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();
        let reconnect = ReconnectPolicy {
            max_attempts: file
                .reconnect
                .max_attempts
                .unwrap_or(defaults.reconnect.max_attempts),
            base_delay: file
                .reconnect
                .base_delay_ms
                .map_or(defaults.reconnect.base_delay, Duration::from_millis),
            max_delay: file
                .reconnect
                .max_delay_ms
                .map_or(defaults.reconnect.max_delay, Duration::from_millis),
        };

        Self {
            realtime_url: cli
                .realtime_url
                .clone()
                .or_else(|| file.network.realtime_url.clone())
                .unwrap_or(defaults.realtime_url),
            api_url: cli
                .api_url
                .clone()
                .or_else(|| file.network.api_url.clone())
                .unwrap_or(defaults.api_url),
            user_id: cli.user_id.or(file.network.user_id).map(UserId::new),
            token: cli.token.clone().or_else(|| file.network.token.clone()),
            connect_timeout: file
                .network
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            event_buffer: file
                .network
                .event_buffer
                .unwrap_or(defaults.event_buffer),
            reconnect,
            typing_timeout: file
                .typing
                .timeout_ms
                .map_or(defaults.typing_timeout, Duration::from_millis),
        }
    }

    /// Check that both endpoints are URLs with a fitting scheme.
    fn validate(&self) -> Result<(), ConfigError> {
        check_url("realtime_url", &self.realtime_url, &["ws", "wss"])?;
        check_url("api_url", &self.api_url, &["http", "https"])?;
        Ok(())
    }

    /// Build [`ClientSettings`] for the realtime client.
    ///
    /// Returns `None` if no user id is configured.
    #[must_use]
    pub fn to_client_settings(&self) -> Option<ClientSettings> {
        let local_user = self.user_id?;
        Some(ClientSettings {
            realtime_url: self.realtime_url.clone(),
            local_user,
            reconnect: self.reconnect,
            typing_timeout: self.typing_timeout,
            event_buffer: self.event_buffer,
        })
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Realtime chat client for the Ripple social network")]
pub struct CliArgs {
    /// WebSocket URL of the realtime endpoint.
    #[arg(long, env = "RIPPLE_REALTIME_URL")]
    pub realtime_url: Option<String>,

    /// Base URL of the REST API.
    #[arg(long, env = "RIPPLE_API_URL")]
    pub api_url: Option<String>,

    /// Your user id.
    #[arg(long, env = "RIPPLE_USER_ID")]
    pub user_id: Option<u64>,

    /// Bearer token for the REST API.
    #[arg(long, env = "RIPPLE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Path to config file (default: `~/.config/ripple/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "RIPPLE_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/ripple.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn check_url(field: &'static str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        field,
        reason: e.to_string(),
    })?;
    if schemes.contains(&url.scheme()) {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl {
            field,
            reason: format!(
                "scheme {} not allowed (expected {})",
                url.scheme(),
                schemes.join(" or ")
            ),
        })
    }
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("ripple").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
