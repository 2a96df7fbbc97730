use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "promozap.toml",
    "config/promozap.toml",
    "crates/config/promozap.toml",
];

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "PROMOZAP_CONFIG";

/// Broker connection string, read once at startup. Takes precedence over
/// every other source for `redis.url`.
pub const REDIS_URL_ENV: &str = "REDIS_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub redis: RedisConfig,
    pub relay: RelayConfig,
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "RedisConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl RedisConfig {
    const fn default_connect_timeout() -> u64 {
        5
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout_seconds: Self::default_connect_timeout(),
        }
    }
}

/// Downstream destination for messages read back from the raw topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Log each message and drop it.
    #[default]
    Log,
    /// Classify each message by keyword and republish it.
    Classify,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Log => "log",
            SinkKind::Classify => "classify",
        }
    }
}

/// Relay behaviour knobs.
///
/// ```
/// use promozap_config::{RelayConfig, SinkKind};
///
/// let relay = RelayConfig::default();
/// assert_eq!(relay.sink, SinkKind::Log);
/// assert_eq!(relay.publish_retries, 0);
/// assert_eq!(relay.shutdown_timeout_seconds, 5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub sink: SinkKind,
    #[serde(default)]
    pub publish_retries: u32,
    #[serde(default = "RelayConfig::default_retry_backoff")]
    pub retry_backoff_ms: u64,
    #[serde(default = "RelayConfig::default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

impl RelayConfig {
    const fn default_retry_backoff() -> u64 {
        250
    }

    const fn default_shutdown_timeout() -> u64 {
        5
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::default(),
            publish_retries: 0,
            retry_backoff_ms: Self::default_retry_backoff(),
            shutdown_timeout_seconds: Self::default_shutdown_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    pub store_path: String,
    #[serde(default = "WhatsAppConfig::default_render_qr")]
    pub render_qr: bool,
}

impl WhatsAppConfig {
    const fn default_render_qr() -> bool {
        true
    }
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            store_path: "whatsapp/session.db".to_string(),
            render_qr: Self::default_render_qr(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// Load the configuration from defaults, discovered files and environment overrides.
///
/// ```
/// use promozap_config::load;
///
/// std::env::remove_var("PROMOZAP_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.redis.url.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    load_from(None)
}

/// Like [`load`], but an explicit `path` wins over `PROMOZAP_CONFIG` and the
/// default search locations.
pub fn load_from(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let connect_timeout = i64::try_from(defaults.redis.connect_timeout_seconds).unwrap_or(i64::MAX);
    let retry_backoff = i64::try_from(defaults.relay.retry_backoff_ms).unwrap_or(i64::MAX);
    let shutdown_timeout =
        i64::try_from(defaults.relay.shutdown_timeout_seconds).unwrap_or(i64::MAX);

    let mut builder = config::Config::builder()
        .set_default("redis.url", defaults.redis.url.clone())?
        .set_default("redis.connect_timeout_seconds", connect_timeout)?
        .set_default("relay.sink", defaults.relay.sink.as_str())?
        .set_default("relay.publish_retries", i64::from(defaults.relay.publish_retries))?
        .set_default("relay.retry_backoff_ms", retry_backoff)?
        .set_default("relay.shutdown_timeout_seconds", shutdown_timeout)?
        .set_default("whatsapp.store_path", defaults.whatsapp.store_path.clone())?
        .set_default("whatsapp.render_qr", defaults.whatsapp.render_qr)?
        .set_default("logging.filter", defaults.logging.filter.clone())?;

    match resolve_config_file(path) {
        Some(file) => {
            debug!(path = %file.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(file));
        }
        None => {
            debug!("no configuration file found, relying on defaults and environment overrides");
        }
    }

    builder = builder
        .add_source(config::Environment::with_prefix("PROMOZAP").separator("__"))
        .set_override_option("redis.url", std::env::var(REDIS_URL_ENV).ok())?;

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    debug!(?config, "loaded relay configuration");
    Ok(config)
}

fn resolve_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        debug!(path, "configuration file named by {CONFIG_PATH_ENV}");
        return Some(PathBuf::from(path));
    }

    let cwd = std::env::current_dir().ok()?;
    DEFAULT_CONFIG_FILES
        .iter()
        .map(|candidate| cwd.join(candidate))
        .find(|path| path.exists())
}
