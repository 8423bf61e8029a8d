//! Application configuration layered from defaults, a TOML file and the environment.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::i18n::Locale;

/// Directory under the user's config and cache roots.
pub const APP_DIR: &str = "bannerwatch";
/// Prefix for environment overrides, e.g. `BANNERWATCH__API__BASE_URL`.
pub const ENV_PREFIX: &str = "BANNERWATCH";

const DEFAULT_CONFIG: &str = r#"# bannerwatch configuration

[api]
base_url = "http://localhost:8000/api"

[http]
timeout_secs = 10

[refresh]
# Never poll faster than this, whatever the server announces.
min_interval_secs = 5
jitter_secs = 3
manual_cooldown_secs = 10
probe_status = true

[backoff]
initial_secs = 2
max_secs = 300
degraded_after = 3

[ui]
tick_millis = 1000
locale = "es"
"#;

/// Endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL the `/banners`, `/status`, `/versions` and `/history` paths hang off.
    pub base_url: String,
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Upper bound for a single fetch attempt.
    pub timeout_secs: u64,
}

/// Refresh cadence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Floor applied to the server-announced refresh delay.
    pub min_interval_secs: u64,
    /// Maximum random delay added to every scheduled attempt.
    pub jitter_secs: u64,
    /// Minimum spacing between out-of-band attempts.
    pub manual_cooldown_secs: u64,
    /// Poll the lightweight status endpoint before fetching the full envelope.
    pub probe_status: bool,
}

/// Failure backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay after the first failure.
    pub initial_secs: u64,
    /// Ceiling for the doubled delay.
    pub max_secs: u64,
    /// Consecutive failures before the client reports a degraded state.
    pub degraded_after: u32,
}

/// Presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Countdown tick period.
    pub tick_millis: u64,
    /// Initial locale.
    pub locale: Locale,
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream API location.
    pub api: ApiConfig,
    /// HTTP client settings.
    pub http: HttpConfig,
    /// Refresh scheduling.
    pub refresh: RefreshConfig,
    /// Retry backoff after failures.
    pub backoff: BackoffConfig,
    /// Terminal front end.
    pub ui: UiConfig,
    /// Directory holding the persisted snapshot.
    pub cache_root: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://localhost:8000/api".to_string(),
            },
            http: HttpConfig { timeout_secs: 10 },
            refresh: RefreshConfig {
                min_interval_secs: 5,
                jitter_secs: 3,
                manual_cooldown_secs: 10,
                probe_status: true,
            },
            backoff: BackoffConfig {
                initial_secs: 2,
                max_secs: 300,
                degraded_after: 3,
            },
            ui: UiConfig {
                tick_millis: 1000,
                locale: Locale::default(),
            },
            cache_root: default_cache_root(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default config file location.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load configuration layering defaults, `path` (optional) and environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let defaults =
            Config::try_from(&AppConfig::default()).context("failed to encode defaults")?;
        let settings = Config::builder()
            .add_source(defaults)
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;

        let config: AppConfig = settings
            .try_deserialize()
            .context("failed to deserialize configuration")?;
        config.validate()?;
        info!(path = %path.display(), base_url = %config.api.base_url, "configuration loaded");
        Ok(config)
    }

    /// Reject settings the scheduler or ticker cannot work with.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.api.base_url.trim().is_empty(),
            "api.base_url must not be empty"
        );
        ensure!(self.http.timeout_secs > 0, "http.timeout_secs must be positive");
        ensure!(
            self.refresh.min_interval_secs > 0,
            "refresh.min_interval_secs must be positive"
        );
        ensure!(self.ui.tick_millis > 0, "ui.tick_millis must be positive");
        ensure!(
            self.backoff.initial_secs > 0,
            "backoff.initial_secs must be positive"
        );
        ensure!(
            self.backoff.initial_secs <= self.backoff.max_secs,
            "backoff.initial_secs ({}) exceeds backoff.max_secs ({})",
            self.backoff.initial_secs,
            self.backoff.max_secs
        );
        ensure!(
            self.backoff.degraded_after > 0,
            "backoff.degraded_after must be at least 1"
        );
        Ok(())
    }

    /// Per-request time budget.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    /// Countdown redraw period.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.ui.tick_millis)
    }
}

/// Path of the user config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.toml")
}

fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Write a commented default config file when none exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    write_default_config(&path)?;
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write default config {}", path.display()))?;
    info!(path = %path.display(), "wrote default configuration");
    Ok(())
}
