use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::poll::PollPolicy;

/// Default base URL of the mobile API.
pub const DEFAULT_BASE_URL: &str = "https://a.android.api.remini.ai/v1/mobile";
/// Default base URL of the oracle (bootstrap) API.
pub const DEFAULT_ORACLE_URL: &str = "https://api.remini.ai/v1/mobile/oracle";
/// File name of the cached session token inside the temp directory.
pub const DEFAULT_TOKEN_FILE_NAME: &str = "remini_identity_token.json";

/// Top-level configuration for the Remini client.
///
/// Controls which endpoints are used, where the session token is cached,
/// network timeouts, and how long task polling may run.
///
/// # Loading
///
/// ```rust,no_run
/// use remini::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.polling.max_wait_secs = 120;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service endpoints.
    pub api: ApiConfig,
    /// Where the session token is cached. `None` uses the temp directory.
    pub token_path: Option<PathBuf>,
    /// Per-request timeouts.
    pub timeouts: TimeoutConfig,
    /// Status polling policy.
    pub polling: PollingConfig,
    /// Fixed processing options sent with every new task.
    pub task: TaskOptions,
}

/// Base URLs for the two API hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Mobile API (profile, tasks, reprocess).
    pub base_url: String,
    /// Oracle API (setup / bootstrap).
    pub oracle_url: String,
}

/// Request timeouts, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// JSON API calls (setup, profile, create, trigger, status, reprocess).
    pub request_secs: u64,
    /// Object-storage upload of the source image.
    pub upload_secs: u64,
    /// Artifact download.
    pub download_secs: u64,
}

/// Polling behavior while waiting for a task to finish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay before each status query.
    pub interval_ms: u64,
    /// Multiplier applied to the delay after every query. `1.0` keeps it fixed.
    pub backoff_factor: f64,
    /// Upper bound for the delay when backing off.
    pub max_interval_ms: u64,
    /// Give up after this many seconds. `0` polls without a limit.
    pub max_wait_secs: u64,
}

/// Processing options attached to task creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOptions {
    pub high_quality_output: bool,
    pub save_input: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            token_path: None,
            timeouts: TimeoutConfig::default(),
            polling: PollingConfig::default(),
            task: TaskOptions::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            oracle_url: DEFAULT_ORACLE_URL.to_string(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            upload_secs: 120,
            download_secs: 120,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            backoff_factor: 1.0,
            max_interval_ms: 30_000,
            max_wait_secs: 600,
        }
    }
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            high_quality_output: false,
            save_input: true,
        }
    }
}

impl PollingConfig {
    /// Convert to the policy used by [`StatusPoller`](crate::poll::StatusPoller).
    ///
    /// A backoff factor that is not finite or is below `1.0` is replaced by
    /// `1.0` (fixed interval).
    pub fn policy(&self) -> PollPolicy {
        let backoff_factor = if self.backoff_factor.is_finite() && self.backoff_factor >= 1.0 {
            self.backoff_factor
        } else {
            log::warn!(
                "Ignoring invalid polling.backoff_factor {}, using 1.0",
                self.backoff_factor
            );
            1.0
        };
        PollPolicy {
            interval: Duration::from_millis(self.interval_ms),
            backoff_factor,
            max_interval: Duration::from_millis(self.max_interval_ms),
            max_wait: (self.max_wait_secs > 0).then(|| Duration::from_secs(self.max_wait_secs)),
        }
    }
}

impl Config {
    /// Resolve the config file path: same directory as the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::debug!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// The token cache location, falling back to the temp directory.
    pub fn token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_TOKEN_FILE_NAME))
    }
}
