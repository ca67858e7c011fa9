use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::types::LanguageConfig;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub docker: DockerConfig,
    pub workspace: WorkspaceConfig,
    pub progress: ProgressConfig,
    pub cleanup: CleanupConfig,
    pub logging: LoggingConfig,
    /// Overrides the built-in language table when non-empty.
    pub languages: Vec<LanguageConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DockerConfig {
    /// Path of the daemon socket; `None` uses `DOCKER_HOST` or the platform default.
    pub socket: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub mount_target: String,
    pub temp_prefix: String,
    /// Parent of staged workspaces; the system temp dir when unset.
    pub base_dir: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProgressConfig {
    pub interval_ms: u64,
    pub total: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CleanupConfig {
    /// Timeout used when `run_code` removes its own container.
    pub auto_timeout_secs: u64,
    /// Timeout used by the `cleanup_container` tool.
    pub tool_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("SANDBOX_ENV").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Map SANDBOX__PROGRESS__INTERVAL_MS=500 to progress.interval_ms
            .add_source(Environment::with_prefix("SANDBOX").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket: None,
            timeout_secs: 120,
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            mount_target: "/app".into(),
            temp_prefix: "docker-sandbox-".into(),
            base_dir: None,
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            total: 100,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            auto_timeout_secs: 10,
            tool_timeout_secs: 30,
        }
    }
}

impl From<ConfigError> for crate::Error {
    fn from(err: ConfigError) -> Self {
        crate::Error::Config(err.to_string())
    }
}
