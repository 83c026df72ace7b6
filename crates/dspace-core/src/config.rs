//! Application configuration shared by the gateway and the generator.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// YandexGPT completion endpoint.
pub const DEFAULT_LLM_API_URL: &str =
    "https://llm.api.cloud.yandex.net/foundationModels/v1/completion";

/// Where catalog collections are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Json,
    Sled,
}

/// Global application configuration. Load from TOML or env.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Name shown by the health endpoint and used in the generator's system prompt.
    pub app_name: String,
    /// HTTP port for the gateway.
    pub port: u16,
    /// Directory for catalog files, the interaction log, bookings and feedback.
    pub data_dir: String,
    pub storage_backend: StorageBackend,
    /// "mock" or "live".
    pub llm_mode: String,
    pub llm_api_url: String,
    /// Falls back to `YANDEX_API_KEY` when unset.
    #[serde(default)]
    pub llm_api_key: Option<String>,
    /// Falls back to `YANDEX_FOLDER_ID` when unset.
    #[serde(default)]
    pub llm_folder_id: Option<String>,
    pub llm_timeout_secs: u64,
    pub llm_attempts: u32,
    pub llm_backoff_ms: u64,
    /// Upper bound on one generator call including every retry.
    pub generator_deadline_secs: u64,
    pub log_queue_capacity: usize,
    /// Copy the interaction log to `backups/` every this many records (0 disables).
    pub log_backup_every: u64,

    /// If true, the gateway serves the chat widget from `frontend/`. (Config alias: `ui_enabled`)
    #[serde(default, alias = "ui_enabled")]
    pub frontend_enabled: bool,
    /// Bearer token required on `/admin` routes. Unset leaves them open.
    #[serde(default)]
    pub admin_token: Option<String>,
}

impl CoreConfig {
    /// Load config from file and environment. Precedence: env `DSPACE_*` > file at `DSPACE_CONFIG`
    /// (or `config/gateway.toml`) > defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("DSPACE_CONFIG").unwrap_or_else(|_| "config/gateway.toml".to_string());
        Self::load_from(Path::new(&config_path))
    }

    pub fn load_from(path: &Path) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .set_default("app_name", "D-Space Assistant")?
            .set_default("port", 5000_i64)?
            .set_default("data_dir", "./data")?
            .set_default("storage_backend", "json")?
            .set_default("llm_mode", "mock")?
            .set_default("llm_api_url", DEFAULT_LLM_API_URL)?
            .set_default("llm_timeout_secs", 10_i64)?
            .set_default("llm_attempts", 3_i64)?
            .set_default("llm_backoff_ms", 1000_i64)?
            .set_default("generator_deadline_secs", 35_i64)?
            .set_default("log_queue_capacity", 1024_i64)?
            .set_default("log_backup_every", 100_i64)?;

        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("DSPACE").separator("__"))
            .build()?;

        let mut cfg: Self = built.try_deserialize()?;
        if cfg.llm_api_key.as_deref().map_or(true, str::is_empty) {
            cfg.llm_api_key = std::env::var("YANDEX_API_KEY").ok().filter(|s| !s.is_empty());
        }
        if cfg.llm_folder_id.as_deref().map_or(true, str::is_empty) {
            cfg.llm_folder_id = std::env::var("YANDEX_FOLDER_ID").ok().filter(|s| !s.is_empty());
        }
        Ok(cfg)
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn llm_backoff(&self) -> Duration {
        Duration::from_millis(self.llm_backoff_ms)
    }

    pub fn generator_deadline(&self) -> Duration {
        Duration::from_secs(self.generator_deadline_secs)
    }
}
