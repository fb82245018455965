//! Layered configuration for the boorudex binary.
//!
//! Composes one sub-struct per component and loads them
//! through the `config` crate: a base set of defaults, an optional YAML
//! file, then environment variables prefixed `BOORUDEX__` (double
//! underscore nesting separator, e.g. `BOORUDEX__INGEST__EXCLUDE_TAGS`).

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),

    #[error("validation error: {0}")]
    Validation(String),
}

/// KV backend connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

/// Upstream booru board client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// User-Agent sent with every upstream request. Boorus commonly
    /// block or throttle the default reqwest UA.
    #[serde(default = "default_indexer_ua")]
    pub indexer_ua: String,

    /// Page counter bound per tag search (teacher-ported default: 1000).
    #[serde(default = "default_max_page_count")]
    pub max_page_count: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            indexer_ua: default_indexer_ua(),
            max_page_count: default_max_page_count(),
        }
    }
}

fn default_base_url() -> String {
    "https://danbooru.donmai.us".to_string()
}

fn default_indexer_ua() -> String {
    "boorudex-indexer/0.1".to_string()
}

fn default_max_page_count() -> u32 {
    1000
}

/// Discoverer/Fetcher task settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestSettings {
    /// Tags excluded from every upstream search (`without_tags`).
    #[serde(default)]
    pub exclude_tags: Vec<String>,

    /// Seconds the Discoverer sleeps between full passes over the tag
    /// worklist (default 1800 = 30 minutes).
    #[serde(default = "default_discoverer_interval_secs")]
    pub discoverer_interval_secs: u64,

    /// Minimum wall-clock gap the Fetcher enforces between consecutive
    /// successful fetches, in milliseconds.
    #[serde(default = "default_min_download_delay_ms")]
    pub min_download_delay_ms: u64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            exclude_tags: Vec::new(),
            discoverer_interval_secs: default_discoverer_interval_secs(),
            min_download_delay_ms: default_min_download_delay_ms(),
        }
    }
}

impl IngestSettings {
    pub fn discoverer_interval(&self) -> Duration {
        Duration::from_secs(self.discoverer_interval_secs)
    }

    pub fn min_download_delay(&self) -> Duration {
        Duration::from_millis(self.min_download_delay_ms)
    }
}

fn default_discoverer_interval_secs() -> u64 {
    1800
}

fn default_min_download_delay_ms() -> u64 {
    1000
}

/// Top-level configuration composing every component, plus the one
/// process-wide setting (`log_level`) kept at the top rather than
/// nested in a sub-struct.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoorudexConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub ingest: IngestSettings,

    #[serde(default)]
    pub server: server::ServerConfig,
}

impl Default for BoorudexConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            store: StoreConfig::default(),
            upstream: UpstreamConfig::default(),
            ingest: IngestSettings::default(),
            server: server::ServerConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl BoorudexConfig {
    /// Load defaults, optionally overlay a YAML file, then environment
    /// variables prefixed `BOORUDEX__` with `__` as the nesting separator
    /// (e.g. `BOORUDEX__STORE__REDIS_URL`, `BOORUDEX__INGEST__EXCLUDE_TAGS`).
    pub fn load(yaml_path: Option<&str>) -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(yaml_path.unwrap_or("boorudex")).required(false));

        builder = builder.add_source(
            config::Environment::with_prefix("BOORUDEX")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let cfg: BoorudexConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.upstream.max_page_count == 0 {
            return Err(ConfigLoadError::Validation(
                "upstream.max_page_count must be >= 1".to_string(),
            ));
        }
        if self.ingest.discoverer_interval_secs == 0 {
            return Err(ConfigLoadError::Validation(
                "ingest.discoverer_interval_secs must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    /// `std::env` is process-global; serialize every test that touches
    /// `BOORUDEX__*` vars so they don't race each other.
    fn env_mutex() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    #[test]
    fn default_config_matches_documented_defaults() {
        let cfg = BoorudexConfig::default();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.ingest.discoverer_interval_secs, 1800);
        assert_eq!(cfg.upstream.max_page_count, 1000);
        assert_eq!(cfg.store.redis_url, "redis://127.0.0.1:6379");
    }

    #[test]
    fn load_with_no_yaml_file_falls_back_to_defaults() {
        let _guard = env_mutex().lock().unwrap_or_else(|p| p.into_inner());
        let cfg = BoorudexConfig::load(None).unwrap();
        assert_eq!(cfg.upstream.base_url, "https://danbooru.donmai.us");
    }

    #[test]
    fn env_override_replaces_redis_url() {
        let _guard = env_mutex().lock().unwrap_or_else(|p| p.into_inner());
        std::env::set_var("BOORUDEX__STORE__REDIS_URL", "redis://example.invalid:6380");
        let cfg = BoorudexConfig::load(None).unwrap();
        std::env::remove_var("BOORUDEX__STORE__REDIS_URL");
        assert_eq!(cfg.store.redis_url, "redis://example.invalid:6380");
    }

    #[test]
    fn rejects_zero_discoverer_interval() {
        let _guard = env_mutex().lock().unwrap_or_else(|p| p.into_inner());
        std::env::set_var("BOORUDEX__INGEST__DISCOVERER_INTERVAL_SECS", "0");
        let result = BoorudexConfig::load(None);
        std::env::remove_var("BOORUDEX__INGEST__DISCOVERER_INTERVAL_SECS");
        assert!(result.is_err());
    }
}
