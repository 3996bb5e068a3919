use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing env: {0}")]
    MissingEnv(&'static str),
}

/// Connection settings for the PostgREST row store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the Supabase project (no trailing slash).
    pub base_url: String,
    /// Service-role key, sent as both `apikey` and bearer token.
    pub service_key: String,
}

/// Tunables for the engine itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub store: StoreConfig,
    /// How long the settings cache may serve stale values, in seconds.
    pub settings_cache_ttl_secs: u64,
}

fn req(name: &'static str, fallbacks: &[&str]) -> Result<String, ConfigError> {
    if let Ok(v) = env::var(name) {
        let v = v.trim().to_string();
        if !v.is_empty() {
            return Ok(v);
        }
    }
    for fallback in fallbacks {
        if let Ok(v) = env::var(fallback) {
            let v = v.trim().to_string();
            if !v.is_empty() {
                tracing::debug!("Using fallback env: {} for {}", fallback, name);
                return Ok(v);
            }
        }
    }
    Err(ConfigError::MissingEnv(name))
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: req("SUPABASE_URL", &["NEXT_PUBLIC_SUPABASE_URL"])?
                .trim_end_matches('/')
                .to_string(),
            service_key: req("SUPABASE_SERVICE_ROLE_KEY", &["SUPABASE_KEY"])?,
        })
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env once; missing file is fine in deployed environments.
        dotenvy::dotenv().ok();

        let settings_cache_ttl_secs = env::var("ATTENDANCE_SETTINGS_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        Ok(Self {
            store: StoreConfig::from_env()?,
            settings_cache_ttl_secs,
        })
    }
}

// Cached process-wide config - env vars don't change after startup
static CONFIG: OnceCell<EngineConfig> = OnceCell::new();

pub fn config() -> Result<&'static EngineConfig, ConfigError> {
    CONFIG.get_or_try_init(EngineConfig::from_env)
}
