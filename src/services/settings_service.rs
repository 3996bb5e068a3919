use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::Mutex;

use crate::store::{Query, RowStore, StoreError};

const SETTINGS_TABLE: &str = "settings";

struct CachedSettings {
    loaded_at: Instant,
    values: HashMap<String, String>,
}

/// Key-value settings collaborator with a TTL read cache.
///
/// The whole settings table is small, so a read loads it wholesale and
/// serves from memory until the TTL lapses. Writes upsert by key and drop
/// the cache; reads elsewhere may be stale for up to one TTL window, which
/// the callers tolerate. The cache lives on the service instance, not in a
/// module global, so each tenant context gets its own.
pub struct SettingsService {
    store: Arc<dyn RowStore>,
    ttl: Duration,
    cache: Mutex<Option<CachedSettings>>,
}

impl SettingsService {
    pub fn new(store: Arc<dyn RowStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            cache: Mutex::new(None),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        {
            let cache = self.cache.lock().await;
            if let Some(cached) = cache.as_ref() {
                if cached.loaded_at.elapsed() <= self.ttl {
                    return Ok(cached.values.get(key).cloned());
                }
            }
        }

        // Refresh outside the lock; concurrent refreshes just race to the
        // same result.
        let rows = self.store.select(SETTINGS_TABLE, &Query::new()).await?;
        let mut values = HashMap::new();
        for row in rows {
            if let (Some(k), Some(v)) = (
                row.get("key").and_then(|v| v.as_str()),
                row.get("value").and_then(|v| v.as_str()),
            ) {
                values.insert(k.to_string(), v.to_string());
            }
        }

        let result = values.get(key).cloned();
        let mut cache = self.cache.lock().await;
        *cache = Some(CachedSettings { loaded_at: Instant::now(), values });
        Ok(result)
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.store
            .upsert(SETTINGS_TABLE, json!({ "key": key, "value": value }), Some("key"))
            .await?;

        // Invalidate so the next read observes the write immediately.
        let mut cache = self.cache.lock().await;
        *cache = None;
        Ok(())
    }
}
