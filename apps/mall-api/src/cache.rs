//! Optional Redis cache for the storefront category tree.
//!
//! Only one key is used: `{prefix}category:tree`. Redis errors never fail
//! a request; they are logged and the caller falls back to the database.
//! Without `REDIS_URL` every operation is a no-op.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use mall_core::CategoryNode;

use crate::config::MallConfig;

#[derive(Clone)]
pub struct CategoryCache {
    conn: Option<ConnectionManager>,
    prefix: String,
    ttl_secs: u64,
}

impl CategoryCache {
    /// A cache that stores nothing.
    pub fn disabled() -> Self {
        CategoryCache {
            conn: None,
            prefix: String::new(),
            ttl_secs: 0,
        }
    }

    /// Connects when `REDIS_URL` is configured. Connection failures leave
    /// the cache disabled.
    pub async fn connect(config: &MallConfig) -> Self {
        let Some(url) = config.redis_url.as_deref() else {
            info!("REDIS_URL not set, category cache disabled");
            return CategoryCache::disabled();
        };

        let conn = match redis::Client::open(url) {
            Ok(client) => match client.get_connection_manager().await {
                Ok(conn) => {
                    info!("Connected to Redis");
                    Some(conn)
                }
                Err(e) => {
                    warn!(error = %e, "Failed to connect to Redis, continuing without it");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "Invalid REDIS_URL, continuing without cache");
                None
            }
        };

        CategoryCache {
            conn,
            prefix: config.cache_prefix.clone(),
            ttl_secs: config.cache_ttl_secs,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    pub fn tree_key(&self) -> String {
        format!("{}category:tree", self.prefix)
    }

    pub async fn get_tree(&self) -> Option<Vec<CategoryNode>> {
        let mut conn = self.conn.clone()?;
        let key = self.tree_key();

        let raw: Option<String> = match conn.get(&key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, key = %key, "Cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw?) {
            Ok(tree) => {
                debug!(key = %key, "Category tree cache hit");
                Some(tree)
            }
            Err(e) => {
                warn!(error = %e, key = %key, "Discarding unreadable cache entry");
                None
            }
        }
    }

    pub async fn put_tree(&self, tree: &[CategoryNode]) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        let key = self.tree_key();

        let payload = match serde_json::to_string(tree) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to serialize category tree");
                return;
            }
        };

        if let Err(e) = conn.set_ex::<_, _, ()>(&key, payload, self.ttl_secs).await {
            warn!(error = %e, key = %key, "Cache write failed");
        }
    }

    /// Drops the cached tree after a category write.
    pub async fn invalidate_tree(&self) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        let key = self.tree_key();

        if let Err(e) = conn.del::<_, ()>(&key).await {
            warn!(error = %e, key = %key, "Cache invalidation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_cache_is_noop() {
        let cache = CategoryCache::disabled();

        assert!(!cache.is_enabled());
        cache.put_tree(&[]).await;
        assert!(cache.get_tree().await.is_none());
        cache.invalidate_tree().await;
    }

    #[tokio::test]
    async fn test_unset_url_disables_cache() {
        let config = MallConfig::default();
        let cache = CategoryCache::connect(&config).await;
        assert!(!cache.is_enabled());
    }

    #[test]
    fn test_key_uses_prefix() {
        let cache = CategoryCache {
            conn: None,
            prefix: "online-mall:".to_string(),
            ttl_secs: 60,
        };
        assert_eq!(cache.tree_key(), "online-mall:category:tree");
    }
}
