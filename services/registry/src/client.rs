//! Resolution Client
//!
//! Readers resolve gateway names from a local TTL cache. The cache is only
//! populated by `refresh` (a detached task that pulls from the primary
//! directory and replicates into the fallback) or by the tiered `resolve`
//! read path. `lookup` never touches the network.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::directory::{Directory, DirectoryError};

/// Default per-call bound on directory requests made by the client
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
struct CacheEntry {
    gateway_id: String,
    created_at: Instant,
}

/// Name -> gateway ID map with lazy TTL expiry
#[derive(Debug)]
pub struct GatewayCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl GatewayCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fresh id for `name`. Stale entries read as absent but stay in place.
    pub fn get(&self, name: &str) -> Option<String> {
        let entries = self.entries.read();
        let entry = entries.get(name)?;
        if entry.created_at.elapsed() < self.ttl {
            Some(entry.gateway_id.clone())
        } else {
            None
        }
    }

    pub fn insert(&self, name: &str, gateway_id: &str) {
        self.insert_at(name, gateway_id, Instant::now());
    }

    fn insert_at(&self, name: &str, gateway_id: &str, created_at: Instant) {
        self.entries.write().insert(
            name.to_string(),
            CacheEntry {
                gateway_id: gateway_id.to_string(),
                created_at,
            },
        );
    }

    /// Entries held, stale ones included
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.created_at.elapsed() < self.ttl);
        before - entries.len()
    }
}

/// Cached, replicated gateway resolution
#[derive(Clone)]
pub struct ResolutionClient {
    cache: Arc<GatewayCache>,
    primary: Arc<dyn Directory>,
    fallback: Arc<dyn Directory>,
    call_timeout: Duration,
}

impl ResolutionClient {
    pub fn new(primary: Arc<dyn Directory>, fallback: Arc<dyn Directory>, ttl: Duration) -> Self {
        Self {
            cache: Arc::new(GatewayCache::new(ttl)),
            primary,
            fallback,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Cache-only read. Missing and stale entries both return `None`.
    pub fn lookup(&self, name: &str) -> Option<String> {
        let hit = self.cache.get(name);
        debug!(gateway = %name, hit = hit.is_some(), "Cache lookup");
        hit
    }

    /// Schedule a background refresh of `name`. Fire-and-forget: failures
    /// are logged, never returned. Must be called inside a tokio runtime.
    pub fn refresh(&self, name: &str, token: Option<&str>) {
        let client = self.clone();
        let name = name.to_string();
        let token = token.map(str::to_string);
        tokio::spawn(async move {
            client.refresh_now(&name, token.as_deref()).await;
        });
    }

    /// Refresh `name` inline: primary hit fills the cache and replicates to
    /// the fallback; primary miss or failure falls back to the fallback
    /// store and only fills the cache. Returns the id that landed in the
    /// cache, if any.
    pub async fn refresh_now(&self, name: &str, token: Option<&str>) -> Option<String> {
        match self.bounded(self.primary.get(name)).await {
            Ok(entry) => {
                self.cache.insert(name, &entry.gateway_id);

                match self
                    .bounded(self.fallback.put_authorized(name, &entry.gateway_id, token))
                    .await
                {
                    Ok(_) => info!(
                        gateway = %name,
                        gateway_id = %entry.gateway_id,
                        "Refreshed and replicated"
                    ),
                    Err(e) => warn!(gateway = %name, error = %e, "Replication to fallback failed"),
                }
                Some(entry.gateway_id)
            }
            Err(e) => {
                if e.is_not_found() {
                    debug!(gateway = %name, "Primary miss, trying fallback");
                } else {
                    warn!(gateway = %name, error = %e, "Primary read failed, trying fallback");
                }
                self.fill_from_fallback(name).await
            }
        }
    }

    /// Tiered read: cache, then primary, then fallback. Populates the cache
    /// on any directory hit and never surfaces errors.
    pub async fn resolve(&self, name: &str) -> Option<String> {
        if let Some(id) = self.lookup(name) {
            return Some(id);
        }

        match self.bounded(self.primary.get(name)).await {
            Ok(entry) => {
                self.cache.insert(name, &entry.gateway_id);
                Some(entry.gateway_id)
            }
            Err(e) => {
                if !e.is_not_found() {
                    warn!(gateway = %name, error = %e, "Primary read failed during resolve");
                }
                self.fill_from_fallback(name).await
            }
        }
    }

    async fn fill_from_fallback(&self, name: &str) -> Option<String> {
        match self.bounded(self.fallback.get(name)).await {
            Ok(entry) => {
                self.cache.insert(name, &entry.gateway_id);
                Some(entry.gateway_id)
            }
            Err(e) => {
                debug!(gateway = %name, error = %e, "Fallback has no usable entry");
                None
            }
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, DirectoryError>>,
    ) -> Result<T, DirectoryError> {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(DirectoryError::Backend(format!(
                    "directory call timed out after {:?}",
                    self.call_timeout
                )))
            })
    }

    pub fn cache(&self) -> &GatewayCache {
        &self.cache
    }
}
