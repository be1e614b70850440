//! Cached query results under hierarchical keys.
//!
//! Values are stored as JSON so one cache serves every query type.
//! Invalidating a key marks every entry under it stale; the next
//! [`QueryCache::fetch`] of a stale entry goes back to the backend.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Mutex;

use getyourshare_shared::{ApiError, Role};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// True when `prefix` names this key or one of its ancestors.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Either key lies under the other, so invalidating one can stale the other.
    pub fn overlaps(&self, other: &QueryKey) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }

    pub fn commissions() -> Self {
        Self::new(["commissions"])
    }

    pub fn commission(id: &str) -> Self {
        Self::commissions().child(id)
    }

    pub fn payments() -> Self {
        Self::new(["payments"])
    }

    pub fn payment(id: &str) -> Self {
        Self::payments().child(id)
    }

    /// The influencer's payout method and status.
    pub fn payment_settings() -> Self {
        Self::payments().child("settings")
    }

    pub fn sales() -> Self {
        Self::new(["sales"])
    }

    pub fn dashboard() -> Self {
        Self::new(["dashboard"])
    }

    /// Stats of one role's dashboard; every role's when the role is unknown.
    pub fn dashboard_stats(role: Option<Role>) -> Self {
        let key = Self::new(["dashboard-stats"]);
        match role {
            Some(role) => key.child(role.as_str()),
            None => key,
        }
    }

    /// One user's balance; every balance when there is no identity.
    pub fn affiliate_balance(user_id: Option<&str>) -> Self {
        let key = Self::new(["affiliate-balance"]);
        match user_id {
            Some(id) => key.child(id),
            None => key,
        }
    }

    pub fn products() -> Self {
        Self::new(["products"])
    }

    pub fn product(id: &str) -> Self {
        Self::products().child(id)
    }

    pub fn reviews(product_id: &str) -> Self {
        Self::new(["reviews", product_id])
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// Anything that can mark cached queries stale.
pub trait CacheInvalidator: Send + Sync {
    /// Mark every entry under `key` stale. Returns how many entries changed.
    fn invalidate(&self, key: &QueryKey) -> usize;
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    stale: bool,
}

pub struct QueryCache {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    invalidations: broadcast::Sender<QueryKey>,
}

impl QueryCache {
    pub fn new() -> Self {
        let (invalidations, _) = broadcast::channel(128);
        Self {
            entries: Mutex::new(HashMap::new()),
            invalidations,
        }
    }

    /// Receiver for invalidated keys, so mounted views can re-fetch.
    pub fn subscribe(&self) -> broadcast::Receiver<QueryKey> {
        self.invalidations.subscribe()
    }

    pub fn set<T: Serialize>(&self, key: QueryKey, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                crate::log_error!("Cannot cache {}: {}", key, e);
                return;
            }
        };
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key,
                Entry {
                    value,
                    stale: false,
                },
            );
        }
    }

    /// Cached value, fresh or stale.
    pub fn get<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let value = self.entries.lock().ok()?.get(key)?.value.clone();
        serde_json::from_value(value).ok()
    }

    /// `None` when nothing is cached under exactly `key`.
    pub fn is_stale(&self, key: &QueryKey) -> Option<bool> {
        self.entries.lock().ok()?.get(key).map(|e| e.stale)
    }

    fn fresh<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let value = {
            let entries = self.entries.lock().ok()?;
            let entry = entries.get(key)?;
            if entry.stale {
                return None;
            }
            entry.value.clone()
        };
        serde_json::from_value(value).ok()
    }

    /// Fresh cached value, or the fetcher's result (which is then cached).
    ///
    /// Fetch errors are returned and leave any stale entry in place.
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<T, ApiError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        if let Some(value) = self.fresh(&key) {
            crate::log_debug!("Cache hit for {}", key);
            return Ok(value);
        }
        let value = fetcher().await?;
        self.set(key, &value);
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheInvalidator for QueryCache {
    fn invalidate(&self, key: &QueryKey) -> usize {
        let mut changed = 0;
        if let Ok(mut entries) = self.entries.lock() {
            for (k, entry) in entries.iter_mut() {
                if k.starts_with(key) && !entry.stale {
                    entry.stale = true;
                    changed += 1;
                }
            }
        }
        crate::log_debug!("Invalidated {} ({} entries)", key, changed);
        let _ = self.invalidations.send(key.clone());
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_key_prefixes() {
        let key = QueryKey::commission("42");
        assert_eq!(key.to_string(), "commissions/42");
        assert!(key.starts_with(&QueryKey::commissions()));
        assert!(!QueryKey::commissions().starts_with(&key));
        assert!(!QueryKey::new(["commissions-archive"]).starts_with(&QueryKey::commissions()));
        assert_eq!(
            QueryKey::dashboard_stats(Some(Role::Merchant)).to_string(),
            "dashboard-stats/merchant"
        );
        assert_eq!(QueryKey::affiliate_balance(None).to_string(), "affiliate-balance");
    }

    #[test]
    fn test_overlap_goes_both_ways() {
        let settings = QueryKey::payment_settings();
        assert!(settings.overlaps(&QueryKey::payments()));
        assert!(QueryKey::payments().overlaps(&settings));
        assert!(!settings.overlaps(&QueryKey::payment("8")));
        assert!(QueryKey::dashboard_stats(None)
            .overlaps(&QueryKey::dashboard_stats(Some(Role::Influencer))));
    }

    #[test]
    fn test_invalidate_marks_descendants_once() {
        let cache = QueryCache::new();
        cache.set(QueryKey::commissions(), &vec![1, 2]);
        cache.set(QueryKey::commission("1"), &1);
        cache.set(QueryKey::payments(), &Vec::<i32>::new());

        assert_eq!(cache.invalidate(&QueryKey::commissions()), 2);
        assert_eq!(cache.is_stale(&QueryKey::commission("1")), Some(true));
        assert_eq!(cache.is_stale(&QueryKey::payments()), Some(false));
        // Already stale: nothing changes
        assert_eq!(cache.invalidate(&QueryKey::commissions()), 0);
        // Stale values are still readable
        assert_eq!(cache.get::<Vec<i32>>(&QueryKey::commissions()), Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn test_fetch_uses_fresh_entry_and_refetches_stale() {
        let cache = QueryCache::new();
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        let fetch = move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ApiError>(vec![n])
        };

        assert_eq!(cache.fetch(QueryKey::sales(), fetch).await.unwrap(), vec![0]);
        assert_eq!(cache.fetch(QueryKey::sales(), fetch).await.unwrap(), vec![0]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate(&QueryKey::sales());
        assert_eq!(cache.fetch(QueryKey::sales(), fetch).await.unwrap(), vec![1]);
        assert_eq!(cache.is_stale(&QueryKey::sales()), Some(false));
    }

    #[tokio::test]
    async fn test_fetch_error_keeps_stale_entry() {
        let cache = QueryCache::new();
        cache.set(QueryKey::dashboard(), &"old");
        cache.invalidate(&QueryKey::dashboard());

        let result: Result<String, ApiError> = cache
            .fetch(QueryKey::dashboard(), || async {
                Err(ApiError::Network("down".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(cache.get::<String>(&QueryKey::dashboard()).as_deref(), Some("old"));
        assert_eq!(cache.is_stale(&QueryKey::dashboard()), Some(true));
    }

    #[tokio::test]
    async fn test_invalidation_is_broadcast() {
        let cache = QueryCache::new();
        let mut rx = cache.subscribe();
        cache.invalidate(&QueryKey::products());
        assert_eq!(rx.recv().await.unwrap(), QueryKey::products());
    }
}
