use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Path-like cache key, e.g. `patients/<id>/prescriptions`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QueryKey(parts.into_iter().map(Into::into).collect())
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn child(&self, segment: impl Into<String>) -> QueryKey {
        let mut parts = self.0.clone();
        parts.push(segment.into());
        QueryKey(parts)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    updated_at: Instant,
    invalidated: bool,
}

/// In-memory query cache with staleness and prefix invalidation.
#[derive(Debug)]
pub struct QueryCache<V> {
    entries: RwLock<HashMap<QueryKey, Entry<V>>>,
    stale_time: Duration,
}

impl<V: Clone> QueryCache<V> {
    pub fn new(stale_time: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            stale_time,
        }
    }

    pub async fn get(&self, key: &QueryKey) -> Option<V> {
        self.entries.read().await.get(key).map(|e| e.value.clone())
    }

    pub async fn set(&self, key: QueryKey, value: V) {
        self.entries.write().await.insert(
            key,
            Entry {
                value,
                updated_at: Instant::now(),
                invalidated: false,
            },
        );
    }

    pub async fn remove(&self, key: &QueryKey) -> Option<V> {
        self.entries.write().await.remove(key).map(|e| e.value)
    }

    /// The value currently cached under `key`, taken before an optimistic write.
    pub async fn snapshot(&self, key: &QueryKey) -> Option<V> {
        self.get(key).await
    }

    /// Puts a snapshot back; `None` means the key was empty and is removed.
    pub async fn restore(&self, key: &QueryKey, snapshot: Option<V>) {
        match snapshot {
            Some(value) => self.set(key.clone(), value).await,
            None => {
                self.remove(key).await;
            }
        }
    }

    /// Missing entries count as stale.
    pub async fn is_stale(&self, key: &QueryKey) -> bool {
        match self.entries.read().await.get(key) {
            Some(entry) => entry.invalidated || entry.updated_at.elapsed() >= self.stale_time,
            None => true,
        }
    }

    /// Every entry under `prefix`, stale or not.
    pub async fn entries_under(&self, prefix: &QueryKey) -> Vec<(QueryKey, V)> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    /// Marks every entry under `prefix` stale; returns how many were marked.
    pub async fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.entries.write().await;
        let mut marked = 0;
        for (key, entry) in entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.invalidated = true;
                marked += 1;
            }
        }
        debug!(prefix = %prefix, marked, "cache invalidated");
        marked
    }

    /// Returns the cached value while fresh, otherwise loads and stores it.
    pub async fn fetch_with<F, Fut, E>(&self, key: &QueryKey, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if !self.is_stale(key).await {
            if let Some(value) = self.get(key).await {
                return Ok(value);
            }
        }
        let value = loader().await?;
        self.set(key.clone(), value.clone()).await;
        Ok(value)
    }
}
