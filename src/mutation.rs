//! Optimistic update with rollback.
//!
//! `Idle -> Optimistic -> {Committed | RolledBack}`. While optimistic the
//! cache holds the predicted value and the pre-write snapshot is kept here.
//! Whatever the outcome, the key is invalidated once the request settles so
//! the next read refetches the server's version.

use std::future::Future;
use std::ops::Deref;

use tracing::{debug, warn};

use crate::cache::{QueryCache, QueryKey};

#[derive(Debug, Clone, PartialEq)]
pub enum MutationState<V> {
    Idle,
    Optimistic { snapshot: Option<V> },
    Committed,
    RolledBack,
}

impl<V> MutationState<V> {
    pub fn name(&self) -> &'static str {
        match self {
            MutationState::Idle => "idle",
            MutationState::Optimistic { .. } => "optimistic",
            MutationState::Committed => "committed",
            MutationState::RolledBack => "rolled_back",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("cannot {action} a mutation in state {from}")]
pub struct TransitionError {
    pub from: &'static str,
    pub action: &'static str,
}

/// Works over a borrowed cache (`&QueryCache<V>`) or a shared one (`Arc<QueryCache<V>>`).
pub struct OptimisticMutation<C, V> {
    cache: C,
    key: QueryKey,
    state: MutationState<V>,
}

impl<C, V> OptimisticMutation<C, V>
where
    C: Deref<Target = QueryCache<V>>,
    V: Clone,
{
    pub fn new(cache: C, key: QueryKey) -> Self {
        Self {
            cache,
            key,
            state: MutationState::Idle,
        }
    }

    pub fn state(&self) -> &MutationState<V> {
        &self.state
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Snapshots the cached value and writes the predicted one.
    pub async fn apply<P>(&mut self, predict: P) -> Result<(), TransitionError>
    where
        P: FnOnce(Option<&V>) -> V,
    {
        if !matches!(self.state, MutationState::Idle) {
            return Err(self.refuse("apply"));
        }
        let snapshot = self.cache.snapshot(&self.key).await;
        let predicted = predict(snapshot.as_ref());
        self.cache.set(self.key.clone(), predicted).await;
        self.state = MutationState::Optimistic { snapshot };
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<(), TransitionError> {
        if !matches!(self.state, MutationState::Optimistic { .. }) {
            return Err(self.refuse("commit"));
        }
        self.state = MutationState::Committed;
        self.cache.invalidate(&self.key).await;
        Ok(())
    }

    /// Restores the snapshot; a key that was empty before is removed again.
    pub async fn roll_back(&mut self) -> Result<(), TransitionError> {
        if !matches!(self.state, MutationState::Optimistic { .. }) {
            return Err(self.refuse("roll back"));
        }
        let snapshot = match std::mem::replace(&mut self.state, MutationState::RolledBack) {
            MutationState::Optimistic { snapshot } => snapshot,
            _ => None,
        };
        self.cache.restore(&self.key, snapshot).await;
        self.cache.invalidate(&self.key).await;
        Ok(())
    }

    /// Full cycle: apply the prediction, await `request`, then commit or roll back.
    pub async fn run<P, F, T, E>(&mut self, predict: P, request: F) -> Result<Result<T, E>, TransitionError>
    where
        P: FnOnce(Option<&V>) -> V,
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.apply(predict).await?;
        let result = request.await;
        match &result {
            Ok(_) => {
                debug!(key = %self.key, "optimistic update committed");
                self.commit().await?;
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "optimistic update rolled back");
                self.roll_back().await?;
            }
        }
        Ok(result)
    }

    fn refuse(&self, action: &'static str) -> TransitionError {
        TransitionError {
            from: self.state.name(),
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_success_commits_and_invalidates() {
        let key = QueryKey::new(["appointments", "a1"]);
        let cache = QueryCache::new(Duration::from_secs(300));
        cache.set(key.clone(), "scheduled".to_string()).await;

        let mut m = OptimisticMutation::new(&cache, key.clone());
        let result = m
            .run(|_| "checked_in".to_string(), async {
                // The optimistic value is visible while the request is in flight
                assert_eq!(cache.get(&key).await.as_deref(), Some("checked_in"));
                Ok::<_, String>(())
            })
            .await
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(m.state(), &MutationState::Committed);
        assert_eq!(cache.get(&key).await.as_deref(), Some("checked_in"));
        assert!(cache.is_stale(&key).await);
    }

    #[tokio::test]
    async fn test_error_restores_snapshot() {
        let key = QueryKey::new(["appointments", "a1"]);
        let cache = QueryCache::new(Duration::from_secs(300));
        cache.set(key.clone(), "scheduled".to_string()).await;

        let mut m = OptimisticMutation::new(&cache, key.clone());
        let result = m
            .run(|_| "cancelled".to_string(), async { Err::<(), _>("409 conflict") })
            .await
            .unwrap();

        assert_eq!(result, Err("409 conflict"));
        assert_eq!(m.state(), &MutationState::RolledBack);
        assert_eq!(cache.get(&key).await.as_deref(), Some("scheduled"));
        assert!(cache.is_stale(&key).await);
    }

    #[tokio::test]
    async fn test_rollback_of_previously_empty_key_removes_it() {
        let key = QueryKey::new(["checklists", "c1", "responses"]);
        let cache: QueryCache<String> = QueryCache::new(Duration::from_secs(300));

        let mut m = OptimisticMutation::new(&cache, key.clone());
        m.apply(|prev| {
            assert!(prev.is_none());
            "draft".to_string()
        })
        .await
        .unwrap();
        assert_eq!(cache.get(&key).await.as_deref(), Some("draft"));

        m.roll_back().await.unwrap();
        assert_eq!(cache.get(&key).await, None);
    }

    #[tokio::test]
    async fn test_invalid_transitions() {
        let key = QueryKey::new(["patients"]);
        let cache: QueryCache<String> = QueryCache::new(Duration::from_secs(300));
        let mut m = OptimisticMutation::new(&cache, key);

        assert_eq!(
            m.commit().await,
            Err(TransitionError { from: "idle", action: "commit" })
        );
        m.apply(|_| "x".into()).await.unwrap();
        m.commit().await.unwrap();
        assert!(m.apply(|_| "y".into()).await.is_err());
        assert!(m.roll_back().await.is_err());
    }
}
