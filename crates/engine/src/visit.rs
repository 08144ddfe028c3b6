//! Unique-visitor counter.
//!
//! Each identity is counted at most once. Admission and increment happen in
//! one store-side atomic operation ([`KeyValueStore::admit_and_count`]), so
//! concurrent requests for the same identity produce exactly one increment
//! and a failure between the two steps cannot leave an identity admitted but
//! uncounted.

use std::sync::Arc;

use quill_common::error::AppError;

use crate::store::KeyValueStore;

/// Set of identities already counted.
pub const VISIT_USERS_KEY: &str = "site:visit_users";
/// Number of identities ever admitted to [`VISIT_USERS_KEY`].
pub const VISIT_COUNT_KEY: &str = "site:visit_count";

#[derive(Clone)]
pub struct VisitCounter {
    store: Arc<dyn KeyValueStore>,
    set_key: String,
    counter_key: String,
}

impl VisitCounter {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_keys(store, VISIT_USERS_KEY, VISIT_COUNT_KEY)
    }

    pub fn with_keys(
        store: Arc<dyn KeyValueStore>,
        set_key: impl Into<String>,
        counter_key: impl Into<String>,
    ) -> Self {
        Self {
            store,
            set_key: set_key.into(),
            counter_key: counter_key.into(),
        }
    }

    /// Create the counter key at 0 if it does not exist yet.
    pub async fn init(&self) -> Result<(), AppError> {
        if self.store.set_if_absent(&self.counter_key, 0).await? {
            tracing::info!(key = %self.counter_key, "Visit counter initialized");
        }
        Ok(())
    }

    /// Count `identity` if it has never been seen and return the current total.
    ///
    /// Anonymous callers (`None`) only read the total.
    pub async fn record_visit(&self, identity: Option<&str>) -> Result<i64, AppError> {
        let Some(identity) = identity else {
            return self.current().await;
        };

        let (counted, count) = self
            .store
            .admit_and_count(&self.set_key, identity, &self.counter_key)
            .await?;

        if counted {
            tracing::debug!(identity, count, "New unique visitor counted");
        }
        Ok(count)
    }

    pub async fn current(&self) -> Result<i64, AppError> {
        self.store.get(&self.counter_key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn counter() -> (Arc<MemoryStore>, VisitCounter) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), VisitCounter::new(store))
    }

    #[tokio::test]
    async fn test_repeat_identity_counts_once() {
        let (_, counter) = counter();
        counter.init().await.unwrap();
        assert_eq!(counter.record_visit(Some("u1")).await.unwrap(), 1);
        assert_eq!(counter.record_visit(Some("u1")).await.unwrap(), 1);
        assert_eq!(counter.record_visit(Some("u2")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_anonymous_never_mutates() {
        let (store, counter) = counter();
        counter.record_visit(Some("u1")).await.unwrap();
        for _ in 0..50 {
            assert_eq!(counter.record_visit(None).await.unwrap(), 1);
        }
        assert_eq!(store.set_len(VISIT_USERS_KEY), 1);
    }

    #[tokio::test]
    async fn test_init_preserves_existing_count() {
        let (_, counter) = counter();
        counter.record_visit(Some("u1")).await.unwrap();
        counter.init().await.unwrap();
        assert_eq!(counter.current().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_store_outage_surfaces_and_leaves_no_partial_state() {
        let (store, counter) = counter();
        store.set_available(false);
        assert!(matches!(
            counter.record_visit(Some("u1")).await,
            Err(AppError::StoreUnavailable(_))
        ));
        assert!(counter.record_visit(None).await.is_err());

        // After recovery the identity was never half-admitted: it still counts.
        store.set_available(true);
        assert_eq!(store.set_len(VISIT_USERS_KEY), 0);
        assert_eq!(counter.record_visit(Some("u1")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_custom_keys_are_isolated() {
        let store = Arc::new(MemoryStore::new());
        let a = VisitCounter::with_keys(store.clone(), "a:users", "a:count");
        let b = VisitCounter::with_keys(store, "b:users", "b:count");
        a.record_visit(Some("u1")).await.unwrap();
        assert_eq!(b.current().await.unwrap(), 0);
        assert_eq!(b.record_visit(Some("u1")).await.unwrap(), 1);
    }
}
