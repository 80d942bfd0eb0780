//! Local Session Cache: last-known principal and coarse completion flags.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cargolane_auth::Principal;
use cargolane_core::UserId;

use crate::store::{KeyValueStore, StoreError};

/// Key under which the snapshot is stored.
pub const SESSION_KEY: &str = "cargolane.session";

/// The single record held by the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub principal: Principal,
    pub email_verified: bool,
    pub onboarding_completed: bool,
    pub cached_at: DateTime<Utc>,
}

impl SessionSnapshot {
    fn from_principal(principal: &Principal) -> Self {
        Self {
            principal: principal.clone(),
            email_verified: principal.is_email_verified,
            onboarding_completed: principal.onboarding_completed,
            cached_at: Utc::now(),
        }
    }

    pub fn is_fully_onboarded(&self) -> bool {
        self.email_verified && self.onboarding_completed
    }
}

/// Process-wide session cache over a persisted [`KeyValueStore`].
///
/// Reads never fail: a missing, unreadable or corrupt entry is `None`.
/// Writes are best-effort and logged; a failed write never blocks a decision.
#[derive(Clone)]
pub struct LocalSessionCache {
    store: Arc<dyn KeyValueStore>,
}

impl core::fmt::Debug for LocalSessionCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LocalSessionCache").finish_non_exhaustive()
    }
}

impl LocalSessionCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The cached snapshot, whoever it belongs to.
    pub async fn load(&self) -> Option<SessionSnapshot> {
        let raw = match self.store.get(SESSION_KEY).await {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read session cache");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                tracing::warn!(error = %err, "discarding corrupt session cache entry");
                None
            }
        }
    }

    /// The cached snapshot only if it belongs to `principal_id`.
    pub async fn snapshot_for(&self, principal_id: UserId) -> Option<SessionSnapshot> {
        self.load()
            .await
            .filter(|snapshot| snapshot.principal.id == principal_id)
    }

    /// Cache the principal as just fetched from the backend.
    pub async fn remember_principal(&self, principal: &Principal) {
        self.write(&SessionSnapshot::from_principal(principal)).await;
    }

    /// Record the outcome of a fresh email-verification check.
    pub async fn record_email_verified(&self, principal: &Principal, verified: bool) {
        let mut snapshot = self.base_for(principal).await;
        snapshot.email_verified = verified;
        snapshot.principal.is_email_verified = verified;
        self.write(&snapshot).await;
    }

    /// Record whether the step resolver found onboarding complete.
    pub async fn record_onboarding(&self, principal: &Principal, completed: bool) {
        let mut snapshot = self.base_for(principal).await;
        snapshot.onboarding_completed = completed;
        snapshot.principal.onboarding_completed = completed;
        self.write(&snapshot).await;
    }

    /// Drop the cached session (logout).
    pub async fn clear(&self) {
        if let Err(err) = self.store.remove(SESSION_KEY).await {
            tracing::error!(error = %err, "failed to clear session cache");
        } else {
            tracing::info!("session cache cleared");
        }
    }

    async fn base_for(&self, principal: &Principal) -> SessionSnapshot {
        match self.snapshot_for(principal.id).await {
            Some(mut existing) => {
                existing.principal.role = principal.role;
                existing.principal.organization_id = principal.organization_id;
                existing
            }
            None => SessionSnapshot::from_principal(principal),
        }
    }

    async fn write(&self, snapshot: &SessionSnapshot) {
        let mut snapshot = snapshot.clone();
        snapshot.cached_at = Utc::now();

        let result = serde_json::to_string(&snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()));
        let result = match result {
            Ok(payload) => self.store.set(SESSION_KEY, &payload).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => tracing::info!(
                principal_id = %snapshot.principal.id,
                email_verified = snapshot.email_verified,
                onboarding_completed = snapshot.onboarding_completed,
                "session cache updated"
            ),
            Err(err) => tracing::error!(error = %err, "failed to write session cache"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use cargolane_auth::Role;

    fn cache_over(store: &MemoryStore) -> LocalSessionCache {
        LocalSessionCache::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn empty_cache_reads_as_none() {
        let cache = cache_over(&MemoryStore::new());
        assert_eq!(cache.load().await, None);
    }

    #[tokio::test]
    async fn snapshot_survives_a_reload() {
        let store = MemoryStore::new();
        let principal = Principal::new(UserId::new(), Role::Customer).with_email_verified(true);

        cache_over(&store).remember_principal(&principal).await;

        let reloaded = cache_over(&store).snapshot_for(principal.id).await.unwrap();
        assert_eq!(reloaded.principal, principal);
        assert!(reloaded.email_verified);
        assert!(!reloaded.onboarding_completed);
    }

    #[tokio::test]
    async fn snapshot_for_other_principal_is_ignored() {
        let store = MemoryStore::new();
        let cache = cache_over(&store);
        cache
            .remember_principal(&Principal::new(UserId::new(), Role::OrgAdmin))
            .await;

        assert_eq!(cache.snapshot_for(UserId::new()).await, None);
    }

    #[tokio::test]
    async fn flags_are_recorded_independently() {
        let cache = cache_over(&MemoryStore::new());
        let principal = Principal::new(UserId::new(), Role::OrgAdmin);

        cache.record_email_verified(&principal, true).await;
        cache.record_onboarding(&principal, true).await;

        let snapshot = cache.snapshot_for(principal.id).await.unwrap();
        assert!(snapshot.is_fully_onboarded());
        assert!(snapshot.principal.is_fully_onboarded());
    }

    #[tokio::test]
    async fn corrupt_entry_is_treated_as_missing() {
        let store = MemoryStore::new();
        store.set(SESSION_KEY, "{not json").await.unwrap();

        assert_eq!(cache_over(&store).load().await, None);
    }

    #[tokio::test]
    async fn clear_removes_the_snapshot() {
        let store = MemoryStore::new();
        let cache = cache_over(&store);
        let principal = Principal::new(UserId::new(), Role::OrgStaff);
        cache.remember_principal(&principal).await;

        cache.clear().await;

        assert_eq!(cache.load().await, None);
        assert_eq!(store.get(SESSION_KEY).await.unwrap(), None);
    }
}
