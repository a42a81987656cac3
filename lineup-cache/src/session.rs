//! Session boundary: the cache is emptied whenever the identity changes.
//!
//! Ordering matters. The cache is cleared first and the identity updated
//! second, so nothing cached under the previous identity can be read once
//! the new credential is in place.

use std::sync::Arc;

use crate::identity::{Credential, Identity};
use crate::store::CacheStore;

pub struct SessionBoundary {
    store: Arc<CacheStore>,
    identity: Arc<dyn Identity>,
}

impl SessionBoundary {
    pub fn new(store: Arc<CacheStore>, identity: Arc<dyn Identity>) -> Self {
        Self { store, identity }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn identity(&self) -> &Arc<dyn Identity> {
        &self.identity
    }

    /// Clear the whole cache. Loads still running are dropped on completion.
    pub fn on_session_change(&self) {
        let dropped = self.store.len();
        self.store.clear();
        tracing::info!(
            dropped_entries = dropped,
            epoch = self.store.epoch(),
            "Session changed, cache cleared"
        );
    }

    /// Login or registration succeeded.
    pub fn begin_session(&self, credential: Credential) {
        self.on_session_change();
        self.identity.login(credential);
    }

    pub fn end_session(&self) {
        self.on_session_change();
        self.identity.logout();
    }

    /// The server rejected the credential (HTTP 401).
    pub fn on_auth_rejected(&self) {
        tracing::warn!("Credential rejected by server, signing out");
        self.end_session();
    }
}
