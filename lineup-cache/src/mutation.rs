//! Mutation executor: remote writes followed by declared invalidation.
//!
//! Invalidation is all-or-nothing. A failed write marks nothing stale, and a
//! successful one has applied every target of its rule by the time
//! [`MutationExecutor::mutate`] returns.

use lineup_core::{ApiResult, AuthSession, InvalidationRule, TeamMutation, DEFAULT_REQUEST_TIMEOUT};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{FetchError, FetchResult};
use crate::fetch::with_timeout;
use crate::identity::Credential;
use crate::session::SessionBoundary;
use crate::store::CacheStore;

#[derive(Clone)]
pub struct MutationExecutor {
    store: Arc<CacheStore>,
    session: Arc<SessionBoundary>,
    timeout: Duration,
}

impl MutationExecutor {
    pub fn new(session: Arc<SessionBoundary>) -> Self {
        Self {
            store: Arc::clone(session.store()),
            session,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `writer`, then mark stale every prefix `rule` derives from its result.
    ///
    /// Writers are never retried. Errors come back unmodified; a 401 signs
    /// the session out first.
    pub async fn mutate<R, Rule, W, Fut>(&self, rule: &Rule, writer: W) -> FetchResult<R>
    where
        Rule: InvalidationRule<R> + ?Sized,
        W: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<R>>,
    {
        let result = self.write(writer).await?;
        let targets = rule.targets(&result);
        let affected: usize = targets
            .iter()
            .map(|prefix| self.store.mark_stale(prefix))
            .sum();
        tracing::debug!(
            prefixes = targets.len(),
            affected_entries = affected,
            "Applied invalidation"
        );
        Ok(result)
    }

    /// [`mutate`](Self::mutate) for one of the app's declared team mutations.
    pub async fn execute<R, W, Fut>(&self, mutation: &TeamMutation, writer: W) -> FetchResult<R>
    where
        W: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<R>>,
    {
        let kind = mutation.kind();
        match self.mutate(mutation, writer).await {
            Ok(result) => {
                tracing::info!(mutation = %kind, "Mutation succeeded");
                Ok(result)
            }
            Err(err) => {
                tracing::warn!(mutation = %kind, error = %err, "Mutation failed");
                Err(err)
            }
        }
    }

    /// Login or registration. On success the cache is cleared and only then
    /// is the new credential handed to the identity collaborator.
    pub async fn authenticate<W, Fut>(&self, writer: W) -> FetchResult<AuthSession>
    where
        W: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<AuthSession>>,
    {
        let auth = self.write(writer).await?;
        self.session
            .begin_session(Credential::new(auth.token.clone()));
        tracing::info!(user_id = %auth.user.id, role = auth.user.role.as_str(), "Signed in");
        Ok(auth)
    }

    pub fn logout(&self) {
        self.session.end_session();
    }

    async fn write<R, W, Fut>(&self, writer: W) -> FetchResult<R>
    where
        W: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<R>>,
    {
        let epoch = self.store.epoch();
        match with_timeout(self.timeout, writer()).await {
            Ok(result) => Ok(result),
            Err(err) => {
                if err.is_unauthorized() && self.store.epoch() == epoch {
                    self.session.on_auth_rejected();
                }
                Err(FetchError::Api(err))
            }
        }
    }
}
