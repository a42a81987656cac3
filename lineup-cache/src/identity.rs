//! Identity collaborator: holds the credential attached to outgoing requests.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Opaque bearer credential.
///
/// Wrapped in `secrecy` so it never shows up in logs or `Debug` output.
#[derive(Clone)]
pub struct Credential(SecretString);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::new(token.into().into()))
    }

    /// Expose the token (only for building the Authorization header).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential([REDACTED, {} chars])", self.expose().len())
    }
}

/// Source of the current credential.
///
/// Implementations only touch local state: none of these calls can fail.
pub trait Identity: Send + Sync {
    fn credential(&self) -> Option<Credential>;

    fn login(&self, credential: Credential);

    fn logout(&self);

    fn is_authenticated(&self) -> bool {
        self.credential().is_some()
    }
}

/// Process-local identity store.
#[derive(Default)]
pub struct InMemoryIdentity {
    credential: RwLock<Option<Credential>>,
    logouts: AtomicU64,
}

impl InMemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: RwLock::new(Some(credential)),
            logouts: AtomicU64::new(0),
        }
    }

    /// How many times `logout` has been called.
    pub fn logout_count(&self) -> u64 {
        self.logouts.load(Ordering::SeqCst)
    }
}

impl Identity for InMemoryIdentity {
    fn credential(&self) -> Option<Credential> {
        self.credential
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn login(&self, credential: Credential) {
        *self.credential.write().unwrap_or_else(|e| e.into_inner()) = Some(credential);
    }

    fn logout(&self) {
        *self.credential.write().unwrap_or_else(|e| e.into_inner()) = None;
        self.logouts.fetch_add(1, Ordering::SeqCst);
    }
}
