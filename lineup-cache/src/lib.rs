//! Lineup Cache - Client-Side Resource Cache
//!
//! Read-through cache for remote API resources with single-flight loads per
//! key, declarative invalidation after writes and a full clear whenever the
//! signed-in identity changes.
//!
//! # Wiring
//!
//! ```ignore
//! let store = Arc::new(CacheStore::new());
//! let session = Arc::new(SessionBoundary::new(store, identity));
//! let fetch = FetchCoordinator::new(session.clone());
//! let mutations = MutationExecutor::new(session);
//!
//! let players: Vec<PlayerSummary> = fetch
//!     .read_default(QueryKeys::coach_players(), move || api.coach_players())
//!     .await?;
//!
//! mutations
//!     .execute(&TeamMutation::CreatePlan { player_id }, || api.create_plan(&input))
//!     .await?;
//! ```

pub mod clock;
pub mod entry;
pub mod error;
pub mod fetch;
pub mod identity;
pub mod mutation;
pub mod session;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, CacheRead, EntryState};
pub use error::{FetchError, FetchResult};
pub use fetch::{CachedResource, FetchCoordinator};
pub use identity::{Credential, Identity, InMemoryIdentity};
pub use mutation::MutationExecutor;
pub use session::SessionBoundary;
pub use store::{CacheStats, CacheStore};
