//! Lineup Core - Key Space and Resource Types
//!
//! Pure data structures shared by the cache and the API client: hierarchical
//! cache keys, typed resource payloads, the per-mutation invalidation table
//! and the remote error taxonomy. No I/O lives here.

pub mod config;
pub mod error;
pub mod ids;
pub mod keys;
pub mod mutations;
pub mod resources;

pub use config::{CachePolicy, RetryPolicy, DEFAULT_REQUEST_TIMEOUT, DEFAULT_STALE_TIME};
pub use error::{ApiError, ApiResult, STATUS_UNAUTHORIZED};
pub use ids::{ConversationId, ExerciseId, MatchId, PlanId, PlayerId, TrainingId, UserId};
pub use keys::{CacheKey, KeySegment, QueryKeys, Role};
pub use mutations::{ConversationStarted, InvalidationRule, MutationKind, NoInvalidation, TeamMutation};
pub use resources::*;

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
