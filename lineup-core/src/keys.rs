//! Hierarchical cache keys.
//!
//! A [`CacheKey`] is an ordered path of segments. A key that is a segment-wise
//! prefix of another key names an ancestor scope, so invalidating
//! `coach/players` reaches `coach/players/42` and everything below it.
//!
//! [`QueryKeys`] is the single place where the app names its resources.
//! Passing the same parameters always yields structurally equal keys.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{ConversationId, MatchId, PlanId, PlayerId, TrainingId};

/// One segment of a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeySegment {
    Num(i64),
    Str(String),
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{}", n),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for KeySegment {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for KeySegment {
    fn from(n: i64) -> Self {
        Self::Num(n)
    }
}

impl From<u32> for KeySegment {
    fn from(n: u32) -> Self {
        Self::Num(i64::from(n))
    }
}

/// Canonical identifier for a cached resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey {
    segments: Vec<KeySegment>,
}

impl CacheKey {
    /// Build a key from any sequence of segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<KeySegment>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// A single-segment key, usually a top-level role scope.
    pub fn root(segment: impl Into<KeySegment>) -> Self {
        Self {
            segments: vec![segment.into()],
        }
    }

    /// Extend this key by one segment.
    pub fn child(&self, segment: impl Into<KeySegment>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segment-wise prefix test.
    ///
    /// `["coach", "pl"]` is not a prefix of `["coach", "player"]`: segments
    /// compare whole, never as substrings. Every key starts with itself.
    pub fn starts_with(&self, prefix: &CacheKey) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// True if `other` lives strictly below this key.
    pub fn is_ancestor_of(&self, other: &CacheKey) -> bool {
        other.segments.len() > self.segments.len() && other.starts_with(self)
    }

    /// The enclosing scope, or `None` for an empty or top-level key.
    pub fn parent(&self) -> Option<CacheKey> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

// ============================================================================
// ROLES
// ============================================================================

/// The two authenticated audiences of the app. Each owns a top-level scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Coach,
    Player,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coach => "coach",
            Self::Player => "player",
        }
    }

    /// Top-level key under which all of this role's resources are cached.
    pub fn scope_key(&self) -> CacheKey {
        CacheKey::root(self.as_str())
    }
}

// ============================================================================
// KEY SPACE
// ============================================================================

/// Constructors for every resource the client reads.
pub struct QueryKeys;

impl QueryKeys {
    // === Coach ===

    pub fn coach() -> CacheKey {
        Role::Coach.scope_key()
    }

    pub fn coach_players() -> CacheKey {
        Self::coach().child("players")
    }

    pub fn coach_player(player_id: PlayerId) -> CacheKey {
        Self::coach_players().child(player_id)
    }

    pub fn coach_player_matches(player_id: PlayerId) -> CacheKey {
        Self::coach_player(player_id).child("matches")
    }

    pub fn coach_player_match(player_id: PlayerId, match_id: MatchId) -> CacheKey {
        Self::coach_player_matches(player_id).child(match_id)
    }

    pub fn coach_matches() -> CacheKey {
        Self::coach().child("matches")
    }

    pub fn coach_match(match_id: MatchId) -> CacheKey {
        Self::coach_matches().child(match_id)
    }

    pub fn coach_plans() -> CacheKey {
        Self::coach().child("plans")
    }

    pub fn coach_plan(plan_id: PlanId) -> CacheKey {
        Self::coach_plans().child(plan_id)
    }

    pub fn coach_stats() -> CacheKey {
        Self::coach().child("stats")
    }

    // === Player ===

    pub fn player() -> CacheKey {
        Role::Player.scope_key()
    }

    pub fn player_profile() -> CacheKey {
        Self::player().child("profile")
    }

    pub fn player_trainings() -> CacheKey {
        Self::player().child("trainings")
    }

    pub fn player_training(training_id: TrainingId) -> CacheKey {
        Self::player_trainings().child(training_id)
    }

    pub fn player_matches() -> CacheKey {
        Self::player().child("matches")
    }

    pub fn player_match(match_id: MatchId) -> CacheKey {
        Self::player_matches().child(match_id)
    }

    pub fn player_stats() -> CacheKey {
        Self::player().child("stats")
    }

    // === Chat assistant ===

    pub fn chat() -> CacheKey {
        CacheKey::root("chat")
    }

    pub fn chat_conversations() -> CacheKey {
        Self::chat().child("conversations")
    }

    pub fn chat_conversation(conversation_id: ConversationId) -> CacheKey {
        Self::chat_conversations().child(conversation_id)
    }

    // === Account ===

    /// Profile of whoever is currently signed in.
    pub fn me() -> CacheKey {
        CacheKey::root("me")
    }
}
