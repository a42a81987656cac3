//! Declared invalidation rules for every write the client performs.
//!
//! A successful write marks one or more key prefixes stale. The mapping is
//! spelled out per mutation in [`TeamMutation::invalidates`] rather than
//! inferred from the request path.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{ConversationId, ExerciseId, MatchId, PlanId, PlayerId, TrainingId};
use crate::keys::{CacheKey, QueryKeys};
use crate::resources::Conversation;

/// Maps a successful write to the key prefixes it makes stale.
///
/// The mutation's input arguments live in the implementing value; the
/// write's result is passed in so rules can key off server-assigned data.
pub trait InvalidationRule<R> {
    fn targets(&self, result: &R) -> Vec<CacheKey>;
}

impl<R, F> InvalidationRule<R> for F
where
    F: Fn(&R) -> Vec<CacheKey>,
{
    fn targets(&self, result: &R) -> Vec<CacheKey> {
        self(result)
    }
}

/// Rule for writes that touch nothing cached, such as logout.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInvalidation;

impl<R> InvalidationRule<R> for NoInvalidation {
    fn targets(&self, _result: &R) -> Vec<CacheKey> {
        Vec::new()
    }
}

// ============================================================================
// TEAM MUTATIONS
// ============================================================================

/// Every write issued by the app, carrying the arguments its rule needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TeamMutation {
    CreatePlan {
        player_id: PlayerId,
    },
    UpdatePlan {
        plan_id: PlanId,
        player_id: PlayerId,
    },
    DeletePlan {
        plan_id: PlanId,
    },
    ToggleExercise {
        training_id: TrainingId,
        exercise_id: ExerciseId,
    },
    CreateMatch,
    UpdateMatch {
        match_id: MatchId,
    },
    DeleteMatch {
        match_id: MatchId,
    },
    RecordPlayerStats {
        match_id: MatchId,
        player_id: PlayerId,
    },
    AddPlayer,
    RemovePlayer {
        player_id: PlayerId,
    },
    UpdateProfile,
    StartConversation,
    SendChatMessage {
        conversation_id: ConversationId,
    },
}

impl TeamMutation {
    /// Key prefixes marked stale once this write succeeds.
    pub fn invalidates(&self) -> Vec<CacheKey> {
        match self {
            Self::CreatePlan { player_id } => vec![QueryKeys::coach_player(*player_id)],
            Self::UpdatePlan { plan_id, player_id } => vec![
                QueryKeys::coach_plan(*plan_id),
                QueryKeys::coach_player(*player_id),
            ],
            // The owning player is unknown once the plan is gone.
            Self::DeletePlan { .. } => vec![QueryKeys::coach()],
            Self::ToggleExercise { training_id, .. } => vec![
                QueryKeys::player_training(*training_id),
                QueryKeys::player_trainings(),
            ],
            Self::CreateMatch => vec![QueryKeys::coach_matches()],
            Self::UpdateMatch { match_id } => vec![
                QueryKeys::coach_match(*match_id),
                QueryKeys::coach_matches(),
            ],
            Self::DeleteMatch { match_id } => vec![
                QueryKeys::coach_matches(),
                QueryKeys::coach_match(*match_id),
                QueryKeys::coach_stats(),
            ],
            Self::RecordPlayerStats {
                match_id,
                player_id,
            } => vec![
                QueryKeys::coach_match(*match_id),
                QueryKeys::coach_player(*player_id),
                QueryKeys::coach_stats(),
            ],
            Self::AddPlayer => vec![QueryKeys::coach_players()],
            Self::RemovePlayer { player_id } => vec![
                QueryKeys::coach_players(),
                QueryKeys::coach_player(*player_id),
            ],
            Self::UpdateProfile => vec![QueryKeys::me(), QueryKeys::player_profile()],
            Self::StartConversation => vec![QueryKeys::chat_conversations()],
            Self::SendChatMessage { conversation_id } => vec![
                QueryKeys::chat_conversation(*conversation_id),
                QueryKeys::chat_conversations(),
            ],
        }
    }

    pub fn kind(&self) -> MutationKind {
        match self {
            Self::CreatePlan { .. } => MutationKind::CreatePlan,
            Self::UpdatePlan { .. } => MutationKind::UpdatePlan,
            Self::DeletePlan { .. } => MutationKind::DeletePlan,
            Self::ToggleExercise { .. } => MutationKind::ToggleExercise,
            Self::CreateMatch => MutationKind::CreateMatch,
            Self::UpdateMatch { .. } => MutationKind::UpdateMatch,
            Self::DeleteMatch { .. } => MutationKind::DeleteMatch,
            Self::RecordPlayerStats { .. } => MutationKind::RecordPlayerStats,
            Self::AddPlayer => MutationKind::AddPlayer,
            Self::RemovePlayer { .. } => MutationKind::RemovePlayer,
            Self::UpdateProfile => MutationKind::UpdateProfile,
            Self::StartConversation => MutationKind::StartConversation,
            Self::SendChatMessage { .. } => MutationKind::SendChatMessage,
        }
    }
}

impl<R> InvalidationRule<R> for TeamMutation {
    fn targets(&self, _result: &R) -> Vec<CacheKey> {
        self.invalidates()
    }
}

/// Rule for starting a conversation.
///
/// Covers the [`TeamMutation::StartConversation`] targets plus the new
/// conversation's own key, which only the server's answer reveals.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversationStarted;

impl InvalidationRule<Conversation> for ConversationStarted {
    fn targets(&self, created: &Conversation) -> Vec<CacheKey> {
        let mut targets = TeamMutation::StartConversation.invalidates();
        targets.push(QueryKeys::chat_conversation(created.id));
        targets
    }
}

/// Fieldless discriminant of [`TeamMutation`], used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    CreatePlan,
    UpdatePlan,
    DeletePlan,
    ToggleExercise,
    CreateMatch,
    UpdateMatch,
    DeleteMatch,
    RecordPlayerStats,
    AddPlayer,
    RemovePlayer,
    UpdateProfile,
    StartConversation,
    SendChatMessage,
}

impl MutationKind {
    pub const ALL: [MutationKind; 13] = [
        Self::CreatePlan,
        Self::UpdatePlan,
        Self::DeletePlan,
        Self::ToggleExercise,
        Self::CreateMatch,
        Self::UpdateMatch,
        Self::DeleteMatch,
        Self::RecordPlayerStats,
        Self::AddPlayer,
        Self::RemovePlayer,
        Self::UpdateProfile,
        Self::StartConversation,
        Self::SendChatMessage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatePlan => "create_plan",
            Self::UpdatePlan => "update_plan",
            Self::DeletePlan => "delete_plan",
            Self::ToggleExercise => "toggle_exercise",
            Self::CreateMatch => "create_match",
            Self::UpdateMatch => "update_match",
            Self::DeleteMatch => "delete_match",
            Self::RecordPlayerStats => "record_player_stats",
            Self::AddPlayer => "add_player",
            Self::RemovePlayer => "remove_player",
            Self::UpdateProfile => "update_profile",
            Self::StartConversation => "start_conversation",
            Self::SendChatMessage => "send_chat_message",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
