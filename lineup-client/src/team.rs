//! Screen-level data hooks.
//!
//! Every read names its cache key and goes through the fetch coordinator;
//! every write names the [`TeamMutation`] whose rule runs once it succeeds.

use lineup_cache::{
    CacheStore, CachedResource, FetchCoordinator, FetchResult, Identity, MutationExecutor,
    SessionBoundary,
};
use lineup_core::{
    AuthSession, CacheKey, CachePolicy, ChatMessage, ChatPrompt, Conversation, ConversationId,
    ConversationStarted, Credentials, Exercise, ExerciseId, MatchDetail, MatchId, MatchInput,
    MatchSummary, NewPlayer, PlanId, PlanInput, PlayerDetail, PlayerId, PlayerStatLine,
    PlayerSummary, ProfileUpdate, QueryKeys, Registration, SeasonStats, TeamMutation, Training,
    TrainingId, TrainingPlan, UserProfile,
};
use serde_json::json;
use std::sync::Arc;

use crate::api::{self, HttpApi, RemoteApi};
use crate::config::ClientConfig;
use crate::error::ClientResult;

#[derive(Clone)]
pub struct TeamClient {
    api: Arc<dyn RemoteApi>,
    fetch: FetchCoordinator,
    mutations: MutationExecutor,
    policy: CachePolicy,
}

impl TeamClient {
    pub fn new(api: Arc<dyn RemoteApi>, session: Arc<SessionBoundary>, policy: CachePolicy) -> Self {
        let fetch = FetchCoordinator::with_policy(Arc::clone(&session), policy.clone());
        let mutations = MutationExecutor::new(session).with_timeout(policy.timeout);
        Self {
            api,
            fetch,
            mutations,
            policy,
        }
    }

    /// HTTP-backed client with a fresh, empty cache.
    pub fn from_config(config: &ClientConfig, identity: Arc<dyn Identity>) -> ClientResult<Self> {
        let api = Arc::new(HttpApi::new(config, Arc::clone(&identity))?);
        let store = Arc::new(CacheStore::new());
        let session = Arc::new(SessionBoundary::new(store, identity));
        Ok(Self::new(api, session, config.cache_policy()))
    }

    pub fn fetch(&self) -> &FetchCoordinator {
        &self.fetch
    }

    pub fn mutations(&self) -> &MutationExecutor {
        &self.mutations
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        self.fetch.store()
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    async fn read<T: CachedResource>(&self, key: CacheKey, path: String) -> FetchResult<T> {
        let api = Arc::clone(&self.api);
        let loader = move || {
            let api = Arc::clone(&api);
            let path = path.clone();
            async move { api::get_json::<T>(api.as_ref(), &path).await }
        };
        self.fetch.read(key, loader, &self.policy).await
    }

    // === Coach reads ===

    pub async fn coach_players(&self) -> FetchResult<Vec<PlayerSummary>> {
        self.read(QueryKeys::coach_players(), "/coach/players".to_string())
            .await
    }

    pub async fn coach_player(&self, player_id: PlayerId) -> FetchResult<PlayerDetail> {
        self.read(
            QueryKeys::coach_player(player_id),
            format!("/coach/players/{}", player_id),
        )
        .await
    }

    pub async fn coach_player_matches(&self, player_id: PlayerId) -> FetchResult<Vec<PlayerStatLine>> {
        self.read(
            QueryKeys::coach_player_matches(player_id),
            format!("/coach/players/{}/matches", player_id),
        )
        .await
    }

    pub async fn coach_matches(&self) -> FetchResult<Vec<MatchSummary>> {
        self.read(QueryKeys::coach_matches(), "/coach/matches".to_string())
            .await
    }

    pub async fn coach_match(&self, match_id: MatchId) -> FetchResult<MatchDetail> {
        self.read(
            QueryKeys::coach_match(match_id),
            format!("/coach/matches/{}", match_id),
        )
        .await
    }

    pub async fn training_plan(&self, plan_id: PlanId) -> FetchResult<TrainingPlan> {
        self.read(
            QueryKeys::coach_plan(plan_id),
            format!("/coach/plans/{}", plan_id),
        )
        .await
    }

    pub async fn coach_stats(&self) -> FetchResult<SeasonStats> {
        self.read(QueryKeys::coach_stats(), "/coach/stats".to_string())
            .await
    }

    // === Player reads ===

    pub async fn player_profile(&self) -> FetchResult<PlayerDetail> {
        self.read(QueryKeys::player_profile(), "/player/profile".to_string())
            .await
    }

    pub async fn player_trainings(&self) -> FetchResult<Vec<Training>> {
        self.read(QueryKeys::player_trainings(), "/player/trainings".to_string())
            .await
    }

    pub async fn player_training(&self, training_id: TrainingId) -> FetchResult<Training> {
        self.read(
            QueryKeys::player_training(training_id),
            format!("/player/trainings/{}", training_id),
        )
        .await
    }

    pub async fn player_matches(&self) -> FetchResult<Vec<MatchSummary>> {
        self.read(QueryKeys::player_matches(), "/player/matches".to_string())
            .await
    }

    pub async fn player_stats(&self) -> FetchResult<SeasonStats> {
        self.read(QueryKeys::player_stats(), "/player/stats".to_string())
            .await
    }

    // === Shared reads ===

    pub async fn conversations(&self) -> FetchResult<Vec<Conversation>> {
        self.read(QueryKeys::chat_conversations(), "/chat/conversations".to_string())
            .await
    }

    pub async fn conversation(&self, conversation_id: ConversationId) -> FetchResult<Conversation> {
        self.read(
            QueryKeys::chat_conversation(conversation_id),
            format!("/chat/conversations/{}", conversation_id),
        )
        .await
    }

    pub async fn me(&self) -> FetchResult<UserProfile> {
        self.read(QueryKeys::me(), "/me".to_string()).await
    }

    // === Coach writes ===

    pub async fn create_plan(&self, input: &PlanInput) -> FetchResult<TrainingPlan> {
        let rule = TeamMutation::CreatePlan {
            player_id: input.player_id,
        };
        self.mutations
            .execute(&rule, || api::post_json(self.api.as_ref(), "/coach/plans", input))
            .await
    }

    pub async fn update_plan(&self, plan_id: PlanId, input: &PlanInput) -> FetchResult<TrainingPlan> {
        let rule = TeamMutation::UpdatePlan {
            plan_id,
            player_id: input.player_id,
        };
        let path = format!("/coach/plans/{}", plan_id);
        self.mutations
            .execute(&rule, || api::put_json(self.api.as_ref(), &path, input))
            .await
    }

    pub async fn delete_plan(&self, plan_id: PlanId) -> FetchResult<()> {
        let path = format!("/coach/plans/{}", plan_id);
        self.mutations
            .execute(&TeamMutation::DeletePlan { plan_id }, || {
                api::delete(self.api.as_ref(), &path)
            })
            .await
    }

    pub async fn create_match(&self, input: &MatchInput) -> FetchResult<MatchSummary> {
        self.mutations
            .execute(&TeamMutation::CreateMatch, || {
                api::post_json(self.api.as_ref(), "/coach/matches", input)
            })
            .await
    }

    pub async fn update_match(&self, match_id: MatchId, input: &MatchInput) -> FetchResult<MatchSummary> {
        let path = format!("/coach/matches/{}", match_id);
        self.mutations
            .execute(&TeamMutation::UpdateMatch { match_id }, || {
                api::put_json(self.api.as_ref(), &path, input)
            })
            .await
    }

    pub async fn delete_match(&self, match_id: MatchId) -> FetchResult<()> {
        let path = format!("/coach/matches/{}", match_id);
        self.mutations
            .execute(&TeamMutation::DeleteMatch { match_id }, || {
                api::delete(self.api.as_ref(), &path)
            })
            .await
    }

    pub async fn record_player_stats(&self, line: &PlayerStatLine) -> FetchResult<PlayerStatLine> {
        let rule = TeamMutation::RecordPlayerStats {
            match_id: line.match_id,
            player_id: line.player_id,
        };
        let path = format!("/coach/matches/{}/stats", line.match_id);
        self.mutations
            .execute(&rule, || api::post_json(self.api.as_ref(), &path, line))
            .await
    }

    pub async fn add_player(&self, player: &NewPlayer) -> FetchResult<PlayerSummary> {
        self.mutations
            .execute(&TeamMutation::AddPlayer, || {
                api::post_json(self.api.as_ref(), "/coach/players", player)
            })
            .await
    }

    pub async fn remove_player(&self, player_id: PlayerId) -> FetchResult<()> {
        let path = format!("/coach/players/{}", player_id);
        self.mutations
            .execute(&TeamMutation::RemovePlayer { player_id }, || {
                api::delete(self.api.as_ref(), &path)
            })
            .await
    }

    // === Player writes ===

    pub async fn toggle_exercise(
        &self,
        training_id: TrainingId,
        exercise_id: ExerciseId,
        completed: bool,
    ) -> FetchResult<Exercise> {
        let rule = TeamMutation::ToggleExercise {
            training_id,
            exercise_id,
        };
        let path = format!("/player/trainings/{}/exercises/{}", training_id, exercise_id);
        let body = json!({ "completed": completed });
        self.mutations
            .execute(&rule, || api::patch_json(self.api.as_ref(), &path, &body))
            .await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> FetchResult<UserProfile> {
        self.mutations
            .execute(&TeamMutation::UpdateProfile, || {
                api::patch_json(self.api.as_ref(), "/me", update)
            })
            .await
    }

    // === Chat ===

    pub async fn start_conversation(&self, prompt: &ChatPrompt) -> FetchResult<Conversation> {
        let conversation = self
            .mutations
            .mutate(&ConversationStarted, || {
                api::post_json(self.api.as_ref(), "/chat/conversations", prompt)
            })
            .await?;
        tracing::info!(conversation_id = %conversation.id, "Conversation started");
        Ok(conversation)
    }

    pub async fn send_chat_message(
        &self,
        conversation_id: ConversationId,
        prompt: &ChatPrompt,
    ) -> FetchResult<ChatMessage> {
        let path = format!("/chat/conversations/{}/messages", conversation_id);
        self.mutations
            .execute(&TeamMutation::SendChatMessage { conversation_id }, || {
                api::post_json(self.api.as_ref(), &path, prompt)
            })
            .await
    }

    // === Account ===

    /// Sign in. The cache is cleared before the new credential is stored, and
    /// the returned profile is seeded under `me`.
    pub async fn login(&self, credentials: &Credentials) -> FetchResult<AuthSession> {
        let auth = self
            .mutations
            .authenticate(|| api::post_json(self.api.as_ref(), "/auth/login", credentials))
            .await?;
        self.fetch.set_query_data(QueryKeys::me(), &auth.user)?;
        Ok(auth)
    }

    pub async fn register(&self, registration: &Registration) -> FetchResult<AuthSession> {
        let auth = self
            .mutations
            .authenticate(|| api::post_json(self.api.as_ref(), "/auth/register", registration))
            .await?;
        self.fetch.set_query_data(QueryKeys::me(), &auth.user)?;
        Ok(auth)
    }

    pub fn logout(&self) {
        self.mutations.logout();
    }
}
