//! Lineup Test Utilities
//!
//! Shared test infrastructure for the Lineup workspace:
//! - Scripted loaders and a mock remote API
//! - A wired cache harness on a manual clock
//! - Proptest generators for keys, IDs and mutations
//! - Fixtures for common resources

pub use lineup_cache::{
    CacheStore, EntryState, FetchCoordinator, FetchError, FetchResult, InMemoryIdentity,
    ManualClock, MutationExecutor, SessionBoundary,
};
pub use lineup_core::{ApiError, ApiResult, CacheKey, CachePolicy, QueryKeys, RetryPolicy};

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use lineup_cache::Credential;
use lineup_client::{HttpMethod, RemoteApi};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// SCRIPTED LOADERS
// ============================================================================

/// Holds scripted calls until opened.
#[derive(Debug)]
pub struct Gate {
    open: watch::Sender<bool>,
}

impl Gate {
    pub fn open(&self) {
        self.open.send_replace(true);
    }
}

/// Loader or writer whose results are scripted up front.
///
/// Results are handed out in order; the last one repeats once the script
/// runs out. Every invocation is counted.
pub struct ScriptedLoader<T> {
    script: Arc<Script<T>>,
}

struct Script<T> {
    responses: Mutex<VecDeque<ApiResult<T>>>,
    calls: AtomicUsize,
    delay: Mutex<Duration>,
    gate: Mutex<Option<watch::Receiver<bool>>>,
}

impl<T> Clone for ScriptedLoader<T> {
    fn clone(&self) -> Self {
        Self {
            script: Arc::clone(&self.script),
        }
    }
}

impl<T: Clone + Send + 'static> ScriptedLoader<T> {
    pub fn sequence(responses: Vec<ApiResult<T>>) -> Self {
        Self {
            script: Arc::new(Script {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
                delay: Mutex::new(Duration::ZERO),
                gate: Mutex::new(None),
            }),
        }
    }

    /// Always succeeds with `value`.
    pub fn ok(value: T) -> Self {
        Self::sequence(vec![Ok(value)])
    }

    /// Always fails with `err`.
    pub fn failing(err: ApiError) -> Self {
        Self::sequence(vec![Err(err)])
    }

    /// Sleep this long (tokio time) before answering.
    pub fn with_delay(self, delay: Duration) -> Self {
        *lock(&self.script.delay) = delay;
        self
    }

    /// Hold every call until the returned gate is opened.
    pub fn gate(&self) -> Gate {
        let (open, waiting) = watch::channel(false);
        *lock(&self.script.gate) = Some(waiting);
        Gate { open }
    }

    /// Queue another result behind the current script.
    pub fn push(&self, result: ApiResult<T>) {
        lock(&self.script.responses).push_back(result);
    }

    pub fn calls(&self) -> usize {
        self.script.calls.load(Ordering::SeqCst)
    }

    /// One scripted call.
    pub fn call(&self) -> BoxFuture<'static, ApiResult<T>> {
        let script = Arc::clone(&self.script);
        script.calls.fetch_add(1, Ordering::SeqCst);
        async move {
            let delay = *lock(&script.delay);
            let gate = lock(&script.gate).clone();
            if let Some(mut gate) = gate {
                // A dropped gate counts as open.
                let _ = gate.wait_for(|open| *open).await;
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            script.next_response()
        }
        .boxed()
    }

    /// Closure for [`FetchCoordinator::read`].
    pub fn loader(&self) -> impl FnMut() -> BoxFuture<'static, ApiResult<T>> + Send + 'static {
        let this = self.clone();
        move || this.call()
    }
}

impl<T: Clone> Script<T> {
    fn next_response(&self) -> ApiResult<T> {
        let mut responses = lock(&self.responses);
        if responses.len() > 1 {
            if let Some(next) = responses.pop_front() {
                return next;
            }
        }
        responses
            .front()
            .cloned()
            .unwrap_or_else(|| Err(ApiError::transport("script exhausted")))
    }
}

// ============================================================================
// MOCK REMOTE API
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
}

/// In-process [`RemoteApi`] answering from per-route scripts.
///
/// Routes behave like [`ScriptedLoader`]: queued answers in order, the last
/// one repeating. Unrouted requests get a 404.
#[derive(Default)]
pub struct MockRemoteApi {
    routes: Mutex<HashMap<(HttpMethod, String), VecDeque<ApiResult<Value>>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    delay: Mutex<Duration>,
}

impl MockRemoteApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: HttpMethod, path: &str, result: ApiResult<Value>) -> &Self {
        lock(&self.routes)
            .entry((method, path.to_string()))
            .or_default()
            .push_back(result);
        self
    }

    pub fn on_get(&self, path: &str, value: Value) -> &Self {
        self.respond(HttpMethod::Get, path, Ok(value))
    }

    pub fn on_post(&self, path: &str, value: Value) -> &Self {
        self.respond(HttpMethod::Post, path, Ok(value))
    }

    /// Drop whatever a route had scripted and answer with `result` from now on.
    pub fn replace(&self, method: HttpMethod, path: &str, result: ApiResult<Value>) -> &Self {
        lock(&self.routes).insert((method, path.to_string()), VecDeque::from([result]));
        self
    }

    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = delay;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// How many times `method path` has been requested.
    pub fn count(&self, method: HttpMethod, path: &str) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    fn answer(&self, method: HttpMethod, path: &str) -> ApiResult<Value> {
        let mut routes = lock(&self.routes);
        let Some(queue) = routes.get_mut(&(method, path.to_string())) else {
            return Err(ApiError::status(404, r#"{"message":"no route"}"#));
        };
        if queue.len() > 1 {
            if let Some(next) = queue.pop_front() {
                return next;
            }
        }
        queue
            .front()
            .cloned()
            .unwrap_or_else(|| Err(ApiError::status(404, r#"{"message":"no route"}"#)))
    }
}

#[async_trait]
impl RemoteApi for MockRemoteApi {
    async fn request(&self, method: HttpMethod, path: &str, body: Option<Value>) -> ApiResult<Value> {
        lock(&self.requests).push(RecordedRequest {
            method,
            path: path.to_string(),
            body,
        });
        let delay = *lock(&self.delay);
        let answer = self.answer(method, path);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        answer
    }
}

// ============================================================================
// CACHE HARNESS
// ============================================================================

/// Store, session and both executors wired on a manual clock, signed in.
pub struct CacheHarness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<CacheStore>,
    pub identity: Arc<InMemoryIdentity>,
    pub session: Arc<SessionBoundary>,
    pub fetch: FetchCoordinator,
    pub mutations: MutationExecutor,
}

impl CacheHarness {
    pub fn new() -> Self {
        Self::with_policy(CachePolicy::default())
    }

    pub fn with_policy(policy: CachePolicy) -> Self {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(CacheStore::with_clock(clock.clone()));
        let identity = Arc::new(InMemoryIdentity::with_credential(Credential::new(
            fixtures::TEST_TOKEN,
        )));
        let session = Arc::new(SessionBoundary::new(store.clone(), identity.clone()));
        let fetch = FetchCoordinator::with_policy(session.clone(), policy.clone());
        let mutations = MutationExecutor::new(session.clone()).with_timeout(policy.timeout);
        Self {
            clock,
            store,
            identity,
            session,
            fetch,
            mutations,
        }
    }

    pub fn state(&self, key: &CacheKey) -> Option<EntryState> {
        self.store.get(key).map(|entry| entry.state)
    }
}

impl Default for CacheHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for keys, IDs and mutations.

    use lineup_core::{
        ConversationId, ExerciseId, KeySegment, MatchId, PlanId, PlayerId, PlayerSummary,
        TeamMutation, TrainingId,
    };
    use lineup_core::CacheKey;
    use proptest::prelude::*;

    // === Key Generators ===

    pub fn arb_key_segment() -> impl Strategy<Value = KeySegment> {
        prop_oneof![
            (0i64..10_000).prop_map(KeySegment::Num),
            "[a-z]{1,8}".prop_map(KeySegment::Str),
        ]
    }

    pub fn arb_cache_key() -> impl Strategy<Value = CacheKey> {
        prop::collection::vec(arb_key_segment(), 1..5).prop_map(|segments| CacheKey::new(segments))
    }

    // === ID Generators ===

    pub fn arb_player_id() -> impl Strategy<Value = PlayerId> {
        (1i64..1_000_000).prop_map(PlayerId::new)
    }

    pub fn arb_plan_id() -> impl Strategy<Value = PlanId> {
        (1i64..1_000_000).prop_map(PlanId::new)
    }

    pub fn arb_match_id() -> impl Strategy<Value = MatchId> {
        (1i64..1_000_000).prop_map(MatchId::new)
    }

    // === Resource Generators ===

    pub fn arb_player_summary() -> impl Strategy<Value = PlayerSummary> {
        (arb_player_id(), "[A-Z][a-z]{2,10}", proptest::option::of(1u32..99)).prop_map(
            |(id, name, jersey_number)| PlayerSummary {
                id,
                name,
                position: None,
                jersey_number,
                avatar_url: None,
            },
        )
    }

    pub fn arb_team_mutation() -> impl Strategy<Value = TeamMutation> {
        let id = 1i64..1_000;
        prop_oneof![
            arb_player_id().prop_map(|player_id| TeamMutation::CreatePlan { player_id }),
            (arb_plan_id(), arb_player_id())
                .prop_map(|(plan_id, player_id)| TeamMutation::UpdatePlan { plan_id, player_id }),
            arb_plan_id().prop_map(|plan_id| TeamMutation::DeletePlan { plan_id }),
            (id.clone(), id.clone()).prop_map(|(t, e)| TeamMutation::ToggleExercise {
                training_id: TrainingId::new(t),
                exercise_id: ExerciseId::new(e),
            }),
            Just(TeamMutation::CreateMatch),
            arb_match_id().prop_map(|match_id| TeamMutation::UpdateMatch { match_id }),
            arb_match_id().prop_map(|match_id| TeamMutation::DeleteMatch { match_id }),
            (arb_match_id(), arb_player_id()).prop_map(|(match_id, player_id)| {
                TeamMutation::RecordPlayerStats { match_id, player_id }
            }),
            Just(TeamMutation::AddPlayer),
            arb_player_id().prop_map(|player_id| TeamMutation::RemovePlayer { player_id }),
            Just(TeamMutation::UpdateProfile),
            Just(TeamMutation::StartConversation),
            id.prop_map(|c| TeamMutation::SendChatMessage {
                conversation_id: ConversationId::new(c),
            }),
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made resources and configs.

    use chrono::{NaiveDate, TimeZone, Utc};
    use lineup_client::{ClientConfig, LogConfig, RetryConfig};
    use lineup_core::{
        AuthSession, ChatAuthor, ChatMessage, Conversation, ConversationId, MatchId,
        MatchSummary, PlanId, PlanInput, PlayerDetail, PlayerId, PlayerSummary, Role,
        TrainingPlan, UserId, UserProfile,
    };

    pub const TEST_TOKEN: &str = "test-token";

    pub fn player_summary(id: i64, name: &str) -> PlayerSummary {
        PlayerSummary {
            id: PlayerId::new(id),
            name: name.to_string(),
            position: Some("midfield".to_string()),
            jersey_number: Some(id.rem_euclid(99) as u32 + 1),
            avatar_url: None,
        }
    }

    /// Three-player roster: ids 7, 11 and 42.
    pub fn roster() -> Vec<PlayerSummary> {
        vec![
            player_summary(7, "Ada"),
            player_summary(11, "Grace"),
            player_summary(42, "Alan"),
        ]
    }

    pub fn player_detail(id: i64) -> PlayerDetail {
        PlayerDetail {
            id: PlayerId::new(id),
            name: format!("Player {}", id),
            position: Some("forward".to_string()),
            jersey_number: Some(9),
            birth_date: NaiveDate::from_ymd_opt(2004, 5, 17),
            plans: Vec::new(),
            recent_matches: Vec::new(),
        }
    }

    pub fn plan_input(player_id: i64) -> PlanInput {
        PlanInput {
            player_id: PlayerId::new(player_id),
            title: "Pre-season conditioning".to_string(),
            description: None,
            starts_on: date(2026, 7, 1),
            ends_on: date(2026, 7, 28),
        }
    }

    pub fn training_plan(id: i64, player_id: i64) -> TrainingPlan {
        let input = plan_input(player_id);
        TrainingPlan {
            id: PlanId::new(id),
            player_id: input.player_id,
            title: input.title,
            description: input.description,
            starts_on: input.starts_on,
            ends_on: input.ends_on,
            trainings: Vec::new(),
        }
    }

    pub fn match_summary(id: i64, opponent: &str) -> MatchSummary {
        MatchSummary {
            id: MatchId::new(id),
            opponent: opponent.to_string(),
            played_at: Utc.with_ymd_and_hms(2026, 4, 1, 18, 0, 0).single().expect("valid timestamp"),
            home: true,
            goals_for: Some(2),
            goals_against: Some(1),
        }
    }

    pub fn conversation(id: i64) -> Conversation {
        let sent_at = Utc.with_ymd_and_hms(2026, 5, 2, 9, 30, 0).single().expect("valid timestamp");
        Conversation {
            id: ConversationId::new(id),
            title: Some("Recovery tips".to_string()),
            updated_at: sent_at,
            messages: vec![ChatMessage {
                author: ChatAuthor::User,
                content: "How long should I rest after a match?".to_string(),
                sent_at,
            }],
        }
    }

    pub fn user_profile(id: i64, role: Role) -> UserProfile {
        UserProfile {
            id: UserId::new(id),
            name: format!("User {}", id),
            email: format!("user{}@example.com", id),
            role,
            avatar_url: None,
        }
    }

    pub fn auth_session(token: &str, role: Role) -> AuthSession {
        AuthSession {
            token: token.to_string(),
            user: user_profile(1, role),
        }
    }

    /// Valid config pointing at `base_url`.
    pub fn client_config(base_url: &str) -> ClientConfig {
        ClientConfig {
            api_base_url: base_url.to_string(),
            request_timeout_ms: 15_000,
            stale_time_ms: 300_000,
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 1_000,
                max_backoff_ms: 30_000,
                multiplier: 2.0,
            },
            log: LogConfig {
                filter: "info".to_string(),
                json: false,
            },
        }
    }

    /// The same config as TOML.
    pub const CLIENT_CONFIG_TOML: &str = r#"
api_base_url = "https://api.lineup.test"
request_timeout_ms = 15000
stale_time_ms = 300000

[retry]
max_retries = 2
initial_backoff_ms = 1000
max_backoff_ms = 30000
multiplier = 2.0

[log]
filter = "lineup_cache=debug,info"
json = false
"#;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on cache entry state.

    use super::*;

    pub fn assert_state(store: &CacheStore, key: &CacheKey, expected: EntryState) {
        let entry = store
            .get(key)
            .unwrap_or_else(|| panic!("expected an entry for {}", key));
        assert_eq!(entry.state, expected, "unexpected state for {}", key);
    }

    pub fn assert_fresh(store: &CacheStore, key: &CacheKey) {
        assert_state(store, key, EntryState::Fresh);
    }

    pub fn assert_stale(store: &CacheStore, key: &CacheKey) {
        assert_state(store, key, EntryState::Stale);
    }

    pub fn assert_absent(store: &CacheStore, key: &CacheKey) {
        assert!(store.get(key).is_none(), "expected no entry for {}", key);
    }

    pub fn assert_unauthorized<T: std::fmt::Debug>(result: &FetchResult<T>) {
        match result {
            Err(err) => assert!(err.is_unauthorized(), "expected 401, got {:?}", err),
            Ok(value) => panic!("expected 401, got Ok({:?})", value),
        }
    }
}
