//! Screen hooks against a scripted API.

use lineup_cache::{CacheStore, Credential, EntryState, FetchError, Identity, InMemoryIdentity, SessionBoundary};
use lineup_client::{HttpMethod, TeamClient};
use lineup_core::{
    ApiError, CachePolicy, ChatPrompt, ConversationId, Credentials, ExerciseId, PlayerId,
    QueryKeys, RetryPolicy, Role, TrainingId,
};
use lineup_test_utils::assertions::{assert_fresh, assert_stale};
use lineup_test_utils::fixtures;
use lineup_test_utils::MockRemoteApi;
use serde_json::{json, to_value};
use std::sync::Arc;

struct Setup {
    client: TeamClient,
    api: Arc<MockRemoteApi>,
    identity: Arc<InMemoryIdentity>,
    store: Arc<CacheStore>,
}

fn setup() -> Setup {
    let api = Arc::new(MockRemoteApi::new());
    let identity = Arc::new(InMemoryIdentity::with_credential(Credential::new(
        fixtures::TEST_TOKEN,
    )));
    let store = Arc::new(CacheStore::new());
    let session = Arc::new(SessionBoundary::new(store.clone(), identity.clone()));
    let policy = CachePolicy::default().with_retry(RetryPolicy::none());
    Setup {
        client: TeamClient::new(api.clone(), session, policy),
        api,
        identity,
        store,
    }
}

#[tokio::test]
async fn test_roster_served_from_cache() {
    let s = setup();
    s.api.on_get("/coach/players", to_value(fixtures::roster()).unwrap());

    let first = s.client.coach_players().await.unwrap();
    let second = s.client.coach_players().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(s.api.count(HttpMethod::Get, "/coach/players"), 1);
    assert_fresh(&s.store, &QueryKeys::coach_players());
}

#[tokio::test]
async fn test_create_plan_refetches_only_that_player() {
    let s = setup();
    s.api
        .on_get("/coach/players", to_value(fixtures::roster()).unwrap())
        .on_get("/coach/players/42", to_value(fixtures::player_detail(42)).unwrap())
        .on_post("/coach/plans", to_value(fixtures::training_plan(99, 42)).unwrap());

    s.client.coach_players().await.unwrap();
    s.client.coach_player(PlayerId::new(42)).await.unwrap();

    let plan = s.client.create_plan(&fixtures::plan_input(42)).await.unwrap();
    assert_eq!(plan.player_id, PlayerId::new(42));
    assert_stale(&s.store, &QueryKeys::coach_player(PlayerId::new(42)));
    assert_fresh(&s.store, &QueryKeys::coach_players());

    s.client.coach_players().await.unwrap();
    s.client.coach_player(PlayerId::new(42)).await.unwrap();
    assert_eq!(s.api.count(HttpMethod::Get, "/coach/players"), 1);
    assert_eq!(s.api.count(HttpMethod::Get, "/coach/players/42"), 2);

    let sent = s
        .api
        .requests()
        .into_iter()
        .find(|r| r.method == HttpMethod::Post)
        .unwrap();
    assert_eq!(sent.body.unwrap()["player_id"], 42);
}

#[tokio::test]
async fn test_rejected_credential_clears_everything() {
    let s = setup();
    s.api
        .on_get("/coach/matches", json!([]))
        .respond(HttpMethod::Get, "/coach/players", Err(ApiError::status(401, "")));

    s.client.coach_matches().await.unwrap();
    let err = s.client.coach_players().await.unwrap_err();

    assert!(err.is_unauthorized());
    assert!(s.store.is_empty());
    assert!(!s.identity.is_authenticated());
}

#[tokio::test]
async fn test_login_clears_cache_and_seeds_profile() {
    let s = setup();
    s.api
        .on_get("/coach/players", to_value(fixtures::roster()).unwrap())
        .on_post(
            "/auth/login",
            to_value(fixtures::auth_session("coach-token", Role::Coach)).unwrap(),
        );
    s.client.coach_players().await.unwrap();

    let auth = s
        .client
        .login(&Credentials {
            email: "user1@example.com".to_string(),
            password: "hunter2".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(auth.user.role, Role::Coach);
    assert_eq!(s.identity.credential().unwrap().expose(), "coach-token");
    assert!(s.store.get(&QueryKeys::coach_players()).is_none());

    let me = s.client.me().await.unwrap();
    assert_eq!(me, auth.user);
    assert_eq!(s.api.count(HttpMethod::Get, "/me"), 0);
}

#[tokio::test]
async fn test_failed_login_keeps_session() {
    let s = setup();
    s.api
        .on_get("/coach/players", to_value(fixtures::roster()).unwrap())
        .respond(
            HttpMethod::Post,
            "/auth/login",
            Err(ApiError::status(422, r#"{"message":"wrong password"}"#)),
        );
    s.client.coach_players().await.unwrap();

    let err = s
        .client
        .login(&Credentials {
            email: "user1@example.com".to_string(),
            password: "wrong".to_string(),
        })
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(422));
    assert_eq!(s.identity.credential().unwrap().expose(), fixtures::TEST_TOKEN);
    assert_fresh(&s.store, &QueryKeys::coach_players());
}

#[tokio::test]
async fn test_start_conversation_invalidates_new_key() {
    let s = setup();
    let created = fixtures::conversation(5);
    s.api
        .on_get("/chat/conversations", json!([]))
        .on_post("/chat/conversations", to_value(&created).unwrap());
    s.client.conversations().await.unwrap();
    // Pretend the new conversation was already cached under its key.
    s.store
        .put(QueryKeys::chat_conversation(ConversationId::new(5)), to_value(&created).unwrap());

    let conversation = s
        .client
        .start_conversation(&ChatPrompt {
            content: "How long should I rest after a match?".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(conversation.id, ConversationId::new(5));
    assert_stale(&s.store, &QueryKeys::chat_conversations());
    assert_stale(&s.store, &QueryKeys::chat_conversation(ConversationId::new(5)));
}

#[tokio::test]
async fn test_toggle_exercise_invalidates_player_trainings() {
    let s = setup();
    s.store.put(QueryKeys::player_trainings(), json!([]));
    s.store.put(QueryKeys::player_training(TrainingId::new(8)), json!({}));
    s.store.put(QueryKeys::player_stats(), json!({}));
    s.api.respond(
        HttpMethod::Patch,
        "/player/trainings/8/exercises/3",
        Ok(json!({ "id": 3, "name": "Plank", "completed": true })),
    );

    let exercise = s
        .client
        .toggle_exercise(TrainingId::new(8), ExerciseId::new(3), true)
        .await
        .unwrap();

    assert!(exercise.completed);
    assert_stale(&s.store, &QueryKeys::player_trainings());
    assert_stale(&s.store, &QueryKeys::player_training(TrainingId::new(8)));
    assert_fresh(&s.store, &QueryKeys::player_stats());
}

#[tokio::test]
async fn test_malformed_payload_rejected_on_ingress() {
    let s = setup();
    s.api.on_get("/coach/players/7", json!({ "id": "seven" }));

    let err = s.client.coach_player(PlayerId::new(7)).await.unwrap_err();

    assert!(matches!(err, FetchError::Api(ApiError::Decode { .. })));
    assert_eq!(
        s.store.get(&QueryKeys::coach_player(PlayerId::new(7))).map(|e| e.state),
        Some(EntryState::Error)
    );
    assert_eq!(s.api.count(HttpMethod::Get, "/coach/players/7"), 1);
}

#[tokio::test]
async fn test_logout_clears_cache() {
    let s = setup();
    s.api.on_get("/me", to_value(fixtures::user_profile(1, Role::Player)).unwrap());
    s.client.me().await.unwrap();

    s.client.logout();

    assert!(s.store.is_empty());
    assert!(!s.identity.is_authenticated());
}
