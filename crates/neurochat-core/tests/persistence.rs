//! Persistence tests - verify data survives store closure and reopening

use neurochat_core::ConversationStore;
use neurochat_core::models::{NewConversation, NewTurn, ProfilePatch, TurnRole, TurnSource};
use uuid::Uuid;

fn temp_db_path() -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    let filename = format!("neurochat-persistence-test-{}.db", Uuid::new_v4());
    path.push(filename);
    path
}

#[tokio::test]
async fn conversation_and_turns_persist_across_reopen() {
    let db_path = temp_db_path();

    // Phase 1: Create and populate
    let conv_id = {
        let store = ConversationStore::open(&db_path).await.expect("open");
        let conv = store
            .create_conversation(NewConversation {
                title: Some("Persisted".to_string()),
                personality_id: Some("mentor".to_string()),
                ..NewConversation::default()
            })
            .await
            .expect("create");
        store
            .add_turn(
                NewTurn::new(&conv.id, TurnRole::User, "Bonjour").with_source(TurnSource::Speech),
            )
            .await
            .expect("turn");
        store
            .add_turn(NewTurn::new(&conv.id, TurnRole::Assistant, "Salut !"))
            .await
            .expect("turn");
        store.close().await;
        conv.id
    };

    // Phase 2: Reopen and verify
    {
        let store = ConversationStore::open(&db_path).await.expect("reopen");

        let full = store
            .get_conversation(&conv_id)
            .await
            .expect("get")
            .expect("exists");

        assert_eq!(full.meta.title, "Persisted");
        assert_eq!(full.meta.personality_id.as_deref(), Some("mentor"));
        assert_eq!(full.turns.len(), 2);
        assert_eq!(full.turns[0].source, Some(TurnSource::Speech));
        assert_eq!(full.turns[1].text, "Salut !");

        store.close().await;
    }
}

#[tokio::test]
async fn profile_created_once_is_seen_after_reopen() {
    let db_path = temp_db_path();

    let created = {
        let store = ConversationStore::open(&db_path).await.expect("open");
        let first = store.get_or_create_profile().await.expect("profile");
        let second = store.get_or_create_profile().await.expect("profile");
        assert_eq!(first.id, "default");
        assert_eq!(second.id, "default");
        store.close().await;
        first
    };

    {
        let store = ConversationStore::open(&db_path).await.expect("reopen");
        let reread = store.get_or_create_profile().await.expect("profile");
        // Same updated_at means the row was read back, not recreated.
        assert_eq!(reread, created);
        store.close().await;
    }
}

#[tokio::test]
async fn profile_patch_persists_across_reopen() {
    let db_path = temp_db_path();

    {
        let store = ConversationStore::open(&db_path).await.expect("open");
        store
            .upsert_user_profile(ProfilePatch {
                display_name: Some("Camille".to_string()),
                ..ProfilePatch::default()
            })
            .await
            .expect("upsert");
        store.close().await;
    }

    {
        let store = ConversationStore::open(&db_path).await.expect("reopen");
        let profile = store.get_or_create_profile().await.expect("profile");
        assert_eq!(profile.display_name.as_deref(), Some("Camille"));
        store.close().await;
    }
}

#[tokio::test]
async fn reopening_does_not_duplicate_schema_version() {
    let db_path = temp_db_path();

    for _ in 0..2 {
        let store = ConversationStore::open(&db_path).await.expect("open");
        store.close().await;
    }

    let store = ConversationStore::open(&db_path).await.expect("open");
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_migrations")
        .fetch_one(store.pool())
        .await
        .expect("count");
    assert_eq!(count.0, 1);
    store.close().await;
}

#[tokio::test]
async fn open_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("a").join("b").join("neurochat.db");

    let store = ConversationStore::open(&db_path).await.expect("open");
    assert!(db_path.exists());
    store.close().await;
}
