//! Conversation memory tests against a temporary directory

use chronos::memory::{
    datapoint_id, HashEmbedding, InMemoryIndex, MemoryStore, Role, VectorIndex,
};
use std::sync::Arc;
use tempfile::TempDir;

async fn open_store() -> (TempDir, MemoryStore, Arc<InMemoryIndex>) {
    let dir = tempfile::tempdir().unwrap();
    let index = Arc::new(InMemoryIndex::new());
    let store = MemoryStore::open(dir.path(), Arc::new(HashEmbedding::default()), index.clone())
        .await
        .unwrap();
    (dir, store, index)
}

#[tokio::test]
async fn test_open_creates_directories() {
    let (dir, _store, _) = open_store().await;
    assert!(dir.path().join("conversations").is_dir());
    assert!(dir.path().join("summaries").is_dir());
}

#[tokio::test]
async fn test_save_and_load_conversation_entry() {
    let (_dir, store, _) = open_store().await;

    store
        .save_conversation_entry("user1", "session1", "1", "Test message", Role::User)
        .await
        .unwrap();

    let entries = store.load_conversation("user1", "session1").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, "1");
    assert_eq!(entries[0].user_id, "user1");
    assert_eq!(entries[0].session_id, "session1");
    assert_eq!(entries[0].content, "Test message");
    assert_eq!(entries[0].role, Role::User);
    assert_eq!(entries[0].content_vector.len(), 256);
}

#[tokio::test]
async fn test_entries_keep_append_order() {
    let (_dir, store, _) = open_store().await;

    for (i, role) in [Role::User, Role::Assistant, Role::User].into_iter().enumerate() {
        store
            .save_conversation_entry("u", "s", &i.to_string(), &format!("turn {}", i), role)
            .await
            .unwrap();
    }

    let entries = store.load_conversation("u", "s").await.unwrap();
    let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["0", "1", "2"]);
    assert_eq!(entries[1].role, Role::Assistant);
}

#[tokio::test]
async fn test_log_file_is_json_lines_with_camel_case_keys() {
    let (_dir, store, _) = open_store().await;
    store
        .save_conversation_entry("u", "s", "1", "first", Role::User)
        .await
        .unwrap();
    store
        .save_conversation_entry("u", "s", "2", "second", Role::Assistant)
        .await
        .unwrap();

    let text = std::fs::read_to_string(store.conversation_path("u", "s")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    for key in ["id", "userId", "sessionId", "timestamp", "content", "contentVector", "role"] {
        assert!(first.get(key).is_some(), "missing key {}", key);
    }
}

#[tokio::test]
async fn test_missing_conversation_is_empty() {
    let (_dir, store, _) = open_store().await;
    let entries = store.load_conversation("nobody", "never").await.unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_malformed_lines_are_skipped() {
    let (_dir, store, _) = open_store().await;
    store
        .save_conversation_entry("u", "s", "1", "kept", Role::User)
        .await
        .unwrap();

    let path = store.conversation_path("u", "s");
    let mut text = std::fs::read_to_string(&path).unwrap();
    text.push_str("{not json\n");
    std::fs::write(&path, text).unwrap();

    store
        .save_conversation_entry("u", "s", "2", "also kept", Role::Assistant)
        .await
        .unwrap();

    let entries = store.load_conversation("u", "s").await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].content, "also kept");
}

#[tokio::test]
async fn test_sessions_do_not_collide() {
    let (_dir, store, _) = open_store().await;

    // Unescaped, both pairs would map to user_a_session_b_session_c
    store
        .save_conversation_entry("a_session_b", "c", "1", "left", Role::User)
        .await
        .unwrap();
    store
        .save_conversation_entry("a", "b_session_c", "1", "right", Role::User)
        .await
        .unwrap();

    let left = store.load_conversation("a_session_b", "c").await.unwrap();
    let right = store.load_conversation("a", "b_session_c").await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(right.len(), 1);
    assert_eq!(left[0].content, "left");
    assert_eq!(right[0].content, "right");
}

#[tokio::test]
async fn test_unsafe_ids_stay_inside_base_dir() {
    let (dir, store, _) = open_store().await;
    store
        .save_conversation_entry("../../etc", "passwd", "1", "x", Role::User)
        .await
        .unwrap();

    let path = store.conversation_path("../../etc", "passwd");
    assert!(path.starts_with(dir.path().join("conversations")));
    assert!(path.exists());
}

#[tokio::test]
async fn test_summary_round_trip_and_overwrite() {
    let (_dir, store, _) = open_store().await;

    assert!(store.load_summary("u", "s", "1").await.unwrap().is_none());

    store.save_summary("u", "s", "1", "Test summary").await.unwrap();
    let loaded = store.load_summary("u", "s", "1").await.unwrap().unwrap();
    assert_eq!(loaded.summary, "Test summary");
    assert_eq!(loaded.summary_id, "1");

    store.save_summary("u", "s", "1", "Revised").await.unwrap();
    let loaded = store.load_summary("u", "s", "1").await.unwrap().unwrap();
    assert_eq!(loaded.summary, "Revised");

    let text = std::fs::read_to_string(store.summary_path("u", "s", "1")).unwrap();
    assert!(text.contains("\"summaryId\""));
    assert!(text.contains('\n'));
}

#[tokio::test]
async fn test_entries_are_indexed_under_datapoint_ids() {
    let (_dir, store, index) = open_store().await;

    store
        .save_conversation_entry("u1", "s1", "7", "hello", Role::User)
        .await
        .unwrap();

    assert_eq!(index.len(), 1);
    let hits = index
        .query(&HashEmbedding::default().embed_sync("hello"), 1)
        .await
        .unwrap();
    assert_eq!(hits[0].datapoint_id, datapoint_id("u1", "s1", "7"));
    assert_eq!(hits[0].datapoint_id, "user_u1_session_s1_entry_7");
}

#[tokio::test]
async fn test_search_prefers_related_entries() {
    let (_dir, store, _) = open_store().await;

    store
        .save_conversation_entry("u", "s", "weather", "the weather forecast says rain tomorrow", Role::Assistant)
        .await
        .unwrap();
    store
        .save_conversation_entry("u", "s", "bread", "banana bread needs ripe bananas", Role::Assistant)
        .await
        .unwrap();

    let hits = store.search("will it rain tomorrow", 2).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].datapoint_id, datapoint_id("u", "s", "weather"));
}

#[tokio::test]
async fn test_reopened_store_rebuilds_index_from_logs() {
    let (dir, store, _) = open_store().await;
    store
        .save_conversation_entry("u", "s", "fox", "the quick brown fox", Role::User)
        .await
        .unwrap();
    store
        .save_conversation_entry("v", "t", "bread", "banana bread needs ripe bananas", Role::Assistant)
        .await
        .unwrap();
    drop(store);

    let index = Arc::new(InMemoryIndex::new());
    let reopened = MemoryStore::open(dir.path(), Arc::new(HashEmbedding::default()), index.clone())
        .await
        .unwrap();
    assert!(reopened.search("quick brown fox", 5).await.unwrap().is_empty());

    assert_eq!(reopened.rebuild_index().await.unwrap(), 2);
    assert_eq!(index.len(), 2);

    let hits = reopened.search("quick brown fox", 5).await.unwrap();
    assert_eq!(hits[0].datapoint_id, datapoint_id("u", "s", "fox"));
}

#[tokio::test]
async fn test_long_ids_round_trip() {
    let (_dir, store, _) = open_store().await;
    let user = "a.b@c.d/".repeat(25);
    let session = "s".repeat(200);

    store
        .save_conversation_entry(&user, &session, "1", "still stored", Role::User)
        .await
        .unwrap();
    store.save_summary(&user, &session, &"z".repeat(200), "short").await.unwrap();

    let entries = store.load_conversation(&user, &session).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].user_id, user);
    assert!(store.load_summary(&user, &session, &"z".repeat(200)).await.unwrap().is_some());

    let name = store.conversation_path(&user, &session);
    assert!(name.file_name().unwrap().len() < 255);
    assert!(store.load_conversation(&format!("{}x", user), &session).await.unwrap().is_empty());
}
