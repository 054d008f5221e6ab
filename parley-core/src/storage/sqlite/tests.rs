use std::env::temp_dir;

use uuid::Uuid;

use super::*;

#[test]
fn test_parse_role() {
    assert!(matches!(SqliteStore::parse_role("user"), Ok(Role::User)));
    assert!(matches!(
        SqliteStore::parse_role("assistant"),
        Ok(Role::Assistant)
    ));
    assert!(matches!(
        SqliteStore::parse_role("system"),
        Err(StorageError::InvalidData(_))
    ));
}

#[test]
fn test_user_key_rejects_out_of_range_ids() {
    assert_eq!(SqliteStore::user_key(450647525469454336).unwrap(), 450647525469454336);
    assert!(matches!(
        SqliteStore::user_key(u64::MAX),
        Err(StorageError::InvalidData(_))
    ));
}

#[test]
fn test_timestamp_format_is_fixed_width() {
    let whole = DateTime::parse_from_rfc3339("2025-06-01T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    let fractional = DateTime::parse_from_rfc3339("2025-06-01T10:00:00.5Z")
        .unwrap()
        .with_timezone(&Utc);
    let a = SqliteStore::format_timestamp(whole);
    let b = SqliteStore::format_timestamp(fractional);
    assert_eq!(a.len(), b.len());
    assert!(a < b);
    assert_eq!(SqliteStore::parse_timestamp(&b).unwrap(), fractional);
}

#[test]
fn test_expand_home() {
    assert_eq!(
        expand_home("/tmp/parley.db").unwrap(),
        PathBuf::from("/tmp/parley.db")
    );
    if let Some(home) = dirs::home_dir() {
        assert_eq!(
            expand_home("~/data/parley.db").unwrap(),
            home.join("data/parley.db")
        );
    }
}

/// Create a temporary database for testing.
async fn create_test_store() -> SqliteStore {
    let db_path = temp_dir().join(format!("parley_test_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}", db_path.display());
    SqliteStore::new(&url)
        .await
        .expect("failed to create test store")
}

#[tokio::test]
async fn test_whitelist_membership() {
    let store = create_test_store().await;

    assert!(!store.is_whitelisted(1).await.expect("query failed"));

    let added = store
        .add_to_whitelist(&WhitelistEntry::new(1, "alice"))
        .await
        .expect("add failed");
    assert!(added);
    assert!(store.is_whitelisted(1).await.expect("query failed"));
    assert!(!store.is_whitelisted(2).await.expect("query failed"));
}

#[tokio::test]
async fn test_add_to_whitelist_twice_keeps_first_entry() {
    let store = create_test_store().await;

    assert!(store
        .add_to_whitelist(&WhitelistEntry::new(1, "alice"))
        .await
        .expect("add failed"));
    assert!(!store
        .add_to_whitelist(&WhitelistEntry::new(1, "renamed"))
        .await
        .expect("add failed"));

    let entries = store.list_whitelist().await.expect("list failed");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].display_name, "alice");
}

#[tokio::test]
async fn test_remove_from_whitelist() {
    let store = create_test_store().await;
    store
        .add_to_whitelist(&WhitelistEntry::new(1, "alice"))
        .await
        .expect("add failed");

    assert!(store.remove_from_whitelist(1).await.expect("remove failed"));
    assert!(!store.remove_from_whitelist(1).await.expect("remove failed"));
    assert!(!store.is_whitelisted(1).await.expect("query failed"));
}

#[tokio::test]
async fn test_list_whitelist_oldest_first() {
    let store = create_test_store().await;
    for (id, name) in [(3, "carol"), (1, "alice"), (2, "bob")] {
        store
            .add_to_whitelist(&WhitelistEntry::new(id, name))
            .await
            .expect("add failed");
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let names: Vec<String> = store
        .list_whitelist()
        .await
        .expect("list failed")
        .into_iter()
        .map(|e| e.display_name)
        .collect();
    assert_eq!(names, vec!["carol", "alice", "bob"]);
}

#[tokio::test]
async fn test_append_turn_assigns_increasing_ids() {
    let store = create_test_store().await;

    let first = store
        .append_turn(1, Role::User, "Hello!")
        .await
        .expect("append failed");
    let second = store
        .append_turn(1, Role::Assistant, "Hi there!")
        .await
        .expect("append failed");

    assert!(second.id > first.id);
    assert!(second.timestamp >= first.timestamp);
    assert_eq!(first.role, Role::User);
    assert_eq!(second.content, "Hi there!");
}

#[tokio::test]
async fn test_recent_turns_round_trip_in_chronological_order() {
    let store = create_test_store().await;

    store.append_turn(1, Role::User, "Hello!").await.expect("append failed");
    store
        .append_turn(1, Role::Assistant, "Hi there!")
        .await
        .expect("append failed");

    let turns = store.recent_turns(1, 20).await.expect("get failed");
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[0].content, "Hello!");
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[1].content, "Hi there!");
}

#[tokio::test]
async fn test_recent_turns_bounded_to_twice_pair_limit() {
    let store = create_test_store().await;

    for i in 0..10 {
        store
            .append_turn(1, Role::User, &format!("Message {}", i))
            .await
            .expect("append failed");
    }

    let turns = store.recent_turns(1, 3).await.expect("get failed");
    let contents: Vec<&str> = turns.iter().map(|t| t.content.as_str()).collect();
    assert_eq!(
        contents,
        vec![
            "Message 4",
            "Message 5",
            "Message 6",
            "Message 7",
            "Message 8",
            "Message 9"
        ]
    );
}

#[tokio::test]
async fn test_recent_turns_zero_limit_and_empty_history() {
    let store = create_test_store().await;
    assert!(store.recent_turns(1, 20).await.expect("get failed").is_empty());

    store.append_turn(1, Role::User, "Hello").await.expect("append failed");
    assert!(store.recent_turns(1, 0).await.expect("get failed").is_empty());
}

#[tokio::test]
async fn test_recent_turns_never_crosses_users() {
    let store = create_test_store().await;

    store.append_turn(1, Role::User, "mine").await.expect("append failed");
    store.append_turn(2, Role::User, "theirs").await.expect("append failed");
    store
        .append_turn(1, Role::Assistant, "reply")
        .await
        .expect("append failed");

    let turns = store.recent_turns(1, 20).await.expect("get failed");
    assert_eq!(turns.len(), 2);
    assert!(turns.iter().all(|t| t.user_id == 1));
}

#[tokio::test]
async fn test_clear_turns_is_idempotent() {
    let store = create_test_store().await;

    store.append_turn(1, Role::User, "a").await.expect("append failed");
    store.append_turn(1, Role::Assistant, "b").await.expect("append failed");
    store.append_turn(2, Role::User, "keep").await.expect("append failed");

    assert_eq!(store.clear_turns(1).await.expect("clear failed"), 2);
    assert!(store.recent_turns(1, 20).await.expect("get failed").is_empty());
    assert_eq!(store.clear_turns(1).await.expect("clear failed"), 0);

    assert_eq!(store.recent_turns(2, 20).await.expect("get failed").len(), 1);
}

#[tokio::test]
async fn test_store_reopens_existing_database() {
    let db_path = temp_dir().join(format!("parley_test_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}", db_path.display());

    {
        let store = SqliteStore::new(&url).await.expect("open failed");
        store.append_turn(1, Role::User, "persisted").await.expect("append failed");
        store
            .add_to_whitelist(&WhitelistEntry::new(1, "alice"))
            .await
            .expect("add failed");
    }

    let store = SqliteStore::new(&url).await.expect("reopen failed");
    assert!(store.is_whitelisted(1).await.expect("query failed"));
    let turns = store.recent_turns(1, 1).await.expect("get failed");
    assert_eq!(turns[0].content, "persisted");
}
