//! Session store tests over real files.

mod common;

use chat_client::models::{Message, Role};
use chat_client::services::storage::HISTORY_KEY;
use chat_client::services::{KeyValueStorage, SessionStore};
use common::{mdn, TempDir};
use std::sync::Arc;

fn history_file(dir: &TempDir) -> std::path::PathBuf {
    dir.path.join(format!("{}.json", HISTORY_KEY))
}

#[test]
fn history_survives_a_restart() {
    let dir = TempDir::new();

    let mut store = SessionStore::open(Arc::new(dir.storage()));
    store.append(Message::user("What is a slice?")).unwrap();
    store
        .append(Message::model("A view into a sequence.", vec![mdn()]))
        .unwrap();
    let written = store.messages().to_vec();
    drop(store);

    let reopened = SessionStore::open(Arc::new(dir.storage()));
    assert_eq!(reopened.messages(), written.as_slice());
}

#[test]
fn missing_history_starts_empty() {
    let dir = TempDir::new();

    let store = SessionStore::open(Arc::new(dir.storage()));

    assert!(store.is_empty());
    assert!(!history_file(&dir).exists());
}

#[test]
fn corrupt_history_starts_empty() {
    let dir = TempDir::new();
    std::fs::write(history_file(&dir), "{ not a message list").unwrap();

    let mut store = SessionStore::open(Arc::new(dir.storage()));
    assert!(store.is_empty());

    store.append(Message::user("fresh start")).unwrap();
    let reopened = SessionStore::open(Arc::new(dir.storage()));
    assert_eq!(reopened.len(), 1);
}

#[test]
fn clear_persists_an_empty_log() {
    let dir = TempDir::new();
    let mut store = SessionStore::open(Arc::new(dir.storage()));
    store.append(Message::user("hello")).unwrap();

    store.clear().unwrap();

    assert!(SessionStore::open(Arc::new(dir.storage())).is_empty());
    assert_eq!(std::fs::read_to_string(history_file(&dir)).unwrap(), "[]");
}

#[test]
fn stored_records_use_the_expected_field_names() {
    let dir = TempDir::new();
    let mut store = SessionStore::open(Arc::new(dir.storage()));
    store.append(Message::user("hi")).unwrap();
    store.append(Message::model("hello", vec![mdn()])).unwrap();

    let raw = dir.storage().get(HISTORY_KEY).unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let records = value.as_array().unwrap();

    assert_eq!(records[0]["role"], "user");
    assert!(records[0].get("sources").is_none());
    assert!(records[0]["createdAt"].is_i64());
    assert!(records[0].get("isPending").is_none());
    assert_eq!(records[1]["role"], "model");
    assert_eq!(records[1]["sources"][0]["uri"], mdn().uri);
}

#[test]
fn records_without_optional_fields_load() {
    let dir = TempDir::new();
    std::fs::write(
        history_file(&dir),
        r#"[{"id":"a","role":"user","content":"hi","createdAt":1700000000000},
            {"id":"b","role":"model","content":"hello","createdAt":1700000001000,
             "sources":[{"title":"MDN","uri":"https://developer.mozilla.org"}]}]"#,
    )
    .unwrap();

    let store = SessionStore::open(Arc::new(dir.storage()));

    assert_eq!(store.len(), 2);
    assert_eq!(store.messages()[0].role, Role::User);
    assert!(store.messages()[0].sources.is_none());
    assert_eq!(store.messages()[1].sources().len(), 1);
}
