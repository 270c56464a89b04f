use std::fs;

use chrono::{TimeZone, Utc};
use taskstream_core::Conversation;
use taskstream_engine::{
    ensure_state_dir, AtomicFileWriter, ConversationStore, MemoryConversationStore, PersistError,
};
use tempfile::TempDir;

#[test]
fn creates_missing_state_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("state").join("nested");
    assert!(!new_dir.exists());
    ensure_state_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn state_dir_that_is_a_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("occupied");
    fs::write(&file_path, "x").unwrap();
    assert!(matches!(
        ensure_state_dir(&file_path),
        Err(PersistError::StateDir(_))
    ));
}

#[test]
fn atomic_write_replaces_previous_content() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("conversations.ron", "[]").unwrap();
    assert_eq!(first.file_name().unwrap(), "conversations.ron");
    assert_eq!(fs::read_to_string(&first).unwrap(), "[]");

    let second = writer.write("conversations.ron", "[(id: \"c1\")]").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "[(id: \"c1\")]");

    // Only the target remains; temp files were renamed away.
    let entries = fs::read_dir(temp.path()).unwrap().count();
    assert_eq!(entries, 1);
}

#[test]
fn no_partial_file_when_dir_is_unusable() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    assert!(writer.write("conversations.ron", "data").is_err());
    assert!(!file_path.with_file_name("conversations.ron").exists());
}

#[test]
fn memory_store_returns_last_saved_list() {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    let store = MemoryConversationStore::default();
    assert!(store.load().unwrap().is_empty());

    let saved = vec![
        Conversation::new("c1".to_string(), "First", at),
        Conversation::new("c2".to_string(), "Second", at),
    ];
    store.save(&saved).unwrap();
    store.save(&saved[1..]).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].title, "Second");
}
