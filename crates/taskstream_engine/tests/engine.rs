mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{frame, init_logging, wait_for_view, ScriptedTransport};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use taskstream_core::{ConnectionState, ControlAction, Sender};
use taskstream_engine::{ConfigError, EngineConfig, EngineHandle, MemoryConversationStore};
use tokio::time::Instant;

fn config() -> EngineConfig {
    EngineConfig::default().with_endpoint("ws://scripted.invalid/ws")
}

fn start(transport: &ScriptedTransport, store: &Arc<MemoryConversationStore>) -> EngineHandle {
    init_logging();
    EngineHandle::start(config(), Arc::new(transport.clone()), store.clone()).expect("engine")
}

fn summaries(engine: &EngineHandle) -> Vec<String> {
    engine
        .snapshot()
        .messages
        .into_iter()
        .filter(|message| message.sender == Sender::Assistant)
        .map(|message| message.content)
        .collect()
}

#[tokio::test(start_paused = true)]
async fn rejects_non_websocket_endpoints() {
    init_logging();
    let (transport, _links) = ScriptedTransport::new();
    let result = EngineHandle::start(
        EngineConfig::default().with_endpoint("http://127.0.0.1:8000/ws"),
        Arc::new(transport),
        Arc::new(MemoryConversationStore::default()),
    );
    assert!(matches!(result, Err(ConfigError::UnsupportedScheme(scheme)) if scheme == "http"));
}

#[tokio::test(start_paused = true)]
async fn submitted_task_follows_the_handshake_on_the_wire() {
    let (transport, mut links) = ScriptedTransport::new();
    let store = Arc::new(MemoryConversationStore::default());
    let engine = start(&transport, &store);

    let mut link = links.recv().await.expect("link");
    wait_for_view(&engine, |view| view.connection == ConnectionState::Open).await;
    engine.submit_task("  compare laptop prices  ", None);
    engine.control(ControlAction::Pause, Some("t1".to_string()));

    let handshake: Value = serde_json::from_str(&link.next_sent().await.expect("handshake"))
        .expect("handshake json");
    assert_eq!(handshake["type"], "handshake");

    let task: Value = serde_json::from_str(&link.next_sent().await.expect("task")).expect("json");
    assert_eq!(
        task,
        json!({
            "type": "task",
            "data": { "task": "compare laptop prices", "llm_model": "gpt-4o" }
        })
    );
    let control: Value =
        serde_json::from_str(&link.next_sent().await.expect("control")).expect("json");
    assert_eq!(
        control,
        json!({ "type": "control", "data": { "action": "pause", "taskId": "t1" } })
    );

    let view = wait_for_view(&engine, |view| view.messages.len() == 1).await;
    assert_eq!(view.messages[0].sender, Sender::User);
    assert_eq!(view.messages[0].content, "compare laptop prices");
    assert_eq!(view.conversations.len(), 1);
    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn reconnecting_mid_task_keeps_every_frame_once_and_in_order() {
    let (transport, mut links) = ScriptedTransport::new();
    let store = Arc::new(MemoryConversationStore::default());
    let engine = start(&transport, &store);
    let first = links.recv().await.expect("first link");

    engine.new_conversation(Some("Laptops".to_string()));
    wait_for_view(&engine, |view| {
        view.active_conversation.is_some() && view.connection == ConnectionState::Open
    })
    .await;

    for index in 1..=5 {
        first.push(frame("browser_summary", json!({ "summary": format!("s{index}") })));
    }
    wait_for_view(&engine, |view| view.messages.len() == 5).await;

    first.close(false);
    wait_for_view(&engine, |view| view.connection == ConnectionState::Closed).await;
    let dropped_at = Instant::now();

    let second = links.recv().await.expect("second link");
    assert!(dropped_at.elapsed() >= Duration::from_secs(3));
    wait_for_view(&engine, |view| view.connection == ConnectionState::Open).await;

    second.push(frame("browser_summary", json!({ "summary": "s6" })));
    wait_for_view(&engine, |view| view.messages.len() == 6).await;

    assert_eq!(summaries(&engine), vec!["s1", "s2", "s3", "s4", "s5", "s6"]);
    assert_eq!(engine.snapshot().logs.entries.len(), 6);
    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn undeliverable_task_adds_a_single_system_message() {
    let (transport, _links) = ScriptedTransport::new();
    transport.refuse(true);
    let store = Arc::new(MemoryConversationStore::default());
    let engine = start(&transport, &store);

    engine.submit_task("book a table", None);
    let view = wait_for_view(&engine, |view| {
        view.messages
            .iter()
            .any(|message| message.sender == Sender::System)
    })
    .await;

    assert_eq!(view.messages.len(), 2);
    assert_eq!(view.messages[0].content, "book a table");
    assert!(view.messages[1].content.starts_with("Failed to send task"));
    assert_eq!(
        view.messages[1].metadata,
        Some(json!({ "event": "send_failed", "kind": "error" }))
    );

    // Clear of the 3s reconnect ticks, which keep failing.
    tokio::time::sleep(Duration::from_millis(30_500)).await;
    let later = engine.snapshot();
    let system_messages = later
        .messages
        .iter()
        .filter(|message| message.sender == Sender::System)
        .count();
    assert_eq!(system_messages, 1);
    assert_eq!(later.connection, ConnectionState::Closed);
    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn conversations_survive_a_restart() {
    let (transport, _links) = ScriptedTransport::new();
    let store = Arc::new(MemoryConversationStore::default());
    let engine = start(&transport, &store);

    engine.new_conversation(Some("Groceries".to_string()));
    engine.submit_task("order milk", None);
    wait_for_view(&engine, |view| view.messages.len() == 1).await;
    engine.shutdown().await;

    let saved = store.snapshot();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].title, "Groceries");
    assert_eq!(saved[0].messages.len(), 1);

    let (transport, _links) = ScriptedTransport::new();
    let restarted = start(&transport, &store);
    let view = restarted.snapshot();
    assert_eq!(view.active_conversation, Some(saved[0].id.clone()));
    assert_eq!(view.messages.len(), 1);
    assert_eq!(view.messages[0].content, "order milk");
    restarted.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn deleting_the_active_conversation_is_saved() {
    let (transport, _links) = ScriptedTransport::new();
    let store = Arc::new(MemoryConversationStore::default());
    let engine = start(&transport, &store);

    engine.new_conversation(Some("Scratch".to_string()));
    let view = wait_for_view(&engine, |view| view.active_conversation.is_some()).await;
    let id = view.active_conversation.expect("active");
    assert_eq!(store.snapshot().len(), 1);

    engine.delete_conversation(id);
    wait_for_view(&engine, |view| view.conversations.is_empty()).await;
    assert!(store.snapshot().is_empty());
    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn commands_are_not_starved_by_a_busy_inbound_stream() {
    let (transport, mut links) = ScriptedTransport::new();
    let store = Arc::new(MemoryConversationStore::default());
    let engine = start(&transport, &store);
    let link = links.recv().await.expect("link");
    wait_for_view(&engine, |view| view.connection == ConnectionState::Open).await;

    for index in 0..300 {
        link.push(frame("browser_summary", json!({ "summary": format!("s{index}") })));
    }
    engine.new_conversation(Some("Busy".to_string()));

    let view = wait_for_view(&engine, |view| view.logs.entries.len() == 300).await;
    assert!(view.active_conversation.is_some());
    // Summaries land only once the conversation exists.
    assert!(!view.messages.is_empty());
    assert!(view.messages.len() <= 300);
    engine.shutdown().await;
}
