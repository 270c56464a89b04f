use std::sync::Once;

use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use taskstream_core::{
    targets, update, AppState, BrowserStatus, EventKind, LogLevel, Msg, Sender, Target,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(stream_logging::initialize_for_tests);
}

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::seconds(seconds)
}

fn frame(kind: &str, data: Value) -> Msg {
    Msg::FrameReceived {
        raw: json!({ "type": kind, "data": data }).to_string(),
        received_at: at(10),
    }
}

fn with_conversation() -> AppState {
    let (state, _) = update(
        AppState::new(),
        Msg::NewConversation {
            title: Some("Shopping".to_string()),
            at: at(0),
        },
    );
    state
}

#[test]
fn every_kind_has_targets_in_fan_out_order() {
    for kind in EventKind::ALL {
        let routed = targets(kind);
        assert!(!routed.is_empty(), "{kind} has no targets");
        let mut sorted = routed.to_vec();
        sorted.sort();
        assert_eq!(routed, sorted.as_slice(), "{kind} targets out of order");
        assert_eq!(EventKind::from_tag(kind.as_str()), Some(kind));
    }
    assert_eq!(
        targets(EventKind::TaskStarted),
        &[Target::Conversations, Target::Browser, Target::Log]
    );
    assert_eq!(targets(EventKind::DataExportReady), &[Target::Log, Target::Export]);
}

#[test]
fn task_started_fans_out_to_chat_browser_and_log() {
    init_logging();
    let (state, _) = update(
        with_conversation(),
        frame("task_started", json!({ "task_id": "t-1", "task": "find shoes" })),
    );
    let view = state.view();

    assert_eq!(view.messages.len(), 1);
    assert_eq!(view.messages[0].sender, Sender::System);
    assert_eq!(view.messages[0].content, "Task started: find shoes");
    assert_eq!(view.browser.is_loading, Some(true));
    assert_eq!(view.browser.browser_ready, Some(true));
    assert_eq!(view.logs.entries.len(), 1);
    assert_eq!(view.logs.entries[0].level, LogLevel::Info);
}

#[test]
fn status_update_merges_only_present_fields() {
    init_logging();
    let state = AppState::new();
    let (state, _) = update(
        state,
        frame(
            "status_update",
            json!({ "currentUrl": "https://a.example", "isLoading": true }),
        ),
    );
    let (state, _) = update(state, frame("status_update", json!({ "isLoading": false })));

    assert_eq!(
        state.view().browser,
        BrowserStatus {
            current_url: Some("https://a.example".to_string()),
            is_loading: Some(false),
            current_action: None,
            browser_ready: None,
        }
    );
}

#[test]
fn malformed_and_unknown_frames_do_not_interrupt_the_stream() {
    init_logging();
    let state = with_conversation();
    let (state, _) = update(state, frame("agent_log", json!({ "message": "first" })));
    let (state, _) = update(
        state,
        Msg::FrameReceived {
            raw: "{not json".to_string(),
            received_at: at(11),
        },
    );
    let (state, _) = update(
        state,
        Msg::FrameReceived {
            raw: json!({ "data": {} }).to_string(),
            received_at: at(12),
        },
    );
    let (state, _) = update(state, frame("telemetry.heartbeat", json!({ "x": 1 })));
    let (state, _) = update(
        state,
        frame("research.task_started", json!({ "category_index": "zero" })),
    );
    let (state, _) = update(state, frame("agent_log", json!({ "message": "second" })));

    let messages: Vec<String> = state
        .view()
        .logs
        .entries
        .into_iter()
        .map(|entry| entry.message)
        .collect();
    assert_eq!(messages, vec!["first".to_string(), "second".to_string()]);
}

#[test]
fn events_apply_in_receipt_order() {
    init_logging();
    let mut state = AppState::new();
    for index in 0..20 {
        let (next, _) = update(
            state,
            frame("agent_log", json!({ "message": format!("entry {index}") })),
        );
        state = next;
    }
    let view = state.view();
    let ids: Vec<u64> = view.logs.entries.iter().map(|entry| entry.id).collect();
    let expected: Vec<u64> = (1..=20).collect();
    assert_eq!(ids, expected);
    assert_eq!(view.logs.entries[19].message, "entry 19");
}

#[test]
fn chat_events_without_active_conversation_still_reach_other_targets() {
    init_logging();
    let (state, effects) = update(
        AppState::new(),
        frame("task_complete", json!({ "result": "done" })),
    );
    let view = state.view();

    assert!(view.conversations.is_empty());
    assert!(effects.is_empty());
    assert_eq!(view.browser.is_loading, Some(false));
    assert_eq!(view.logs.entries.len(), 1);
    assert_eq!(view.logs.entries[0].message, "Task complete: done");
}

#[test]
fn agent_log_level_comes_from_payload() {
    init_logging();
    let (state, _) = update(
        AppState::new(),
        frame(
            "agent_log",
            json!({ "level": "WARNING", "message": "slow page", "metadata": { "ms": 900 } }),
        ),
    );
    let entry = &state.view().logs.entries[0];

    assert_eq!(entry.level, LogLevel::Warn);
    assert_eq!(entry.metadata, Some(json!({ "ms": 900 })));
    assert_eq!(entry.timestamp, at(10));
}

#[test]
fn data_export_is_replaced_wholesale() {
    init_logging();
    let (state, _) = update(
        AppState::new(),
        frame(
            "data_export_ready",
            json!({ "filename": "a.csv", "item_count": 3, "path": "/tmp/a.csv" }),
        ),
    );
    let (state, _) = update(
        state,
        frame("data_export_ready", json!({ "filename": "b.csv" })),
    );
    let export = state.view().export;

    assert!(export.available);
    assert_eq!(export.filename.as_deref(), Some("b.csv"));
    assert_eq!(export.item_count, None);
    assert_eq!(export.path, None);
}

#[test]
fn streamed_assistant_reply_lands_as_one_message() {
    init_logging();
    let state = with_conversation();
    let (state, _) = update(state, frame("assistant_thinking", json!({})));
    assert!(state.view().thinking);

    let (state, effects) = update(
        state,
        frame("assistant_message_chunk", json!({ "chunk": "Hello, " })),
    );
    assert!(effects.is_empty(), "chunks are not persisted");
    let (state, _) = update(
        state,
        frame("assistant_message_chunk", json!({ "chunk": "world" })),
    );
    assert_eq!(state.view().draft.as_deref(), Some("Hello, world"));
    assert!(state.view().messages.is_empty());

    let (state, effects) = update(state, frame("assistant_message_complete", json!({})));
    let view = state.view();

    assert_eq!(effects.len(), 1);
    assert!(!view.thinking);
    assert_eq!(view.draft, None);
    assert_eq!(view.messages.len(), 1);
    assert_eq!(view.messages[0].sender, Sender::Assistant);
    assert_eq!(view.messages[0].content, "Hello, world");
}

#[test]
fn assistant_error_drops_the_draft() {
    init_logging();
    let state = with_conversation();
    let (state, _) = update(
        state,
        frame("assistant_message_chunk", json!({ "content": "partial" })),
    );
    let (state, _) = update(state, frame("assistant_error", json!({ "error": "model overloaded" })));
    let view = state.view();

    assert_eq!(view.draft, None);
    assert_eq!(view.messages.len(), 1);
    assert_eq!(view.messages[0].sender, Sender::System);
    assert_eq!(view.messages[0].content, "Assistant error: model overloaded");
    assert_eq!(view.logs.entries[0].level, LogLevel::Error);
}
