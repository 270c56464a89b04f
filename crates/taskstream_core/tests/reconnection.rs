use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use taskstream_core::{update, AppState, ConnectionState, Msg};

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::seconds(seconds)
}

fn session_frames() -> Vec<Msg> {
    let frames = [
        json!({ "type": "task_started", "data": { "task_id": "t1", "task": "find hotels" } }),
        json!({ "type": "browser_step", "data": { "step": 1, "url": "https://hotels.example", "goal": "open site" } }),
        json!({ "type": "research.plan_created", "data": { "plan": [{ "name": "Rooms", "tasks": ["a", "b"] }] } }),
        json!({ "type": "research.task_completed", "data": { "category_index": 0, "task_index": 0 } }),
        json!({ "type": "agent_log", "data": { "level": "debug", "message": "scrolling" } }),
        json!({ "type": "status_update", "data": { "currentAction": "reading" } }),
        json!({ "type": "research.task_completed", "data": { "category_index": 0, "task_index": 1, "success": false } }),
        json!({ "type": "data_export_ready", "data": { "filename": "hotels.csv", "item_count": 12 } }),
        json!({ "type": "task_complete", "data": { "task_id": "t1", "result": "3 hotels found" } }),
    ];
    frames
        .iter()
        .enumerate()
        .map(|(index, frame)| Msg::FrameReceived {
            raw: frame.to_string(),
            received_at: at(index as i64),
        })
        .collect()
}

fn prepared() -> AppState {
    let (state, _) = update(
        AppState::new(),
        Msg::NewConversation {
            title: Some("Trip".to_string()),
            at: at(0),
        },
    );
    state
}

#[test]
fn reconnecting_between_frames_leaves_projections_unchanged() {
    let steady = session_frames()
        .into_iter()
        .fold(prepared(), |state, msg| update(state, msg).0);

    let mut with_drops = Vec::new();
    for (index, msg) in session_frames().into_iter().enumerate() {
        if index == 3 || index == 6 {
            with_drops.push(Msg::ConnectionChanged(ConnectionState::Closed));
            with_drops.push(Msg::ConnectionChanged(ConnectionState::Connecting));
            with_drops.push(Msg::ConnectionChanged(ConnectionState::Open));
        }
        with_drops.push(msg);
    }
    let reconnected = with_drops
        .into_iter()
        .fold(prepared(), |state, msg| update(state, msg).0);

    assert_eq!(reconnected.projections(), steady.projections());
    assert_eq!(reconnected.register(), steady.register());
    assert_eq!(reconnected.connection(), ConnectionState::Open);
}

#[test]
fn connection_changes_mark_the_view_dirty_once() {
    let mut state = AppState::new();
    assert!(!state.consume_dirty());

    let (mut state, effects) = update(state, Msg::ConnectionChanged(ConnectionState::Connecting));
    assert!(effects.is_empty());
    assert!(state.consume_dirty());
    assert_eq!(state.view().connection, ConnectionState::Connecting);

    let (mut state, _) = update(state, Msg::ConnectionChanged(ConnectionState::Connecting));
    assert!(!state.consume_dirty());
}
