mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{init_logging, ScriptedTransport};
use taskstream_core::{ConnectionState, ControlAction, OutboundCommand};
use taskstream_engine::{
    ConnectionActor, ConnectionHandle, ConnectionSettings, OutboundSender, RetryPolicy, SendError,
    SendFailure,
};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn task(name: &str) -> OutboundCommand {
    OutboundCommand::Task {
        task: name.to_string(),
        llm_model: "gpt-4o".to_string(),
        metadata: None,
    }
}

fn actor(transport: &ScriptedTransport, cancel: &CancellationToken) -> ConnectionHandle {
    init_logging();
    let (notices, _) = mpsc::unbounded_channel();
    let (handle, _task) = ConnectionActor::spawn(
        ConnectionSettings::default(),
        Arc::new(transport.clone()),
        notices,
        cancel.clone(),
    );
    handle
}

#[tokio::test(start_paused = true)]
async fn queued_commands_go_out_in_order_once_open() {
    let (transport, mut links) = ScriptedTransport::new();
    let cancel = CancellationToken::new();
    let connection = actor(&transport, &cancel);
    let (failures_tx, mut failures) = mpsc::unbounded_channel();
    let (sender, _task) = OutboundSender::spawn(
        connection.clone(),
        RetryPolicy::default(),
        failures_tx,
        cancel.clone(),
    );

    // Not connected yet: the first send triggers the connection itself.
    sender.enqueue(task("first"));
    sender.enqueue(OutboundCommand::Control {
        action: ControlAction::Pause,
        task_id: None,
    });
    sender.enqueue(task("third"));

    let mut link = links.recv().await.expect("link");
    let mut sent = Vec::new();
    for _ in 0..4 {
        sent.push(link.next_sent().await.expect("frame"));
    }
    assert!(sent[0].contains("handshake"));
    assert!(sent[1].contains("\"first\""));
    assert!(sent[2].contains("\"pause\""));
    assert!(sent[3].contains("\"third\""));
    assert!(failures.try_recv().is_err());
    assert_eq!(connection.state(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_exactly_one_failure() {
    let (transport, _links) = ScriptedTransport::new();
    transport.refuse(true);
    let cancel = CancellationToken::new();
    let connection = actor(&transport, &cancel);
    let (failures_tx, mut failures) = mpsc::unbounded_channel();
    let (sender, _task) = OutboundSender::spawn(
        connection,
        RetryPolicy::default(),
        failures_tx,
        cancel.clone(),
    );

    let started = Instant::now();
    sender.enqueue(task("never delivered"));
    let (command, failure) = failures.recv().await.expect("failure");

    assert_eq!(command, task("never delivered"));
    assert!(matches!(
        failure,
        SendFailure::Exhausted {
            attempts: 3,
            last: SendError::NotOpen
        }
    ));
    assert_eq!(started.elapsed(), Duration::from_secs(2));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(failures.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn cancellation_drops_in_flight_retry_silently() {
    let (transport, _links) = ScriptedTransport::new();
    transport.refuse(true);
    let cancel = CancellationToken::new();
    let connection = actor(&transport, &cancel);
    let (failures_tx, mut failures) = mpsc::unbounded_channel();
    let (sender, task_handle) = OutboundSender::spawn(
        connection,
        RetryPolicy::default(),
        failures_tx,
        cancel.clone(),
    );

    sender.enqueue(task("in flight"));
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    cancel.cancel();
    task_handle.await.expect("worker exits");

    assert!(failures.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn disconnect_stops_a_retrying_send_from_reopening_the_link() {
    let (transport, _links) = ScriptedTransport::new();
    transport.refuse(true);
    let cancel = CancellationToken::new();
    let connection = actor(&transport, &cancel);
    let (failures_tx, mut failures) = mpsc::unbounded_channel();
    let (sender, _task) = OutboundSender::spawn(
        connection.clone(),
        RetryPolicy::default(),
        failures_tx,
        cancel.clone(),
    );

    sender.enqueue(task("while going offline"));
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(transport.opens(), 1);
    connection.disconnect();

    let (command, failure) = failures.recv().await.expect("failure");
    assert_eq!(command, task("while going offline"));
    assert!(matches!(failure, SendFailure::Disconnected));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.opens(), 1);
    assert!(connection.is_held());
    assert_eq!(connection.state(), ConnectionState::Closed);
    assert!(failures.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn connect_after_disconnect_lets_sends_reconnect_again() {
    let (transport, mut links) = ScriptedTransport::new();
    let cancel = CancellationToken::new();
    let connection = actor(&transport, &cancel);
    let (failures_tx, mut failures) = mpsc::unbounded_channel();
    let (sender, _task) = OutboundSender::spawn(
        connection.clone(),
        RetryPolicy::default(),
        failures_tx,
        cancel.clone(),
    );

    connection.disconnect();
    connection.connect();
    let mut link = links.recv().await.expect("link");
    assert!(!connection.is_held());

    sender.enqueue(task("back online"));
    assert!(link.next_sent().await.is_some_and(|frame| frame.contains("handshake")));
    assert!(link.next_sent().await.is_some_and(|frame| frame.contains("back online")));
    assert!(failures.try_recv().is_err());
}
