// Integration tests for the streaming session
//
// A client runs against an in-memory server so every frame crossing the
// channel can be inspected and acks can be scripted.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use voice_stream::capture::{FeedCapture, FragmentFeed};
use voice_stream::connection::{MemoryConnector, MemoryPeer, MemoryServer};
use voice_stream::{
    ArmOutcome, ClientHandle, ConnectionState, ErrorKind, Frame, Notification, SessionConfig,
    SessionState, Snapshot, StreamError, StreamingClient,
};

const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    client: ClientHandle,
    notifications: mpsc::UnboundedReceiver<Notification>,
    server: MemoryServer,
    feed: FragmentFeed,
    task: JoinHandle<()>,
}

fn test_config(reconnect_delay: Duration) -> SessionConfig {
    SessionConfig {
        server_url: "memory".to_string(),
        reconnect_delay,
        fragment_slice: Duration::from_millis(100),
    }
}

fn start_with(
    capture: FeedCapture,
    feed: FragmentFeed,
    accepting: bool,
    reconnect_delay: Duration,
) -> Harness {
    let (connector, server) = MemoryConnector::pair();
    server.set_accepting(accepting);

    let (client, notifications, task) = StreamingClient::spawn(
        &test_config(reconnect_delay),
        Arc::new(connector),
        Box::new(capture),
    );

    Harness {
        client,
        notifications,
        server,
        feed,
        task,
    }
}

fn start() -> Harness {
    let (capture, feed) = FeedCapture::new();
    start_with(capture, feed, true, Duration::from_millis(20))
}

impl Harness {
    /// Accept the next channel and wait until the client sees it as connected
    async fn connected(&mut self) -> MemoryPeer {
        let peer = timeout(WAIT, self.server.accept())
            .await
            .expect("timed out waiting for the client to connect")
            .expect("connector dropped");
        self.wait_for(|s| s.connection == ConnectionState::Connected)
            .await;
        peer
    }

    async fn wait_for(&self, predicate: impl Fn(&Snapshot) -> bool) -> Snapshot {
        timeout(WAIT, async {
            loop {
                let snapshot = self.client.snapshot().await.expect("client stopped");
                if predicate(&snapshot) {
                    return snapshot;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for client state")
    }

    async fn wait_for_chunks(&self, chunks: u64) -> Snapshot {
        self.wait_for(|s| {
            s.recording
                .as_ref()
                .map(|r| r.chunk_count == chunks)
                .unwrap_or(false)
        })
        .await
    }

    async fn wait_notification(&mut self, predicate: impl Fn(&Notification) -> bool) {
        timeout(WAIT, async {
            loop {
                let notification = self
                    .notifications
                    .recv()
                    .await
                    .expect("notification channel closed");
                if predicate(&notification) {
                    return;
                }
            }
        })
        .await
        .expect("timed out waiting for notification")
    }

    async fn arm_started(&self) -> String {
        match self.client.arm().await.expect("arm failed") {
            ArmOutcome::Started { session_token } => session_token,
            ArmOutcome::AlreadyActive => panic!("expected a new recording"),
        }
    }
}

async fn next_frame(peer: &mut MemoryPeer) -> Frame {
    timeout(WAIT, peer.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("client closed the channel")
}

fn control_type(frame: &Frame) -> String {
    match frame {
        Frame::Text(text) => {
            let value: Value = serde_json::from_str(text).expect("control frame is JSON");
            value["type"].as_str().expect("control frame has a type").to_string()
        }
        Frame::Binary(bytes) => panic!("expected a control frame, got {} bytes", bytes.len()),
    }
}

async fn assert_silent(peer: &mut MemoryPeer) {
    let next = timeout(Duration::from_millis(100), peer.recv()).await;
    assert!(next.is_err(), "unexpected frame from client: {:?}", next);
}

fn ack(peer: &MemoryPeer, bytes: u64) {
    assert!(peer.send_json(json!({ "type": "audio_chunk_confirmed", "bytes_received": bytes })));
}

#[tokio::test]
async fn test_acks_accumulate_into_counters() {
    let mut h = start();
    let mut peer = h.connected().await;

    h.arm_started().await;
    assert_eq!(control_type(&next_frame(&mut peer).await), "start_recording");

    let sizes = [10usize, 20, 10, 20, 10];
    for (i, size) in sizes.iter().enumerate() {
        assert!(h.feed.push(vec![i as u8; *size]));
    }
    for (i, size) in sizes.iter().enumerate() {
        assert_eq!(next_frame(&mut peer).await, Frame::Binary(vec![i as u8; *size]));
    }

    for size in sizes {
        ack(&peer, size as u64);
    }

    let snapshot = h.wait_for_chunks(5).await;
    let recording = snapshot.recording.unwrap();
    assert_eq!(recording.chunk_count, 5);
    assert_eq!(recording.bytes_sent, 70);
    assert_eq!(recording.fragments_forwarded, 5);
    assert_eq!(snapshot.session, SessionState::Streaming);
    assert!(snapshot.status.starts_with("Recording... "));
    assert!(snapshot.status.contains("Chunks: 5"));
}

#[tokio::test]
async fn test_fragments_keep_production_order() {
    let mut h = start();
    let mut peer = h.connected().await;

    h.arm_started().await;
    next_frame(&mut peer).await;

    let fragments: Vec<Vec<u8>> = (0u16..60)
        .map(|i| i.to_be_bytes().repeat(1 + (i as usize % 7)))
        .collect();
    for fragment in &fragments {
        assert!(h.feed.push(fragment.clone()));
    }

    for expected in fragments {
        assert_eq!(next_frame(&mut peer).await, Frame::Binary(expected));
    }
}

#[tokio::test]
async fn test_arm_while_disconnected_fails() {
    let (capture, feed) = FeedCapture::new();
    let h = start_with(capture, feed, false, Duration::from_millis(20));

    let err = h.client.arm().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ChannelUnavailable);

    let snapshot = h.client.snapshot().await.unwrap();
    assert_eq!(snapshot.session, SessionState::Idle);
    assert!(snapshot.recording.is_none());
    assert_ne!(snapshot.connection, ConnectionState::Connected);
    assert_eq!(snapshot.status, "Connecting to WebSocket...");
    assert!(!h.feed.is_acquired());
}

#[tokio::test]
async fn test_connection_loss_aborts_recording() {
    let mut h = start();
    let mut peer = h.connected().await;

    let first_token = h.arm_started().await;
    next_frame(&mut peer).await;

    for i in 0..3u8 {
        assert!(h.feed.push(vec![i; 16]));
    }
    for _ in 0..3 {
        assert!(next_frame(&mut peer).await.is_binary());
    }
    for _ in 0..3 {
        ack(&peer, 16);
    }
    h.wait_for_chunks(3).await;

    drop(peer);

    h.wait_for(|s| s.session == SessionState::Idle).await;
    assert!(!h.feed.is_acquired(), "capture must be released on abort");
    assert!(!h.feed.push(vec![99; 16]), "nothing is forwarded after the loss");
    h.wait_notification(|n| matches!(n, Notification::Error(text) if text.contains("Connection lost")))
        .await;

    // Reconnects on its own, but neither re-arms nor sends a late stop
    let mut peer = h.connected().await;
    assert_silent(&mut peer).await;

    let snapshot = h.client.snapshot().await.unwrap();
    assert_eq!(snapshot.session, SessionState::Idle);
    assert_eq!(snapshot.recording.as_ref().unwrap().chunk_count, 3);

    let second_token = h.arm_started().await;
    assert_ne!(first_token, second_token);
    assert_eq!(control_type(&next_frame(&mut peer).await), "start_recording");

    let recording = h.client.snapshot().await.unwrap().recording.unwrap();
    assert_eq!(recording.session_token, second_token);
    assert_eq!(recording.chunk_count, 0);
    assert_eq!(recording.bytes_sent, 0);
}

#[tokio::test]
async fn test_disarm_when_idle_is_noop() {
    let mut h = start();
    let mut peer = h.connected().await;

    assert!(h.client.disarm().await.is_none());
    assert_silent(&mut peer).await;

    let snapshot = h.client.snapshot().await.unwrap();
    assert_eq!(snapshot.session, SessionState::Idle);
    assert!(snapshot.recording.is_none());
}

#[tokio::test]
async fn test_second_arm_is_noop() {
    let mut h = start();
    let mut peer = h.connected().await;

    let token = h.arm_started().await;
    assert_eq!(h.client.arm().await.unwrap(), ArmOutcome::AlreadyActive);

    assert_eq!(control_type(&next_frame(&mut peer).await), "start_recording");
    assert_silent(&mut peer).await;

    let snapshot = h.client.snapshot().await.unwrap();
    assert_eq!(snapshot.session, SessionState::Streaming);
    assert_eq!(snapshot.recording.unwrap().session_token, token);
}

#[tokio::test]
async fn test_disarm_stops_and_keeps_counters() {
    let mut h = start();
    let mut peer = h.connected().await;

    let token = h.arm_started().await;
    next_frame(&mut peer).await;

    assert!(h.feed.push(vec![1; 32]));
    assert!(h.feed.push(vec![2; 32]));
    assert!(next_frame(&mut peer).await.is_binary());
    assert!(next_frame(&mut peer).await.is_binary());

    let summary = h.client.disarm().await.expect("recording was active");
    assert_eq!(summary.session_token, token);
    assert_eq!(summary.fragments_forwarded, 2);
    assert!(!summary.aborted);
    assert!(summary.duration_secs >= 0.0);

    assert_eq!(control_type(&next_frame(&mut peer).await), "stop_recording");
    assert!(!h.feed.is_acquired());

    // Acks lag behind the stop and still count
    ack(&peer, 32);
    ack(&peer, 32);
    let snapshot = h.wait_for_chunks(2).await;
    assert_eq!(snapshot.session, SessionState::Idle);
    assert_eq!(snapshot.recording.as_ref().unwrap().bytes_sent, 64);
    assert_eq!(
        snapshot.status,
        "Connected to WebSocket | Ready to record | Total chunks: 2 | Total bytes: 0.1KB"
    );

    h.arm_started().await;
    let recording = h.client.snapshot().await.unwrap().recording.unwrap();
    assert_eq!(recording.chunk_count, 0);
    assert_eq!(recording.bytes_sent, 0);
}

#[tokio::test]
async fn test_capture_failure_reverts_to_idle() {
    let (capture, feed) =
        FeedCapture::failing(StreamError::PermissionDenied("microphone blocked".to_string()));
    let mut h = start_with(capture, feed, true, Duration::from_millis(20));
    let mut peer = h.connected().await;

    let err = h.client.arm().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let snapshot = h.client.snapshot().await.unwrap();
    assert_eq!(snapshot.session, SessionState::Idle);
    assert!(snapshot.recording.is_none());
    assert_silent(&mut peer).await;

    h.wait_notification(|n| matches!(n, Notification::Error(text) if text.contains("microphone blocked")))
        .await;
}

#[tokio::test]
async fn test_server_messages_are_dispatched() {
    let mut h = start();
    let peer = h.connected().await;

    peer.send_json(json!({ "type": "connection", "connection_id": "conn-42" }));
    h.wait_for(|s| s.connection_id.as_deref() == Some("conn-42"))
        .await;
    h.wait_notification(|n| *n == Notification::System("Connected to server (ID: conn-42)".to_string()))
        .await;

    peer.send_json(json!({ "type": "audio_stream_started", "filename": "streaming_audio_1.webm" }));
    h.wait_notification(|n| {
        *n == Notification::System("Audio file created: streaming_audio_1.webm".to_string())
    })
    .await;

    // Malformed and unexpected frames are ignored
    assert!(peer.to_client.send(Frame::Text("not json".to_string())).is_ok());
    assert!(peer.to_client.send(Frame::Binary(vec![1, 2, 3])).is_ok());
    peer.send_json(json!({ "type": "audio_chunk_confirmed", "bytes_received": "many" }));

    peer.send_json(json!({ "type": "echo", "message": "Server received: hi" }));
    h.wait_notification(|n| *n == Notification::System("Server received: hi".to_string()))
        .await;

    peer.send_json(json!({ "type": "error", "message": "disk full" }));
    h.wait_notification(|n| *n == Notification::Error("disk full".to_string()))
        .await;

    let snapshot = h.client.snapshot().await.unwrap();
    assert_eq!(snapshot.connection, ConnectionState::Connected);
    assert!(snapshot.recording.is_none());
}

#[tokio::test]
async fn test_shutdown_stops_recording_and_closes_channel() {
    let mut h = start();
    let mut peer = h.connected().await;

    h.arm_started().await;
    assert_eq!(control_type(&next_frame(&mut peer).await), "start_recording");

    h.client.shutdown();

    assert_eq!(control_type(&next_frame(&mut peer).await), "stop_recording");
    let closed = timeout(WAIT, peer.recv()).await.expect("channel not closed");
    assert!(closed.is_none());

    timeout(WAIT, &mut h.task)
        .await
        .expect("client did not stop")
        .unwrap();
    assert!(h.client.snapshot().await.is_none());
    assert!(!h.feed.is_acquired());
}

#[tokio::test]
async fn test_refused_fragment_aborts_like_connection_loss() {
    let (capture, feed) = FeedCapture::new();
    let mut h = start_with(capture, feed, true, Duration::from_millis(300));
    let mut peer = h.connected().await;

    h.arm_started().await;
    assert_eq!(control_type(&next_frame(&mut peer).await), "start_recording");

    // The server stops reading while its write half stays open
    let MemoryPeer {
        from_client,
        to_client,
    } = peer;
    drop(from_client);
    assert!(h.feed.push(vec![7; 16]));

    let snapshot = h
        .wait_for(|s| s.session == SessionState::Idle && s.connection != ConnectionState::Connected)
        .await;
    assert_eq!(snapshot.status, "Connecting to WebSocket...");
    assert!(!h.feed.is_acquired());

    let err = h.client.arm().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ChannelUnavailable);

    // Reconnects without waiting for the old channel to close
    let mut peer = h.connected().await;
    assert_silent(&mut peer).await;
    h.arm_started().await;
    assert_eq!(control_type(&next_frame(&mut peer).await), "start_recording");
    drop(to_client);
}

#[tokio::test]
async fn test_dropping_every_handle_stops_client() {
    let mut h = start();
    let mut peer = h.connected().await;

    let Harness {
        client,
        notifications,
        mut server,
        feed,
        task,
    } = h;
    let second = client.clone();
    drop(client);
    assert!(second.snapshot().await.is_some(), "a remaining handle keeps it running");

    drop(second);
    drop(notifications);
    timeout(WAIT, task)
        .await
        .expect("client kept running without handles")
        .unwrap();

    let closed = timeout(WAIT, peer.recv()).await.expect("channel not closed");
    assert!(closed.is_none());
    drop(peer);

    // No reconnect after the client is gone
    let reconnect = timeout(Duration::from_millis(100), server.accept()).await;
    assert!(!matches!(reconnect, Ok(Some(_))), "client reconnected after stopping");
    assert!(!feed.is_acquired());
}
