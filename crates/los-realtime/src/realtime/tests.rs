use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::{mpsc, Notify};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::fake_server::{FakeServer, RecordingAuthorizer, WAIT};
use crate::{
    ChannelAuthorizer, ConnectionState, DomainEvent, EchoManager, Member, PresenceCallbacks,
    RealtimeConfig, RealtimeError, SubscriptionState,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config_for(server: &FakeServer) -> RealtimeConfig {
    RealtimeConfig {
        app_key: "test-key".into(),
        host: "127.0.0.1".into(),
        port: server.addr().port(),
        force_tls: false,
        connect_timeout_secs: 5,
        reconnect_delay_secs: 0,
        max_reconnect_delay_secs: 0,
        ..Default::default()
    }
}

fn manager_for(server: &FakeServer, authorizer: &Arc<RecordingAuthorizer>) -> EchoManager {
    let authorizer = Arc::clone(authorizer);
    EchoManager::with_authorizer_factory(config_for(server), move |_token: &str| {
        Arc::clone(&authorizer) as Arc<dyn ChannelAuthorizer>
    })
}

#[derive(Debug)]
enum Hooked {
    Here(Vec<Member>),
    Error(RealtimeError),
    Update(DomainEvent),
}

fn recording_callbacks() -> (PresenceCallbacks, mpsc::UnboundedReceiver<Hooked>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (here, error, update) = (tx.clone(), tx.clone(), tx);
    let callbacks = PresenceCallbacks::new()
        .here(move |members| {
            let _ = here.send(Hooked::Here(members));
        })
        .error(move |err| {
            let _ = error.send(Hooked::Error(err));
        })
        .on_update(move |event| {
            let _ = update.send(Hooked::Update(event));
        });
    (callbacks, rx)
}

async fn next_hook(rx: &mut mpsc::UnboundedReceiver<Hooked>) -> Hooked {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for a hook")
        .expect("hooks were released")
}

async fn expect_update(rx: &mut mpsc::UnboundedReceiver<Hooked>) -> DomainEvent {
    match next_hook(rx).await {
        Hooked::Update(event) => event,
        other => panic!("expected update, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Connection Manager
// ---------------------------------------------------------------------------

#[tokio::test]
async fn initialize_closes_previous_connection_first() {
    let mut server = FakeServer::start().await;
    let authorizer = Arc::new(RecordingAuthorizer::default());
    let mut manager = manager_for(&server, &authorizer);
    assert_eq!(manager.state(), ConnectionState::Uninitialized);

    let first = manager.initialize("token-a").await;
    let mut conn_a = server.accept().await;
    assert_eq!(conn_a.authorization.as_deref(), Some("Bearer token-a"));
    assert!(conn_a.uri.starts_with("/app/test-key?protocol=7&"));
    assert!(first.wait_for(ConnectionState::Open).await);
    assert_eq!(first.socket_id().as_deref(), Some(conn_a.socket_id.as_str()));

    let second = manager.initialize("token-b").await;
    assert_eq!(first.state(), ConnectionState::Closed);
    assert!(conn_a.closed().await);

    let conn_b = server.accept().await;
    assert_eq!(conn_b.authorization.as_deref(), Some("Bearer token-b"));
    assert!(second.wait_for(ConnectionState::Open).await);
    assert_eq!(manager.get().unwrap().token(), "token-b");
    assert_eq!(manager.state(), ConnectionState::Open);
}

#[tokio::test]
async fn disconnect_without_connection_is_a_noop() {
    let mut manager = EchoManager::new(RealtimeConfig::default());
    manager.disconnect().await;
    manager.disconnect().await;

    assert_eq!(manager.state(), ConnectionState::Uninitialized);
    assert_eq!(manager.get().unwrap_err(), RealtimeError::NotInitialized);
    assert!(matches!(
        manager.join_presence_channel(1, PresenceCallbacks::new()),
        Err(RealtimeError::NotInitialized)
    ));
}

#[tokio::test]
async fn disconnect_closes_and_stays_closed() {
    let mut server = FakeServer::start().await;
    let authorizer = Arc::new(RecordingAuthorizer::default());
    let mut manager = manager_for(&server, &authorizer);

    let connection = manager.initialize("tok").await;
    let mut conn = server.accept().await;
    assert!(connection.wait_for(ConnectionState::Open).await);

    manager.disconnect().await;
    assert_eq!(manager.state(), ConnectionState::Closed);
    assert!(connection.is_closed());
    assert!(conn.closed().await);

    // The task has exited; a state it never reached resolves to false.
    assert!(!connection.wait_for(ConnectionState::Open).await);
    assert!(connection.wait_for(ConnectionState::Closed).await);

    manager.disconnect().await;
    assert_eq!(manager.state(), ConnectionState::Closed);
    assert_eq!(manager.get().unwrap_err(), RealtimeError::NotInitialized);
}

#[tokio::test]
async fn join_or_initialize_connects_when_needed() {
    let mut server = FakeServer::start().await;
    let authorizer = Arc::new(RecordingAuthorizer::default());
    let mut manager = manager_for(&server, &authorizer);

    let session = manager
        .join_or_initialize("tok", 42, PresenceCallbacks::new())
        .await;
    let mut conn = server.accept().await;
    assert_eq!(conn.authorization.as_deref(), Some("Bearer tok"));
    let frame = conn.expect("pusher:subscribe").await;
    assert_eq!(frame["data"]["channel"], session.wire_name());

    // Already initialized: no second connection.
    let _other = manager
        .join_or_initialize("other", 43, PresenceCallbacks::new())
        .await;
    assert!(server.idle_for(Duration::from_millis(200)).await);
    assert_eq!(manager.get().unwrap().token(), "tok");
}

// ---------------------------------------------------------------------------
// Presence Sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn join_subscribes_with_grant_and_reports_here() {
    let mut server = FakeServer::start().await;
    let authorizer = Arc::new(RecordingAuthorizer::default());
    let mut manager = manager_for(&server, &authorizer);
    manager.initialize("tok").await;
    let mut conn = server.accept().await;

    let (callbacks, mut hooks) = recording_callbacks();
    let session = manager.join_presence_channel(42, callbacks).unwrap();
    assert_eq!(session.name(), "user.42");
    assert_eq!(session.wire_name(), "presence-user.42");

    let frame = conn.expect("pusher:subscribe").await;
    assert_eq!(frame["data"]["channel"], "presence-user.42");
    assert_eq!(frame["data"]["auth"], "test-key:presence-user.42");
    assert_eq!(
        authorizer.calls(),
        vec![(conn.socket_id.clone(), "presence-user.42".to_string())]
    );

    conn.subscription_succeeded("presence-user.42", "42");
    match next_hook(&mut hooks).await {
        Hooked::Here(members) => {
            assert_eq!(members.len(), 1);
            assert_eq!(members[0].id, "42");
        }
        other => panic!("expected here, got {other:?}"),
    }
    assert_eq!(session.state(), SubscriptionState::Subscribed);

    let named = manager
        .join_presence_channel("abc", PresenceCallbacks::new())
        .unwrap();
    assert_eq!(named.name(), "user.abc");
}

#[tokio::test]
async fn events_arrive_in_order_and_stop_after_unsubscribe() {
    let mut server = FakeServer::start().await;
    let authorizer = Arc::new(RecordingAuthorizer::default());
    let mut manager = manager_for(&server, &authorizer);
    manager.initialize("tok").await;
    let mut conn = server.accept().await;

    let (callbacks_a, mut hooks_a) = recording_callbacks();
    let session_a = manager.join_presence_channel(42, callbacks_a).unwrap();
    conn.expect("pusher:subscribe").await;
    conn.subscription_succeeded("presence-user.42", "42");
    assert!(matches!(next_hook(&mut hooks_a).await, Hooked::Here(_)));

    let (callbacks_b, mut hooks_b) = recording_callbacks();
    let _session_b = manager.join_presence_channel(43, callbacks_b).unwrap();
    conn.expect("pusher:subscribe").await;
    conn.subscription_succeeded("presence-user.43", "43");
    assert!(matches!(next_hook(&mut hooks_b).await, Hooked::Here(_)));

    conn.send_update("presence-user.42", json!({ "type": "QUERY_MESSAGE", "message": "first" }));
    conn.send_update("presence-user.42", json!({ "type": "QUERY_MESSAGE", "message": "second" }));
    assert_eq!(expect_update(&mut hooks_a).await.text(), Some("first"));
    assert_eq!(expect_update(&mut hooks_a).await.text(), Some("second"));

    session_a.unsubscribe();
    let frame = conn.expect("pusher:unsubscribe").await;
    assert_eq!(frame["data"]["channel"], "presence-user.42");

    // Frames on one socket are handled in order, so once the event for
    // user.43 arrives the late one for user.42 has been seen and dropped.
    conn.send_update("presence-user.42", json!({ "type": "QUERY_MESSAGE", "message": "late" }));
    conn.send_update("presence-user.43", json!({ "type": "QUERY_MESSAGE", "message": "sync" }));
    assert_eq!(expect_update(&mut hooks_b).await.text(), Some("sync"));
    assert!(hooks_a.try_recv().is_err());

    // A second unsubscribe sends nothing: the next frame is the new subscribe.
    session_a.unsubscribe();
    let _session_c = manager
        .join_presence_channel(44, PresenceCallbacks::new())
        .unwrap();
    let frame = conn.expect("pusher:subscribe").await;
    assert_eq!(frame["data"]["channel"], "presence-user.44");
}

#[tokio::test]
async fn authorization_failure_reaches_error_hook() {
    let mut server = FakeServer::start().await;
    let auth_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/broadcasting/auth"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .expect(1)
        .mount(&auth_server)
        .await;

    let config = RealtimeConfig {
        auth_endpoint: format!("{}/broadcasting/auth", auth_server.uri()),
        ..config_for(&server)
    };
    let mut manager = EchoManager::new(config);
    manager.initialize("tok").await;
    let _conn = server.accept().await;

    let (callbacks, mut hooks) = recording_callbacks();
    let session = manager
        .join_presence_channel(42, callbacks)
        .expect("join must not fail on authorization errors");

    match next_hook(&mut hooks).await {
        Hooked::Error(err) => {
            assert_eq!(err.status(), Some(403));
            assert!(matches!(err, RealtimeError::Authorization { .. }));
        }
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(session.state(), SubscriptionState::Failed);
}

#[tokio::test]
async fn subscription_error_reaches_error_hook() {
    let mut server = FakeServer::start().await;
    let authorizer = Arc::new(RecordingAuthorizer::default());
    let mut manager = manager_for(&server, &authorizer);
    manager.initialize("tok").await;
    let mut conn = server.accept().await;

    let (callbacks, mut hooks) = recording_callbacks();
    let session = manager.join_presence_channel(42, callbacks).unwrap();
    conn.expect("pusher:subscribe").await;
    conn.send(json!({
        "event": "pusher:subscription_error",
        "channel": "presence-user.42",
        "data": { "type": "AuthError", "error": "Invalid signature", "status": 401 }
    }));

    match next_hook(&mut hooks).await {
        Hooked::Error(err) => assert_eq!(err.status(), Some(401)),
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(session.state(), SubscriptionState::Failed);
}

#[tokio::test]
async fn late_grant_after_unsubscribe_is_discarded() {
    let mut server = FakeServer::start().await;
    let gate = Arc::new(Notify::new());
    let authorizer = Arc::new(RecordingAuthorizer::gated(Arc::clone(&gate)));
    let mut manager = manager_for(&server, &authorizer);
    let connection = manager.initialize("tok").await;
    let mut conn = server.accept().await;
    assert!(connection.wait_for(ConnectionState::Open).await);

    let (callbacks, mut hooks) = recording_callbacks();
    let session = manager.join_presence_channel(42, callbacks).unwrap();
    authorizer.wait_for_calls(1).await;
    session.unsubscribe();
    gate.notify_one();

    conn.expect("pusher:unsubscribe").await;

    let _next = manager
        .join_presence_channel(43, PresenceCallbacks::new())
        .unwrap();
    gate.notify_one();
    let frame = conn.expect("pusher:subscribe").await;
    assert_eq!(frame["data"]["channel"], "presence-user.43");
    assert!(hooks.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[tokio::test]
async fn server_ping_is_answered() {
    let mut server = FakeServer::start().await;
    let authorizer = Arc::new(RecordingAuthorizer::default());
    let mut manager = manager_for(&server, &authorizer);
    manager.initialize("tok").await;
    let mut conn = server.accept().await;

    conn.send(json!({ "event": "pusher:ping", "data": {} }));
    conn.expect("pusher:pong").await;
}

#[tokio::test]
async fn reconnect_reports_failure_and_reauthorizes() {
    let mut server = FakeServer::start().await;
    let authorizer = Arc::new(RecordingAuthorizer::default());
    let mut manager = manager_for(&server, &authorizer);
    manager.initialize("tok").await;
    let mut first = server.accept().await;

    let (callbacks, mut hooks) = recording_callbacks();
    let session = manager.join_presence_channel(42, callbacks).unwrap();
    first.expect("pusher:subscribe").await;
    first.subscription_succeeded("presence-user.42", "42");
    assert!(matches!(next_hook(&mut hooks).await, Hooked::Here(_)));

    first.close();
    match next_hook(&mut hooks).await {
        Hooked::Error(RealtimeError::Transport(_)) => {}
        other => panic!("expected transport error, got {other:?}"),
    }

    let mut second = server.accept().await;
    let frame = second.expect("pusher:subscribe").await;
    assert_eq!(frame["data"]["channel"], "presence-user.42");
    let (socket_id, channel) = authorizer.calls().pop().unwrap();
    assert_eq!(socket_id, second.socket_id);
    assert_eq!(channel, "presence-user.42");

    second.subscription_succeeded("presence-user.42", "42");
    assert!(matches!(next_hook(&mut hooks).await, Hooked::Here(_)));
    assert_eq!(session.state(), SubscriptionState::Subscribed);
}

#[tokio::test]
async fn fatal_server_error_closes_without_reconnect() {
    let mut server = FakeServer::start().await;
    let authorizer = Arc::new(RecordingAuthorizer::default());
    let mut manager = manager_for(&server, &authorizer);
    let connection = manager.initialize("tok").await;
    let conn = server.accept().await;
    assert!(connection.wait_for(ConnectionState::Open).await);

    conn.send(json!({
        "event": "pusher:error",
        "data": { "code": 4001, "message": "Application does not exist" }
    }));
    assert!(connection.wait_for(ConnectionState::Closed).await);
    assert!(server.idle_for(Duration::from_millis(300)).await);

    // Joining a dead connection reports through the hook, not the call.
    let (callbacks, mut hooks) = recording_callbacks();
    let session = connection.join(42, callbacks);
    assert!(matches!(
        next_hook(&mut hooks).await,
        Hooked::Error(RealtimeError::Transport(_))
    ));
    assert_eq!(session.state(), SubscriptionState::Failed);
}
