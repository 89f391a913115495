//! Integration tests for the UI and background channels
//!
//! These tests verify:
//! - The configure/connect/start/stop handshakes and their pending results
//! - Supersede, timeout and cancellation of pending results
//! - UI relay of state changes
//! - Transport failures and rebinding on the background channel

use std::sync::Arc;
use std::time::Duration;

use bridge_desktop::{HeadlessSessionHost, LoopbackTransport, SqliteSettingsStore};
use bridge_traits::channel::{MethodCall, MethodTransport};
use bridge_traits::error::BridgeError;
use core_runtime::SessionConfig;
use core_session::{
    AudioProcessingState, MediaItem, PlaybackState, SessionBridge, SessionError, TransportControl,
};
use mockall::mock;
use serde_json::{json, Value};

mock! {
    pub Transport {}

    #[async_trait::async_trait]
    impl MethodTransport for Transport {
        fn name(&self) -> &str;
        async fn invoke(&self, call: MethodCall) -> bridge_traits::error::Result<()>;
        async fn invoke_with_result(&self, call: MethodCall) -> bridge_traits::error::Result<Value>;
    }
}

async fn bridge_with(config: SessionConfig) -> Arc<SessionBridge> {
    SessionBridge::builder()
        .with_config(config)
        .with_host(Arc::new(HeadlessSessionHost::new()))
        .build()
        .await
        .unwrap()
}

async fn bridge() -> Arc<SessionBridge> {
    bridge_with(SessionConfig::default()).await
}

/// Waits until the bridge has `count` outstanding pending results.
async fn wait_for_pending(bridge: &SessionBridge, count: usize) {
    while bridge.pending_count() != count {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Handshakes
// ============================================================================

#[tokio::test]
async fn test_configure_completes_on_session_connect() {
    let settings = Arc::new(SqliteSettingsStore::in_memory().await.unwrap());
    let bridge = SessionBridge::builder()
        .with_host(Arc::new(HeadlessSessionHost::new()))
        .with_settings_store(settings.clone())
        .build()
        .await
        .unwrap();

    let configure = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move {
            bridge
                .dispatch_client_call(MethodCall::new(
                    "configure",
                    json!({"config": {
                        "androidResumeOnClick": false,
                        "androidNotificationChannelName": "Playback"
                    }}),
                ))
                .await
        }
    });

    wait_for_pending(&bridge, 1).await;
    bridge.on_session_connected().await;

    assert_eq!(configure.await.unwrap().unwrap(), json!({}));
    assert!(!bridge.config().resume_on_click);

    let persisted = SessionConfig::load(settings.as_ref()).await.unwrap();
    assert!(!persisted.resume_on_click);
    assert_eq!(persisted.notification_channel_name.as_deref(), Some("Playback"));
}

#[tokio::test]
async fn test_persisted_config_survives_restart() -> anyhow::Result<()> {
    let settings = Arc::new(SqliteSettingsStore::in_memory().await?);
    SessionConfig::builder()
        .resume_on_click(false)
        .notification_color(0xFF00FF00)
        .build()?
        .save(settings.as_ref())
        .await?;

    let bridge = SessionBridge::builder()
        .with_host(Arc::new(HeadlessSessionHost::new()))
        .with_settings_store(settings)
        .build()
        .await?;

    let config = bridge.config();
    assert!(!config.resume_on_click);
    assert_eq!(config.notification_color(), Some(0xFF00FF00));
    Ok(())
}

#[tokio::test]
async fn test_configure_after_connect_is_immediate() {
    let bridge = bridge().await;
    bridge.on_session_connected().await;

    let reply = bridge
        .dispatch_client_call(MethodCall::new("configure", json!({"config": {}})))
        .await
        .unwrap();
    assert_eq!(reply, json!({}));
    assert_eq!(bridge.pending_count(), 0);
}

#[tokio::test]
async fn test_invalid_configure_is_rejected() {
    let bridge = bridge().await;
    let result = bridge
        .dispatch_client_call(MethodCall::new(
            "configure",
            json!({"config": {
                "androidNotificationOngoing": true,
                "androidStopForegroundOnPause": false
            }}),
        ))
        .await;
    assert!(matches!(result, Err(SessionError::Runtime(_))));
    assert_eq!(bridge.pending_count(), 0);
}

#[tokio::test]
async fn test_connect_start_stop_handshake() {
    let bridge = bridge().await;
    let background = Arc::new(LoopbackTransport::new("background"));
    bridge.bind_handler(background.clone());

    let connect = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move { bridge.dispatch_client_call(MethodCall::bare("connect")).await }
    });
    wait_for_pending(&bridge, 1).await;
    bridge.dispatch_handler_call(MethodCall::bare("ready")).await.unwrap();
    assert!(connect.await.unwrap().is_ok());

    assert_eq!(
        bridge.dispatch_client_call(MethodCall::bare("isRunning")).await.unwrap(),
        json!(false)
    );

    let start = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move { bridge.dispatch_client_call(MethodCall::bare("start")).await }
    });
    wait_for_pending(&bridge, 1).await;
    bridge.dispatch_handler_call(MethodCall::bare("started")).await.unwrap();
    assert!(start.await.unwrap().is_ok());
    assert_eq!(
        bridge.dispatch_client_call(MethodCall::bare("isRunning")).await.unwrap(),
        json!(true)
    );

    let stop = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move { bridge.dispatch_client_call(MethodCall::bare("stop")).await }
    });
    assert_eq!(background.next_call().await.map(|c| c.method), Some("stop".to_string()));
    bridge.dispatch_handler_call(MethodCall::bare("stopped")).await.unwrap();
    assert!(stop.await.unwrap().is_ok());
    assert_eq!(
        bridge.dispatch_client_call(MethodCall::bare("isRunning")).await.unwrap(),
        json!(false)
    );
}

#[tokio::test]
async fn test_stop_when_not_running_is_immediate() {
    let bridge = bridge().await;
    assert_eq!(
        bridge.dispatch_client_call(MethodCall::bare("stop")).await.unwrap(),
        json!({})
    );
}

// ============================================================================
// Pending results
// ============================================================================

#[tokio::test]
async fn test_second_connect_supersedes_first() {
    let bridge = bridge().await;

    let first = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move { bridge.dispatch_client_call(MethodCall::bare("connect")).await }
    });
    wait_for_pending(&bridge, 1).await;

    let second = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move { bridge.dispatch_client_call(MethodCall::bare("connect")).await }
    });

    assert!(matches!(
        first.await.unwrap(),
        Err(SessionError::Superseded { .. })
    ));
    wait_for_pending(&bridge, 1).await;
    bridge.dispatch_handler_call(MethodCall::bare("ready")).await.unwrap();
    assert_eq!(second.await.unwrap().unwrap(), json!({}));
    assert_eq!(bridge.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pending_result_times_out() {
    let config = SessionConfig::builder()
        .pending_result_timeout(Some(Duration::from_secs(30)))
        .build()
        .unwrap();
    let bridge = bridge_with(config).await;

    let result = bridge.dispatch_client_call(MethodCall::bare("start")).await;
    assert!(matches!(result, Err(SessionError::TimedOut { .. })));
    assert_eq!(bridge.pending_count(), 0);

    // A late report finds nothing to complete
    bridge.dispatch_handler_call(MethodCall::bare("started")).await.unwrap();
}

#[tokio::test]
async fn test_destroy_cancels_pending_results() {
    let bridge = bridge().await;
    let start = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move { bridge.dispatch_client_call(MethodCall::bare("start")).await }
    });
    wait_for_pending(&bridge, 1).await;

    bridge.destroy().await;
    bridge.destroy().await;

    assert!(matches!(
        start.await.unwrap(),
        Err(SessionError::Cancelled { .. })
    ));
    assert!(bridge.is_destroyed());
    assert_eq!(bridge.lifecycle_stats().teardowns, 1);
}

// ============================================================================
// UI relay
// ============================================================================

#[tokio::test]
async fn test_state_changes_are_relayed_to_ui() {
    let bridge = bridge().await;
    let ui = Arc::new(LoopbackTransport::new("ui"));
    bridge.bind_client(ui.clone());

    bridge
        .set_state(PlaybackState::new(AudioProcessingState::Ready, true).with_position(1500))
        .await
        .unwrap();

    let call = ui.next_call().await.unwrap();
    assert_eq!(call.method, "onPlaybackStateChanged");
    let state = &call.arguments["state"];
    assert_eq!(state["processingState"], json!(3));
    assert_eq!(state["playing"], json!(true));
    assert_eq!(state["updatePosition"], json!(1500));
    assert!(state["systemActions"]
        .as_array()
        .unwrap()
        .contains(&json!(9)));
}

#[tokio::test]
async fn test_session_connect_replays_current_state() {
    let bridge = bridge().await;
    let ui = Arc::new(LoopbackTransport::new("ui"));
    bridge.bind_client(ui.clone());

    bridge
        .set_queue(vec![MediaItem::new("a", "A"), MediaItem::new("b", "B")])
        .await
        .unwrap();
    bridge
        .set_media_item(MediaItem::new("b", "B"))
        .await
        .unwrap();
    bridge.on_session_connected().await;

    let mut methods = Vec::new();
    for _ in 0..5 {
        methods.push(ui.next_call().await.unwrap().method);
    }
    assert_eq!(
        methods,
        vec![
            "onQueueChanged",
            "onMediaItemChanged",
            "onPlaybackStateChanged",
            "onQueueChanged",
            "onMediaItemChanged"
        ]
    );
    let calls = ui.calls();
    assert_eq!(calls[2].arguments["state"]["processingState"], json!(0));
    assert_eq!(calls[3].arguments["queue"][1]["id"], json!("b"));
    assert_eq!(calls[4].arguments["mediaItem"]["title"], json!("B"));
}

// ============================================================================
// Background transport
// ============================================================================

#[tokio::test]
async fn test_transport_failure_reports_false() {
    let bridge = bridge().await;
    let mut transport = MockTransport::new();
    transport.expect_name().return_const("mock".to_string());
    transport
        .expect_invoke()
        .withf(|call| call.method == "play")
        .times(1)
        .returning(|call| {
            Err(BridgeError::Transport {
                method: call.method,
                message: "engine detached".to_string(),
            })
        });
    bridge.bind_handler(Arc::new(transport));

    assert!(!bridge.on_transport_control(TransportControl::Play).await);
}

#[tokio::test]
async fn test_browse_query_uses_remote_reply() {
    let bridge = bridge().await;
    let mut transport = MockTransport::new();
    transport.expect_name().return_const("mock".to_string());
    transport
        .expect_invoke_with_result()
        .withf(|call| {
            call.method == "onSearch" && call.arguments["query"] == json!("jazz")
        })
        .times(1)
        .returning(|_| {
            Ok(json!({"mediaItems": [{"id": "song9", "title": "So What"}]}))
        });
    bridge.bind_handler(Arc::new(transport));

    let results = bridge.search("jazz", None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(bridge.cached_item("song9").title, "So What");
}

#[tokio::test]
async fn test_malformed_browse_reply_is_none() {
    let bridge = bridge().await;
    let mut transport = MockTransport::new();
    transport.expect_name().return_const("mock".to_string());
    transport
        .expect_invoke_with_result()
        .returning(|_| Ok(json!({"children": "not a list"})));
    bridge.bind_handler(Arc::new(transport));

    assert!(bridge.get_children("root", None).await.is_none());
}

#[tokio::test]
async fn test_rebind_routes_new_calls_to_new_transport() {
    let bridge = bridge().await;
    let placeholder = Arc::new(LoopbackTransport::new("placeholder"));
    let engine = Arc::new(LoopbackTransport::new("engine"));

    let first = bridge.bind_handler(placeholder.clone());
    assert!(bridge.on_transport_control(TransportControl::Pause).await);
    let second = bridge.bind_handler(engine.clone());
    assert!(second > first);
    assert!(bridge.on_transport_control(TransportControl::Play).await);

    assert_eq!(placeholder.calls(), vec![MethodCall::bare("pause")]);
    assert_eq!(engine.calls(), vec![MethodCall::bare("play")]);
}
