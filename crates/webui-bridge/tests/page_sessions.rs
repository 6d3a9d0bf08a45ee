//! End-to-end tests: a real bridge with a WebSocket client playing the page.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value as Json};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use webui_bridge::domain::{BridgeConfig, NativeMsg};
use webui_bridge::infrastructure::Bridge;
use webui_core::{Event, Value, WindowId};

type Page = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start(reconnect_grace: Duration) -> Bridge {
    let config = BridgeConfig {
        launch_browser: false,
        reconnect_grace,
        pages_dir: std::env::temp_dir().join(format!("webui-bridge-test-{}", uuid::Uuid::new_v4())),
        ..BridgeConfig::default()
    };
    Bridge::start(config).await.unwrap()
}

async fn send(page: &mut Page, msg: Json) {
    page.send(Message::Text(msg.to_string())).await.unwrap();
}

async fn next_msg(page: &mut Page) -> NativeMsg {
    loop {
        let frame = timeout(Duration::from_secs(5), page.next())
            .await
            .expect("no message within 5s")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Connects as the page of `window` and consumes the Welcome.
async fn connect(bridge: &Bridge, window: WindowId) -> Page {
    let (mut page, _) = connect_async(format!("ws://{}", bridge.local_addr())).await.unwrap();
    send(&mut page, json!({"type": "Hello", "window": window})).await;
    match next_msg(&mut page).await {
        NativeMsg::Welcome { window: greeted, .. } => assert_eq!(greeted, window),
        other => panic!("expected Welcome, got {other:?}"),
    }
    page
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_call_with_response_round_trip() {
    // Arrange
    let bridge = start(Duration::from_millis(200)).await;
    let window = bridge.ui().new_window();
    window
        .bind("handleResp", |e: &Event| -> webui_core::Result<i64> { Ok(e.get_int(0)? * 2) })
        .unwrap();
    window.show("<html>Hi</html>").unwrap();
    let mut page = connect(&bridge, window.id()).await;

    // Act
    send(
        &mut page,
        json!({"type": "Call", "element": "handleResp", "event_number": 1, "args": ["21"]}),
    )
    .await;

    // Assert
    assert_eq!(
        next_msg(&mut page).await,
        NativeMsg::Response {
            event_number: 1,
            value: json!(42)
        }
    );
    bridge.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_call_without_value_settles_with_done() {
    let bridge = start(Duration::from_millis(200)).await;
    let window = bridge.ui().new_window();
    window.bind("handleStr", |_: &Event| ()).unwrap();
    window.show("<html>Hi</html>").unwrap();
    let mut page = connect(&bridge, window.id()).await;

    send(
        &mut page,
        json!({"type": "Call", "element": "handleStr", "event_number": 7, "args": ["Hello", "World"]}),
    )
    .await;

    assert_eq!(next_msg(&mut page).await, NativeMsg::Done { event_number: 7 });
    bridge.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_script_result_comes_back_to_caller() {
    // Arrange
    let bridge = start(Duration::from_millis(200)).await;
    let window = bridge.ui().new_window();
    window.show("<html>Hi</html>").unwrap();
    let mut page = connect(&bridge, window.id()).await;

    let answer = async {
        let NativeMsg::RunScript { seq: Some(seq), script } = next_msg(&mut page).await else {
            panic!("expected a script expecting a result");
        };
        assert_eq!(script, "return 1 + 1;");
        send(&mut page, json!({"type": "ScriptResult", "seq": seq, "value": 2})).await;
    };

    // Act
    let (result, ()) = tokio::join!(window.script("return 1 + 1;", Duration::from_secs(5)), answer);

    // Assert
    assert_eq!(result.unwrap(), Value::Int(2));
    bridge.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_script_before_connect_is_delivered_after_welcome() {
    let bridge = start(Duration::from_millis(200)).await;
    let window = bridge.ui().new_window();
    window.show("<html>Hi</html>").unwrap();
    window.run("document.title = 'queued';").unwrap();

    let mut page = connect(&bridge, window.id()).await;

    assert_eq!(
        next_msg(&mut page).await,
        NativeMsg::RunScript {
            seq: None,
            script: "document.title = 'queued';".into()
        }
    );
    bridge.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_page_gone_past_grace_closes_window() {
    // Arrange
    let bridge = start(Duration::from_millis(100)).await;
    let window = bridge.ui().new_window();
    window.show("<html>Hi</html>").unwrap();
    let mut page = connect(&bridge, window.id()).await;

    // Act
    page.close(None).await.unwrap();

    // Assert
    timeout(Duration::from_secs(5), bridge.ui().wait())
        .await
        .expect("window should close after the grace period");
    assert!(!window.is_shown());
    bridge.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reload_within_grace_keeps_window_open() {
    // Arrange
    let bridge = start(Duration::from_millis(1500)).await;
    let window = bridge.ui().new_window();
    window.show("<html>Hi</html>").unwrap();
    let mut first = connect(&bridge, window.id()).await;

    // Act
    first.close(None).await.unwrap();
    let _second = connect(&bridge, window.id()).await;
    tokio::time::sleep(Duration::from_millis(2000)).await;

    // Assert
    assert!(window.is_shown());
    bridge.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_native_close_reaches_page() {
    let bridge = start(Duration::from_millis(200)).await;
    let window = bridge.ui().new_window();
    window.show("<html>Hi</html>").unwrap();
    let mut page = connect(&bridge, window.id()).await;

    window.close().unwrap();

    assert_eq!(next_msg(&mut page).await, NativeMsg::Close);
    bridge.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_hello_for_unknown_window_is_closed() {
    let bridge = start(Duration::from_millis(200)).await;

    let (mut page, _) = connect_async(format!("ws://{}", bridge.local_addr())).await.unwrap();
    send(&mut page, json!({"type": "Hello", "window": 99})).await;

    assert_eq!(next_msg(&mut page).await, NativeMsg::Close);
    bridge.shutdown().await.unwrap();
}
