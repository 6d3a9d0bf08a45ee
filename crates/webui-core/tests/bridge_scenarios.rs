//! End-to-end scenarios for the bridge core.
//!
//! Each test drives a [`WebUi`] context through its public API with a
//! [`RecordingTransport`] standing in for the browser, covering binding,
//! dispatch, response correlation and window lifecycle together.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;
use webui_core::transport::mock::{Outbound, RecordingTransport};
use webui_core::{
    Content, Event, EventType, InboundEvent, ResponsePayload, Value, WebUi, WebUiError, WindowId,
};

fn context() -> (WebUi, Arc<RecordingTransport>) {
    let transport = RecordingTransport::new();
    (WebUi::new(transport.clone()), transport)
}

/// A fresh, uniquely named directory under the system temp dir.
fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("webui-core-test-{}", Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

#[test]
fn test_handle_int_observes_all_three_arguments() {
    // Arrange
    let (ui, _) = context();
    let window = ui.new_window();
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    assert_ok!(window.bind("handleInt", move |e: &Event| -> webui_core::Result<()> {
        let (a, b, c) = (e.get_int(0)?, e.get_int(1)?, e.get_int(2)?);
        *sink.lock().unwrap() = Some((a, b, c));
        Ok(())
    }));

    // Act
    ui.dispatch(InboundEvent::call(
        window.id(),
        "handleInt",
        1,
        vec![json!(123), json!(456), json!(789)],
    ));

    // Assert
    assert_eq!(*seen.lock().unwrap(), Some((123, 456, 789)));
}

#[test]
fn test_call_native_handlers() {
    let (ui, transport) = context();
    let window = ui.new_window();
    window
        .bind("handleStr", |e: &Event| e.get_string(0).map(|s| format!("{s} World")))
        .unwrap();
    window.bind("handleBool", |e: &Event| e.get_bool(0).map(|b| !b)).unwrap();

    ui.dispatch(InboundEvent::call(window.id(), "handleStr", 1, vec![json!("Hello")]));
    ui.dispatch(InboundEvent::call(window.id(), "handleBool", 2, vec![json!(true)]));

    assert_eq!(
        transport.responses(),
        vec![
            (window.id(), 1, ResponsePayload::Value(json!("Hello World"))),
            (window.id(), 2, ResponsePayload::Value(json!(false))),
        ]
    );
}

#[tokio::test]
async fn test_handle_resp_doubles_and_correlates() {
    // Arrange
    let (ui, transport) = context();
    transport.loop_back_into(Arc::clone(ui.pending()));
    let window = ui.new_window();
    window
        .bind("handleResp", |e: &Event| e.get_int(0).map(|n| n * 2))
        .unwrap();
    let slot = ui.pending().register_at(window.id(), 11).unwrap();

    // Act
    ui.handle_event(InboundEvent::call(window.id(), "handleResp", 11, vec![json!(21)]));

    // Assert
    let value = slot.wait(Duration::from_secs(2)).await;
    assert_eq!(value, Ok(Value::Int(42)));
}

#[tokio::test]
async fn test_destroy_while_pending_fails_with_window_closed() {
    // Arrange
    let (ui, _) = context();
    let window = ui.new_window();
    window.show("<p>pending</p>").unwrap();
    let waiter = {
        let window = window.clone();
        tokio::spawn(async move { window.script("slow()", Duration::from_secs(30)).await })
    };
    while ui.pending().pending(window.id()) == 0 {
        tokio::task::yield_now().await;
    }

    // Act
    window.destroy().unwrap();

    // Assert
    let result = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("pending call stayed blocked")
        .unwrap();
    assert_eq!(result, Err(WebUiError::WindowClosed(window.id())));
}

#[tokio::test]
async fn test_close_fails_pending_slot_and_show_reopens() {
    let (ui, _) = context();
    let window = ui.new_window();
    window.show("<p/>").unwrap();
    let slot = ui.pending().register(window.id()).unwrap();

    window.close().unwrap();
    assert_eq!(
        slot.wait(Duration::from_secs(1)).await,
        Err(WebUiError::WindowClosed(window.id()))
    );
    assert_err!(ui.pending().register(window.id()));

    window.show("<p/>").unwrap();
    assert_ok!(ui.pending().register(window.id()));
}

#[test]
fn test_create_with_id_twice_is_duplicate() {
    let (ui, _) = context();
    assert_ok!(ui.new_window_id(5));
    assert_eq!(
        ui.new_window_id(5).map(|w| w.id()),
        Err(WebUiError::DuplicateId(WindowId::new(5)))
    );
}

#[test]
fn test_get_new_window_id_peeks_without_allocating() {
    let (ui, _) = context();
    ui.new_window_id(1).unwrap();
    let peek = ui.get_new_window_id();
    assert_eq!(peek, ui.get_new_window_id());
    assert_eq!(ui.new_window().id(), peek);
}

#[test]
fn test_rebind_routes_to_latest_callback() {
    let (ui, transport) = context();
    let window = ui.new_window();
    let first = window.bind("f", |_: &Event| "old").unwrap();
    let second = window.bind("f", |_: &Event| "new").unwrap();
    assert_ne!(first, second);

    ui.dispatch(InboundEvent::call(window.id(), "f", 1, vec![]));

    assert_eq!(
        transport.responses(),
        vec![(window.id(), 1, ResponsePayload::Value(json!("new")))]
    );
}

#[test]
fn test_wildcard_receives_clicks_without_specific_binding() {
    let (ui, _) = context();
    let window = ui.new_window();
    let clicks = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&clicks);
    window
        .bind("", move |e: &Event| {
            if e.event_type == EventType::MouseClick {
                sink.lock().unwrap().push(e.element.clone());
            }
        })
        .unwrap();
    window.bind("save", |_: &Event| ()).unwrap();

    for element in ["open", "save", "quit"] {
        ui.dispatch(InboundEvent::notify(window.id(), EventType::MouseClick, element, 0));
    }

    assert_eq!(*clicks.lock().unwrap(), vec!["open".to_string(), "quit".to_string()]);
}

#[test]
fn test_serve_folder_resolves_files_against_root() {
    // Arrange
    let root = scratch_dir();
    fs::write(root.join("index.html"), "<html></html>").unwrap();
    let (ui, transport) = context();
    ui.set_default_root_folder(&root).unwrap();
    let first = ui.new_window_id(1).unwrap();
    let second = ui.new_window_id(2).unwrap();

    // Act
    first.show("index.html").unwrap();
    second.show("index.html").unwrap();

    // Assert
    let files: Vec<Content> = transport
        .sent()
        .into_iter()
        .filter_map(|o| match o {
            Outbound::Present(req) => Some(req.content),
            _ => None,
        })
        .collect();
    assert_eq!(
        files,
        vec![
            Content::File(root.join("index.html")),
            Content::File(root.join("index.html")),
        ]
    );
    fs::remove_dir_all(&root).ok();
}

#[test]
fn test_window_root_folder_overrides_default() {
    let default_root = scratch_dir();
    let own_root = scratch_dir();
    fs::write(own_root.join("page.html"), "<p/>").unwrap();
    let (ui, _) = context();
    ui.set_default_root_folder(&default_root).unwrap();
    let window = ui.new_window();
    window.set_root_folder(&own_root).unwrap();

    assert_ok!(window.show("page.html"));

    fs::remove_dir_all(&default_root).ok();
    fs::remove_dir_all(&own_root).ok();
}

#[test]
fn test_set_root_folder_rejects_missing_and_file_paths() {
    let root = scratch_dir();
    let file = root.join("not-a-dir.txt");
    fs::write(&file, "x").unwrap();
    let (ui, _) = context();
    let window = ui.new_window();

    assert!(matches!(
        window.set_root_folder(root.join("missing")),
        Err(WebUiError::PathError { .. })
    ));
    assert!(matches!(
        window.set_root_folder(&file),
        Err(WebUiError::PathError { .. })
    ));
    fs::remove_dir_all(&root).ok();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_events_on_many_windows_all_answered() {
    // Arrange
    let (ui, transport) = context();
    let windows: Vec<_> = (0..4).map(|_| ui.new_window()).collect();
    for window in &windows {
        window.bind("echo", |e: &Event| e.get_int(0)).unwrap();
    }

    // Act
    for (i, window) in windows.iter().enumerate() {
        for n in 0..25_u64 {
            ui.handle_event(InboundEvent::call(window.id(), "echo", n, vec![json!(i)]));
        }
    }
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while transport.responses().len() < 100 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // Assert
    let responses = transport.responses();
    assert_eq!(responses.len(), 100);
    for (i, window) in windows.iter().enumerate() {
        let numbers: Vec<u64> = responses
            .iter()
            .filter(|(w, _, _)| *w == window.id())
            .map(|(_, n, payload)| {
                assert_eq!(payload, &ResponsePayload::Value(json!(i)));
                *n
            })
            .collect();
        // Arrival order is kept within a window.
        assert_eq!(numbers, (0..25).collect::<Vec<u64>>());
    }
}
