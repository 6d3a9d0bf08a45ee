//! Demo programs run by the `webui-bridge` binary.

use std::path::Path;

use tracing::info;
use webui_core::{Event, WebUi};

// ── minimal ───────────────────────────────────────────────────────────────────

const MINIMAL_DOC: &str = "<html><head></head> Hello World</html>";

/// One window showing "Hello World".
pub fn minimal(ui: &WebUi) -> anyhow::Result<()> {
    let window = ui.new_window();
    window.show(MINIMAL_DOC)?;
    Ok(())
}

// ── call-native ───────────────────────────────────────────────────────────────

const CALL_NATIVE_DOC: &str = r#"<!doctype html>
<html>
  <head>
    <title>Call native code from JavaScript</title>
    <style>
      body {
        background: linear-gradient(to left, #36265a, #654da9);
        color: AliceBlue;
        font: 16px sans-serif;
        text-align: center;
        margin-top: 30px;
      }
      button {
        margin: 5px 0 10px;
      }
    </style>
  </head>
  <body>
    <h1>WebUI - Call native code from JavaScript</h1>
    <p>Call native functions with arguments (<em>see the logs in your terminal</em>)</p>
    <button onclick="webui.handleStr('Hello', 'World');">Call handleStr()</button>
    <br />
    <button onclick="webui.handleInt(123, 456, 789);">Call handleInt()</button>
    <br />
    <button onclick="webui.handleBool(true, false);">Call handleBool()</button>
    <p>Call a native function that returns a response</p>
    <button onclick="getResponse();">Call handleResp()</button>
    <div>Double: <input type="text" id="input-number" value="2" /></div>
    <script>
      async function getResponse() {
        const input = document.getElementById('input-number');
        input.value = await webui.handleResp(input.value);
      }
    </script>
  </body>
</html>"#;

fn handle_str(e: &Event) -> webui_core::Result<()> {
    let first = e.get_string(0)?;
    let second = e.get_string(1)?;
    info!("handleStr 1: {first}");
    info!("handleStr 2: {second}");
    Ok(())
}

fn handle_int(e: &Event) -> webui_core::Result<()> {
    for index in 0..3 {
        info!("handleInt {}: {}", index + 1, e.get_int(index)?);
    }
    Ok(())
}

fn handle_bool(e: &Event) -> webui_core::Result<()> {
    info!("handleBool 1: {}", e.get_bool(0)?);
    info!("handleBool 2: {}", e.get_bool(1)?);
    Ok(())
}

/// Doubles its argument.  The page sends the input field's text, which
/// decodes as an integer.
fn handle_resp(e: &Event) -> webui_core::Result<i64> {
    Ok(e.get_int(0)? * 2)
}

/// One window whose buttons call four native functions.
pub fn call_native(ui: &WebUi) -> anyhow::Result<()> {
    let window = ui.new_window();
    window.bind("handleStr", handle_str)?;
    window.bind("handleInt", handle_int)?;
    window.bind("handleBool", handle_bool)?;
    window.bind("handleResp", handle_resp)?;
    window.show(CALL_NATIVE_DOC)?;
    Ok(())
}

// ── serve-folder ──────────────────────────────────────────────────────────────

/// Two windows (ids 1 and 2) serving pages from `root`.
///
/// `root` must contain `index.html` and `second.html`.
pub fn serve_folder(ui: &WebUi, root: &Path) -> anyhow::Result<()> {
    ui.set_default_root_folder(root)?;
    let first = ui.new_window_id(1)?;
    let second = ui.new_window_id(2)?;

    let target = first.clone();
    first.bind("switch-to-second-page", move |_: &Event| target.show("second.html"))?;
    let target = first.clone();
    first.bind("go-back", move |_: &Event| target.show("index.html"))?;

    let target = second.clone();
    first.bind("open-new-window", move |_: &Event| -> webui_core::Result<()> {
        target.show("second.html")?;
        target.run("document.getElementById('go-back').remove();")
    })?;

    for window in [&first, &second] {
        let ui = ui.clone();
        window.bind("exit", move |_: &Event| ui.exit())?;
    }

    first.show("index.html")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use webui_core::transport::mock::RecordingTransport;
    use webui_core::{InboundEvent, WindowId};

    fn ui() -> (WebUi, Arc<RecordingTransport>) {
        let transport = RecordingTransport::new();
        (WebUi::new(transport.clone()), transport)
    }

    #[test]
    fn test_handle_resp_doubles_text_input() {
        let event = Event::for_test(InboundEvent::call(WindowId::new(1), "handleResp", 1, vec!["21".into()]));
        assert_eq!(handle_resp(&event).unwrap(), 42);
    }

    #[test]
    fn test_call_native_shows_one_window() {
        let (ui, _transport) = ui();
        call_native(&ui).unwrap();
        assert_eq!(ui.windows().len(), 1);
        assert!(ui.windows()[0].is_shown());
    }

    #[test]
    fn test_serve_folder_uses_fixed_window_ids() {
        // Arrange
        let (ui, _transport) = ui();
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("ui");

        // Act
        serve_folder(&ui, &root).unwrap();

        // Assert
        assert!(ui.window(WindowId::new(1)).unwrap().is_shown());
        assert!(!ui.window(WindowId::new(2)).unwrap().is_shown());
    }
}
