//! JSON message types for the browser-facing WebSocket protocol.
//!
//! Every message is a JSON object with a `"type"` field naming the variant;
//! the other fields sit next to it:
//!
//! ```json
//! {"type":"Call","element":"handleResp","event_number":3,"args":[21]}
//! {"type":"Response","event_number":3,"value":42}
//! ```
//!
//! # Message flow
//!
//! ```text
//! Browser → Bridge:  Hello, then Call / Click / Navigation / ScriptResult
//! Bridge  → Browser: Welcome, then Response / Error / Done / RunScript / Navigate / Close
//! ```
//!
//! `event_number` on browser calls is allocated by the page; `seq` on scripts
//! is allocated by the native side.  The two never share a namespace.

use serde::{Deserialize, Serialize};
use webui_core::{WindowId, WireValue};

// ── Browser → Bridge ──────────────────────────────────────────────────────────

/// Everything a page can send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BrowserMsg {
    /// First frame of every session: which window this page belongs to.
    Hello { window: WindowId },

    /// `webui.<element>(...args)` was called.  The page's promise settles on
    /// the matching `Response`, `Error` or `Done`.
    Call {
        element: String,
        event_number: u64,
        /// Bind id the page believes it is calling; advisory.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bind_id: Option<u64>,
        #[serde(default)]
        args: Vec<WireValue>,
    },

    /// An element with an id was clicked.
    Click { element: String, event_number: u64 },

    /// The page is navigating away to `url`.
    Navigation { url: String, event_number: u64 },

    /// Result of a `RunScript` that carried a `seq`.  Exactly one of `value`
    /// and `error` is expected; neither means the script returned nothing.
    ScriptResult {
        seq: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<WireValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

// ── Bridge → Browser ──────────────────────────────────────────────────────────

/// Everything the bridge sends to a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NativeMsg {
    /// Reply to `Hello`.
    Welcome { window: WindowId, session: String },

    /// A call's return value.
    Response { event_number: u64, value: WireValue },

    /// The call's return value could not be sent; the page's promise rejects.
    Error { event_number: u64, message: String },

    /// The call completed without a value; the page's promise resolves empty.
    Done { event_number: u64 },

    /// Evaluate `script` as a function body.  With `seq`, reply with
    /// `ScriptResult`.
    RunScript {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
        script: String,
    },

    /// Load another page in place.
    Navigate { url: String },

    /// The native side closed the window.
    Close,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_parses_without_bind_id_or_args() {
        let msg: BrowserMsg =
            serde_json::from_str(r#"{"type":"Call","element":"ping","event_number":1}"#).unwrap();
        assert_eq!(
            msg,
            BrowserMsg::Call {
                element: "ping".into(),
                event_number: 1,
                bind_id: None,
                args: vec![],
            }
        );
    }

    #[test]
    fn test_hello_carries_window_id_as_number() {
        let msg: BrowserMsg = serde_json::from_str(r#"{"type":"Hello","window":2}"#).unwrap();
        assert_eq!(msg, BrowserMsg::Hello { window: WindowId::new(2) });
    }

    #[test]
    fn test_response_serializes_flat_with_type_tag() {
        let json = serde_json::to_value(NativeMsg::Response {
            event_number: 3,
            value: json!(42),
        })
        .unwrap();
        assert_eq!(json, json!({"type": "Response", "event_number": 3, "value": 42}));
    }

    #[test]
    fn test_fire_and_forget_script_omits_seq() {
        let json = serde_json::to_value(NativeMsg::RunScript {
            seq: None,
            script: "alert(1)".into(),
        })
        .unwrap();
        assert_eq!(json, json!({"type": "RunScript", "script": "alert(1)"}));
    }

    #[test]
    fn test_close_is_a_bare_tag() {
        assert_eq!(serde_json::to_string(&NativeMsg::Close).unwrap(), r#"{"type":"Close"}"#);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(serde_json::from_str::<BrowserMsg>(r#"{"type":"Teleport"}"#).is_err());
    }
}
