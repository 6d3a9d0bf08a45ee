//! Protocol translation between page messages and core records.
//!
//! Pure functions: no sockets, no tasks.
//!
//! ```text
//! Browser → core:  JSON text → BrowserMsg → Inbound (InboundEvent | script result)
//! core → Browser:  ResponsePayload / script → NativeMsg → JSON text
//! ```

use thiserror::Error;
use webui_core::{BindId, EventType, InboundEvent, ResponsePayload, WindowId, WireValue, WILDCARD};

use crate::domain::messages::{BrowserMsg, NativeMsg};

// ── Error type ────────────────────────────────────────────────────────────────

/// Malformed or out-of-order traffic from a page.
///
/// These never end a session on their own; the offending frame is skipped.
#[derive(Debug, Error, PartialEq)]
pub enum BridgeError {
    /// The frame is not a valid protocol message.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// The first frame of a session was not `Hello`.
    #[error("expected Hello as the first frame, got {0}")]
    MissingHello(&'static str),

    /// A second `Hello` arrived on an established session.
    #[error("Hello received on an established session")]
    UnexpectedHello,
}

/// A page message after translation.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Goes to [`webui_core::WebUi::handle_event`].
    Event(InboundEvent),
    /// Goes to [`webui_core::WebUi::deliver_script_result`].
    ScriptResult {
        seq: u64,
        result: Result<WireValue, String>,
    },
}

// ── Browser → core ────────────────────────────────────────────────────────────

/// Parses one WebSocket text frame.
///
/// # Errors
///
/// [`BridgeError::InvalidFrame`] if the text is not a known message.
pub fn parse_browser_frame(text: &str) -> Result<BrowserMsg, BridgeError> {
    serde_json::from_str(text).map_err(|e| BridgeError::InvalidFrame(e.to_string()))
}

/// Extracts the window id from a session's first message.
///
/// # Errors
///
/// [`BridgeError::MissingHello`] for anything but `Hello`.
pub fn expect_hello(msg: &BrowserMsg) -> Result<WindowId, BridgeError> {
    match msg {
        BrowserMsg::Hello { window } => Ok(*window),
        other => Err(BridgeError::MissingHello(browser_msg_type_name(other))),
    }
}

/// Translates a message from an established session on `window`.
///
/// # Errors
///
/// [`BridgeError::UnexpectedHello`] for a repeated `Hello`.
///
/// # Example
///
/// ```rust
/// use webui_bridge::application::{translate_browser_msg, Inbound};
/// use webui_bridge::domain::BrowserMsg;
/// use webui_core::{EventType, WindowId};
///
/// let msg = BrowserMsg::Click { element: "exit".into(), event_number: 4 };
/// let Inbound::Event(event) = translate_browser_msg(WindowId::new(1), msg).unwrap() else {
///     panic!("clicks become events");
/// };
/// assert_eq!(event.event_type, EventType::MouseClick);
/// ```
pub fn translate_browser_msg(window: WindowId, msg: BrowserMsg) -> Result<Inbound, BridgeError> {
    match msg {
        BrowserMsg::Hello { .. } => Err(BridgeError::UnexpectedHello),

        BrowserMsg::Call {
            element,
            event_number,
            bind_id,
            args,
        } => Ok(Inbound::Event(InboundEvent {
            window,
            event_type: EventType::Callback,
            element,
            event_number,
            bind_id: bind_id.map(BindId::new),
            args,
        })),

        BrowserMsg::Click {
            element,
            event_number,
        } => Ok(Inbound::Event(InboundEvent::notify(
            window,
            EventType::MouseClick,
            element,
            event_number,
        ))),

        BrowserMsg::Navigation { url, event_number } => {
            // Navigation has no element; it reaches the wildcard with the
            // target URL as its only argument.
            let mut event = InboundEvent::notify(window, EventType::Navigation, WILDCARD, event_number);
            event.args = vec![WireValue::String(url)];
            Ok(Inbound::Event(event))
        }

        BrowserMsg::ScriptResult { seq, value, error } => {
            let result = match (error, value) {
                (Some(message), _) => Err(message),
                (None, Some(value)) => Ok(value),
                (None, None) => Ok(WireValue::Null),
            };
            Ok(Inbound::ScriptResult { seq, result })
        }
    }
}

/// Lifecycle event for `window` (`Connected` / `Disconnected`).
pub fn lifecycle_event(window: WindowId, event_type: EventType) -> InboundEvent {
    InboundEvent::notify(window, event_type, WILDCARD, 0)
}

// ── core → Browser ────────────────────────────────────────────────────────────

/// Wraps a dispatcher response for the page.
pub fn translate_response(event_number: u64, payload: ResponsePayload) -> NativeMsg {
    match payload {
        ResponsePayload::Value(value) => NativeMsg::Response {
            event_number,
            value,
        },
        ResponsePayload::Done => NativeMsg::Done { event_number },
        ResponsePayload::Error(message) => NativeMsg::Error {
            event_number,
            message,
        },
    }
}

pub fn translate_script(seq: Option<u64>, script: &str) -> NativeMsg {
    NativeMsg::RunScript {
        seq,
        script: script.to_string(),
    }
}

/// Short variant name for log lines; never includes argument values.
pub fn browser_msg_type_name(msg: &BrowserMsg) -> &'static str {
    match msg {
        BrowserMsg::Hello { .. } => "Hello",
        BrowserMsg::Call { .. } => "Call",
        BrowserMsg::Click { .. } => "Click",
        BrowserMsg::Navigation { .. } => "Navigation",
        BrowserMsg::ScriptResult { .. } => "ScriptResult",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
