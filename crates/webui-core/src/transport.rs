//! The seam between the core and whatever carries messages to the browser.
//!
//! The core never touches sockets.  It hands outbound traffic to a
//! [`Transport`] and receives already-parsed [`InboundEvent`]s back through
//! [`WebUi::handle_event`](crate::WebUi::handle_event).
//!
//! [`InboundEvent`]: crate::event::InboundEvent

use crate::error::Result;
use crate::value::WireValue;
use crate::window::{DisplayRequest, WindowId};

pub mod mock;

/// Body of an outbound response message.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    /// The callback's encoded return value.
    Value(WireValue),
    /// The call completed without a value.
    Done,
    /// The return value could not be encoded; the JavaScript promise rejects.
    Error(String),
}

/// Outbound half of the wire protocol.
///
/// Implementations must be cheap to call from any thread; the core calls them
/// from dispatch workers and from application threads alike.
pub trait Transport: Send + Sync + 'static {
    /// Puts a window on screen, or refreshes it in place when
    /// `request.refresh` is set.  Returns once success or failure is known.
    fn present(&self, request: &DisplayRequest) -> Result<()>;

    /// Sends the response for inbound call `event_number` on `window`.
    fn send_response(&self, window: WindowId, event_number: u64, payload: ResponsePayload) -> Result<()>;

    /// Runs `script` in the window.  With `event_number` set, the client must
    /// answer with the script's result under that number.
    fn run_script(&self, window: WindowId, event_number: Option<u64>, script: &str) -> Result<()>;

    /// Detaches the window's browser sessions.
    fn close_window(&self, window: WindowId);

    /// Releases every transport resource.
    fn shutdown(&self);
}
