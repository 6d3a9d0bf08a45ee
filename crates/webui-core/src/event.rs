//! Inbound event records.
//!
//! The transport parses wire bytes into an [`InboundEvent`]; the dispatcher
//! resolves its binding and hands the callback an immutable [`Event`].

use serde::{Deserialize, Serialize};

use crate::binding::BindId;
use crate::error::Result;
use crate::value::{ArgKind, ArgumentList, FromArg, Value, WireValue};
use crate::window::WindowId;

/// What triggered an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// The browser session for the window went away.
    Disconnected,
    /// A browser session attached to the window.
    Connected,
    /// An element with a bound id was clicked.
    MouseClick,
    /// The page navigated to another URL.
    Navigation,
    /// JavaScript called a bound function.
    Callback,
}

impl EventType {
    /// Lifecycle events have no element and only reach the wildcard binding.
    pub fn is_lifecycle(self) -> bool {
        matches!(self, EventType::Connected | EventType::Disconnected)
    }
}

/// An already-parsed event as delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub window: WindowId,
    pub event_type: EventType,
    pub element: String,
    pub event_number: u64,
    /// Bind id the client believes it is calling; advisory only.
    pub bind_id: Option<BindId>,
    pub args: Vec<WireValue>,
}

impl InboundEvent {
    /// A `Callback` event with the given arguments.
    pub fn call(
        window: WindowId,
        element: impl Into<String>,
        event_number: u64,
        args: Vec<WireValue>,
    ) -> Self {
        Self {
            window,
            event_type: EventType::Callback,
            element: element.into(),
            event_number,
            bind_id: None,
            args,
        }
    }

    /// A lifecycle or click event without arguments.
    pub fn notify(window: WindowId, event_type: EventType, element: impl Into<String>, event_number: u64) -> Self {
        Self {
            window,
            event_type,
            element: element.into(),
            event_number,
            bind_id: None,
            args: Vec::new(),
        }
    }
}

/// The event a callback receives.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub window: WindowId,
    pub event_type: EventType,
    pub element: String,
    pub event_number: u64,
    /// Id of the binding that routed this event.
    pub bind_id: BindId,
    args: ArgumentList,
}

impl Event {
    pub(crate) fn resolved(inbound: InboundEvent, bind_id: BindId) -> Self {
        Self {
            window: inbound.window,
            event_type: inbound.event_type,
            element: inbound.element,
            event_number: inbound.event_number,
            bind_id,
            args: ArgumentList::new(inbound.args),
        }
    }

    /// Number of arguments passed from JavaScript.
    pub fn count(&self) -> usize {
        self.args.len()
    }

    pub fn args(&self) -> &ArgumentList {
        &self.args
    }

    /// Decodes argument `index` into a native type.
    ///
    /// ```rust
    /// # use webui_core::{Event, InboundEvent, WindowId};
    /// # let event = Event::for_test(InboundEvent::call(WindowId::new(1), "f", 0, vec![7.into()]));
    /// let n: i64 = event.get_arg(0)?;
    /// assert_eq!(n, 7);
    /// # Ok::<(), webui_core::WebUiError>(())
    /// ```
    pub fn get_arg<T: FromArg>(&self, index: usize) -> Result<T> {
        self.args.get(index)
    }

    pub fn get(&self, index: usize, kind: ArgKind) -> Result<Value> {
        self.args.decode(index, kind)
    }

    pub fn get_string(&self, index: usize) -> Result<String> {
        self.get_arg(index)
    }

    pub fn get_int(&self, index: usize) -> Result<i64> {
        self.get_arg(index)
    }

    pub fn get_bool(&self, index: usize) -> Result<bool> {
        self.get_arg(index)
    }

    pub fn get_float(&self, index: usize) -> Result<f64> {
        self.get_arg(index)
    }

    /// Builds an event outside the dispatcher, with bind id 0.
    #[doc(hidden)]
    pub fn for_test(inbound: InboundEvent) -> Self {
        Self::resolved(inbound, BindId::new(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WebUiError;
    use serde_json::json;

    fn event(args: Vec<WireValue>) -> Event {
        Event::for_test(InboundEvent::call(WindowId::new(1), "handleInt", 3, args))
    }

    #[test]
    fn test_typed_getters() {
        let e = event(vec![json!("Hello"), json!(123), json!(true), json!(1.5)]);
        assert_eq!(e.count(), 4);
        assert_eq!(e.get_string(0).unwrap(), "Hello");
        assert_eq!(e.get_int(1).unwrap(), 123);
        assert!(e.get_bool(2).unwrap());
        assert_eq!(e.get_float(3).unwrap(), 1.5);
    }

    #[test]
    fn test_get_past_end_fails() {
        let e = event(vec![json!(1)]);
        assert_eq!(
            e.get_int(1),
            Err(WebUiError::IndexOutOfRange { index: 1, count: 1 })
        );
    }

    #[test]
    fn test_lifecycle_types() {
        assert!(EventType::Connected.is_lifecycle());
        assert!(EventType::Disconnected.is_lifecycle());
        assert!(!EventType::Callback.is_lifecycle());
        assert!(!EventType::MouseClick.is_lifecycle());
    }

    #[test]
    fn test_event_type_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&EventType::MouseClick).unwrap(),
            "\"mouse_click\""
        );
    }
}
