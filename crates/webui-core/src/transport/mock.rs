//! Recording transport for tests.
//!
//! Captures every outbound message so tests can assert on what the core
//! tried to send, and can be told to fail `present` to exercise display
//! errors.  Optionally routes responses and script runs back into a
//! [`PendingResponses`] table, standing in for a browser that answers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::correlation::PendingResponses;
use crate::error::{Result, WebUiError};
use crate::value::{script_value_from_wire, value_from_wire, WireValue};
use crate::window::{DisplayRequest, WindowId};

use super::{ResponsePayload, Transport};

/// Everything a [`RecordingTransport`] was asked to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Present(DisplayRequest),
    Response {
        window: WindowId,
        event_number: u64,
        payload: ResponsePayload,
    },
    Script {
        window: WindowId,
        event_number: Option<u64>,
        script: String,
    },
    Close(WindowId),
    Shutdown,
}

type ScriptAnswer = dyn Fn(&str) -> Option<WireValue> + Send + Sync;

/// A [`Transport`] that records instead of sending.
#[derive(Default)]
pub struct RecordingTransport {
    log: Mutex<Vec<Outbound>>,
    fail_present: AtomicBool,
    loopback: Mutex<Option<Arc<PendingResponses>>>,
    answer: Mutex<Option<Arc<ScriptAnswer>>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every subsequent `present` fail with `DisplayError`.
    pub fn fail_present(&self, fail: bool) {
        self.fail_present.store(fail, Ordering::SeqCst);
    }

    /// Feeds responses back into `pending`, like a browser resolving them.
    pub fn loop_back_into(&self, pending: Arc<PendingResponses>) {
        *self.loopback.lock().unwrap_or_else(PoisonError::into_inner) = Some(pending);
    }

    /// Answers scripts sent with an event number using `answer`.
    ///
    /// Requires [`loop_back_into`](Self::loop_back_into).  Returning `None`
    /// leaves the call unanswered.
    pub fn answer_scripts(&self, answer: impl Fn(&str) -> Option<WireValue> + Send + Sync + 'static) {
        *self.answer.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(answer));
    }

    /// A copy of the log.
    pub fn sent(&self) -> Vec<Outbound> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Only the responses, as `(window, event_number, payload)`.
    pub fn responses(&self) -> Vec<(WindowId, u64, ResponsePayload)> {
        self.sent()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Response {
                    window,
                    event_number,
                    payload,
                } => Some((window, event_number, payload)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, outbound: Outbound) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outbound);
    }

    fn loopback(&self) -> Option<Arc<PendingResponses>> {
        self.loopback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Transport for RecordingTransport {
    fn present(&self, request: &DisplayRequest) -> Result<()> {
        if self.fail_present.load(Ordering::SeqCst) {
            return Err(WebUiError::DisplayError("no browser available".to_string()));
        }
        self.record(Outbound::Present(request.clone()));
        Ok(())
    }

    fn send_response(&self, window: WindowId, event_number: u64, payload: ResponsePayload) -> Result<()> {
        self.record(Outbound::Response {
            window,
            event_number,
            payload: payload.clone(),
        });
        if let Some(pending) = self.loopback() {
            match payload {
                ResponsePayload::Value(wire) => match value_from_wire(&wire) {
                    Ok(value) => {
                        pending.fulfil(window, event_number, value);
                    }
                    Err(e) => {
                        pending.reject(window, event_number, e);
                    }
                },
                ResponsePayload::Error(message) => {
                    pending.reject(window, event_number, WebUiError::EncodingError(message));
                }
                ResponsePayload::Done => {}
            }
        }
        Ok(())
    }

    fn run_script(&self, window: WindowId, event_number: Option<u64>, script: &str) -> Result<()> {
        self.record(Outbound::Script {
            window,
            event_number,
            script: script.to_string(),
        });
        let answer = self.answer.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let (Some(n), Some(answer), Some(pending)) = (event_number, answer, self.loopback()) {
            if let Some(wire) = answer(script) {
                if let Ok(value) = script_value_from_wire(&wire) {
                    pending.fulfil(window, n, value);
                }
            }
        }
        Ok(())
    }

    fn close_window(&self, window: WindowId) {
        self.record(Outbound::Close(window));
    }

    fn shutdown(&self) {
        self.record(Outbound::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use crate::window::Content;
    use std::time::Duration;

    fn request() -> DisplayRequest {
        DisplayRequest {
            window: WindowId::new(1),
            content: Content::Markup("<html></html>".into()),
            root_folder: None,
            refresh: false,
            tls: None,
        }
    }

    #[test]
    fn test_records_present() {
        let transport = RecordingTransport::new();
        transport.present(&request()).unwrap();
        assert_eq!(transport.sent(), vec![Outbound::Present(request())]);
    }

    #[test]
    fn test_fail_present_returns_display_error() {
        let transport = RecordingTransport::new();
        transport.fail_present(true);
        assert!(matches!(
            transport.present(&request()),
            Err(WebUiError::DisplayError(_))
        ));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_loopback_fulfils_pending_slot() {
        // Arrange
        let transport = RecordingTransport::new();
        let pending = Arc::new(PendingResponses::new());
        transport.loop_back_into(Arc::clone(&pending));
        let slot = pending.register_at(WindowId::new(1), 9).unwrap();

        // Act
        transport
            .send_response(WindowId::new(1), 9, ResponsePayload::Value(WireValue::from(42)))
            .unwrap();

        // Assert
        assert_eq!(slot.wait(Duration::from_secs(1)).await, Ok(Value::Int(42)));
    }
}
