//! Event dispatcher: inbound event → callback → response.
//!
//! # Per-event state machine
//!
//! ```text
//! Receive ─► Resolve ─┬─ no binding ───────────────────────────► Dropped
//!                     └─► Decode (lazy) ─► Invoke ─┬─ failed / panicked ─► Failed
//!                                                  ├─ no value ──────────► NoResponse
//!                                                  └─ value ─► Respond ─┬► Responded
//!                                                                       └► ErrorResponded
//! ```
//!
//! Every event ends in exactly one terminal state and is never reprocessed.
//! `Callback` events that end in `NoResponse` or `Failed` are answered with
//! [`ResponsePayload::Done`] so the JavaScript side is not left hanging.
//! A callback that fails or panics is contained here: it is logged and
//! treated as "no response", so one bad binding cannot take down its window
//! or anyone else's.
//!
//! # Ordering
//!
//! [`WindowWorkers`] gives each window its own queue and worker task.  Events
//! of one window run in arrival order; windows never wait on each other.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::binding::{BindingTable, CallbackFailure};
use crate::event::{Event, EventType, InboundEvent};
use crate::transport::{ResponsePayload, Transport};
use crate::value::encode;
use crate::window::WindowId;

/// Terminal state of one dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No binding and no wildcard: nothing to do.
    Dropped,
    /// The callback ran and produced no value.
    NoResponse,
    /// The callback failed or panicked; logged, no response.
    Failed,
    /// The value was encoded and handed to the transport.
    Responded,
    /// The value could not be encoded; an error response was sent instead.
    ErrorResponded,
}

/// Routes inbound events to their callbacks.
pub struct Dispatcher {
    bindings: Arc<BindingTable>,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(bindings: Arc<BindingTable>, transport: Arc<dyn Transport>) -> Self {
        Self {
            bindings,
            transport,
        }
    }

    /// Runs one event through the full state machine on the calling thread.
    pub fn dispatch(&self, inbound: InboundEvent) -> DispatchOutcome {
        // ── Resolve ──
        let binding = if inbound.event_type.is_lifecycle() {
            self.bindings.wildcard(inbound.window)
        } else {
            self.bindings.resolve(inbound.window, &inbound.element)
        };
        let Some(binding) = binding else {
            debug!(
                window = %inbound.window,
                element = %inbound.element,
                event_type = ?inbound.event_type,
                "no binding; event dropped"
            );
            return DispatchOutcome::Dropped;
        };

        // ── Decode ── (arguments stay wire values until the callback asks)
        let event = Event::resolved(inbound, binding.id);

        // ── Invoke ──
        let reply = match catch_unwind(AssertUnwindSafe(|| binding.invoke(&event))) {
            Ok(reply) => reply,
            Err(panic) => {
                error!(
                    window = %event.window,
                    element = %event.element,
                    bind_id = %event.bind_id,
                    "callback panicked: {}",
                    panic_message(panic.as_ref())
                );
                return self.settle(&event, DispatchOutcome::Failed);
            }
        };

        // ── Respond ──
        match reply {
            Ok(None) => self.settle(&event, DispatchOutcome::NoResponse),
            Ok(Some(value)) => match encode(&value) {
                Ok(wire) => self.respond(&event, ResponsePayload::Value(wire), DispatchOutcome::Responded),
                Err(e) => {
                    warn!(window = %event.window, element = %event.element, "response not encodable: {e}");
                    self.respond(&event, ResponsePayload::Error(e.to_string()), DispatchOutcome::ErrorResponded)
                }
            },
            Err(CallbackFailure::Unencodable(message)) => {
                warn!(window = %event.window, element = %event.element, "response not encodable: {message}");
                self.respond(&event, ResponsePayload::Error(message), DispatchOutcome::ErrorResponded)
            }
            Err(CallbackFailure::Failed(message)) => {
                warn!(
                    window = %event.window,
                    element = %event.element,
                    bind_id = %event.bind_id,
                    "callback failed: {message}"
                );
                self.settle(&event, DispatchOutcome::Failed)
            }
        }
    }

    /// A JavaScript call that produced no value still gets `Done`, so the
    /// caller's promise settles instead of waiting forever.
    fn settle(&self, event: &Event, outcome: DispatchOutcome) -> DispatchOutcome {
        if event.event_type == EventType::Callback {
            self.respond(event, ResponsePayload::Done, outcome)
        } else {
            outcome
        }
    }

    fn respond(&self, event: &Event, payload: ResponsePayload, outcome: DispatchOutcome) -> DispatchOutcome {
        if let Err(e) = self
            .transport
            .send_response(event.window, event.event_number, payload)
        {
            // The session is gone; nobody is left waiting.
            debug!(window = %event.window, event_number = event.event_number, "response not delivered: {e}");
        }
        outcome
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

// ── Per-window workers ────────────────────────────────────────────────────────

type OutcomeHook = Arc<dyn Fn(WindowId, u64, DispatchOutcome) + Send + Sync>;

/// One dispatch queue and worker task per window.
///
/// Callbacks run on tokio's blocking pool, so a slow callback holds up only
/// its own window's queue.
pub struct WindowWorkers {
    dispatcher: Arc<Dispatcher>,
    queues: Mutex<HashMap<WindowId, mpsc::UnboundedSender<InboundEvent>>>,
    on_outcome: Option<OutcomeHook>,
}

impl WindowWorkers {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            queues: Mutex::new(HashMap::new()),
            on_outcome: None,
        }
    }

    /// Calls `hook` with the outcome of every event once it is processed.
    pub fn with_outcome_hook(
        mut self,
        hook: impl Fn(WindowId, u64, DispatchOutcome) + Send + Sync + 'static,
    ) -> Self {
        self.on_outcome = Some(Arc::new(hook));
        self
    }

    /// Queues an event behind earlier events of the same window.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, inbound: InboundEvent) {
        let window = inbound.window;
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);

        let inbound = match queues.get(&window) {
            Some(tx) => match tx.send(inbound) {
                Ok(()) => return,
                // The worker exited; start a fresh one below.
                Err(mpsc::error::SendError(inbound)) => inbound,
            },
            None => inbound,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        // A brand-new channel with a live receiver cannot reject.
        let _ = tx.send(inbound);
        queues.insert(window, tx);
        tokio::spawn(run_worker(
            window,
            rx,
            Arc::clone(&self.dispatcher),
            self.on_outcome.clone(),
        ));
    }

    /// Stops accepting events for `window`; queued ones still run.
    pub fn stop(&self, window: WindowId) {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&window);
    }

    pub fn stop_all(&self) {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of windows with a live worker.
    pub fn active(&self) -> usize {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

async fn run_worker(
    window: WindowId,
    mut rx: mpsc::UnboundedReceiver<InboundEvent>,
    dispatcher: Arc<Dispatcher>,
    on_outcome: Option<OutcomeHook>,
) {
    debug!(window = %window, "dispatch worker started");
    while let Some(inbound) = rx.recv().await {
        let event_number = inbound.event_number;
        let d = Arc::clone(&dispatcher);
        let outcome = match tokio::task::spawn_blocking(move || d.dispatch(inbound)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // dispatch() already contains callback panics; this is the
                // blocking pool itself refusing the job.
                error!(window = %window, event_number, "dispatch task failed: {e}");
                DispatchOutcome::Failed
            }
        };
        if let Some(hook) = &on_outcome {
            hook(window, event_number, outcome);
        }
    }
    debug!(window = %window, "dispatch worker stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
