//! Response correlation: pairing a pending call with its eventual value.
//!
//! A caller that expects an answer registers a slot keyed by
//! `(window, event number)` *before* the request goes out, then awaits it.
//! Whoever receives the answer calls [`PendingResponses::fulfil`] with the
//! same key.  The slot is single-use:
//!
//! ```text
//! register ──► (request sent) ──► fulfil ──► wait returns Ok(value)
//!                               └─ timeout ──► wait returns Err(Timeout), slot removed
//!                               └─ close_window ──► wait returns Err(WindowClosed)
//! ```
//!
//! Event numbers are unique per window: each window shard carries its own
//! counter, and shards are locked independently so traffic on one window
//! never waits on another.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{Result, WebUiError};
use crate::value::Value;
use crate::window::WindowId;

type Outcome = Result<Value>;

struct Shard {
    next_event_number: u64,
    slots: HashMap<u64, oneshot::Sender<Outcome>>,
    closed: bool,
}

impl Shard {
    fn new() -> Self {
        Self {
            next_event_number: 1,
            slots: HashMap::new(),
            closed: false,
        }
    }

    fn fail_all(&mut self, window: WindowId) -> usize {
        let drained = self.slots.len();
        for (_, tx) in self.slots.drain() {
            // The waiter may have given up already.
            let _ = tx.send(Err(WebUiError::WindowClosed(window)));
        }
        drained
    }
}

fn lock(shard: &Mutex<Shard>) -> MutexGuard<'_, Shard> {
    shard.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pending-response slots for every window of a context.
#[derive(Default)]
pub struct PendingResponses {
    shards: RwLock<HashMap<WindowId, Arc<Mutex<Shard>>>>,
}

impl PendingResponses {
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, window: WindowId) -> Arc<Mutex<Shard>> {
        if let Some(shard) = self
            .shards
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&window)
        {
            return Arc::clone(shard);
        }
        let mut shards = self.shards.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            shards
                .entry(window)
                .or_insert_with(|| Arc::new(Mutex::new(Shard::new()))),
        )
    }

    fn existing(&self, window: WindowId) -> Option<Arc<Mutex<Shard>>> {
        self.shards
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&window)
            .cloned()
    }

    /// Allocates the next event number for `window` and registers a slot for it.
    ///
    /// # Errors
    ///
    /// [`WebUiError::WindowClosed`] if the window has been closed.
    pub fn register(&self, window: WindowId) -> Result<PendingSlot> {
        let shard = self.shard(window);
        let (tx, rx) = oneshot::channel();
        let event_number = {
            let mut guard = lock(&shard);
            if guard.closed {
                return Err(WebUiError::WindowClosed(window));
            }
            // Numbers taken through `register_at` are skipped.
            let mut n = guard.next_event_number;
            while guard.slots.contains_key(&n) {
                n = n.wrapping_add(1);
            }
            guard.next_event_number = n.wrapping_add(1);
            guard.slots.insert(n, tx);
            n
        };
        trace!(window = %window, event_number, "pending slot registered");
        Ok(PendingSlot {
            window,
            event_number,
            rx: Some(rx),
            shard,
        })
    }

    /// Registers a slot under an event number chosen by someone else.
    ///
    /// # Errors
    ///
    /// [`WebUiError::WindowClosed`] if the window has been closed, and
    /// [`WebUiError::Transport`] if that number is already awaited.
    pub fn register_at(&self, window: WindowId, event_number: u64) -> Result<PendingSlot> {
        let shard = self.shard(window);
        let (tx, rx) = oneshot::channel();
        {
            let mut guard = lock(&shard);
            if guard.closed {
                return Err(WebUiError::WindowClosed(window));
            }
            if guard.slots.contains_key(&event_number) {
                return Err(WebUiError::Transport(format!(
                    "response {event_number} on window {window} is already pending"
                )));
            }
            guard.slots.insert(event_number, tx);
        }
        Ok(PendingSlot {
            window,
            event_number,
            rx: Some(rx),
            shard,
        })
    }

    /// Registers a slot for `event_number` and waits for it.
    ///
    /// Only safe when the answer cannot arrive before this call registers;
    /// otherwise register first and send afterwards.
    pub async fn await_response(
        &self,
        window: WindowId,
        event_number: u64,
        timeout: Duration,
    ) -> Result<Value> {
        self.register_at(window, event_number)?.wait(timeout).await
    }

    fn complete(&self, window: WindowId, event_number: u64, outcome: Outcome) -> bool {
        let Some(shard) = self.existing(window) else {
            return false;
        };
        let tx = lock(&shard).slots.remove(&event_number);
        match tx {
            Some(tx) => tx.send(outcome).is_ok(),
            None => {
                debug!(window = %window, event_number, "late or duplicate response ignored");
                false
            }
        }
    }

    /// Delivers `value` to the slot `(window, event_number)`.
    ///
    /// Returns whether a waiter received it.  A missing slot is not an error.
    pub fn fulfil(&self, window: WindowId, event_number: u64, value: Value) -> bool {
        self.complete(window, event_number, Ok(value))
    }

    /// Delivers an error to the slot `(window, event_number)`.
    pub fn reject(&self, window: WindowId, event_number: u64, error: WebUiError) -> bool {
        self.complete(window, event_number, Err(error))
    }

    /// Number of slots currently waiting on `window`.
    pub fn pending(&self, window: WindowId) -> usize {
        self.existing(window)
            .map(|shard| lock(&shard).slots.len())
            .unwrap_or(0)
    }

    /// Fails every pending slot of `window` with `WindowClosed` and refuses
    /// new ones until [`reopen`](Self::reopen).
    pub fn close_window(&self, window: WindowId) -> usize {
        let shard = self.shard(window);
        let mut guard = lock(&shard);
        guard.closed = true;
        let failed = guard.fail_all(window);
        if failed > 0 {
            debug!(window = %window, failed, "pending responses cancelled");
        }
        failed
    }

    /// Accepts new slots for a window that was closed and shown again.
    pub fn reopen(&self, window: WindowId) {
        lock(&self.shard(window)).closed = false;
    }

    /// Fails and forgets every slot of `window`.
    pub fn remove_window(&self, window: WindowId) -> usize {
        let removed = self
            .shards
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&window);
        removed
            .map(|shard| {
                let mut guard = lock(&shard);
                guard.closed = true;
                guard.fail_all(window)
            })
            .unwrap_or(0)
    }

    /// Fails every slot of every window.
    pub fn close_all(&self) -> usize {
        let shards: Vec<_> = self
            .shards
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, shard)| (*id, Arc::clone(shard)))
            .collect();
        shards
            .into_iter()
            .map(|(window, shard)| {
                let mut guard = lock(&shard);
                guard.closed = true;
                guard.fail_all(window)
            })
            .sum()
    }
}

/// A registered, not yet answered call.
///
/// Dropping the slot without waiting removes it from the table.
pub struct PendingSlot {
    window: WindowId,
    event_number: u64,
    rx: Option<oneshot::Receiver<Outcome>>,
    shard: Arc<Mutex<Shard>>,
}

impl PendingSlot {
    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn event_number(&self) -> u64 {
        self.event_number
    }

    /// Waits until the slot is fulfilled, rejected, cancelled or times out.
    ///
    /// # Errors
    ///
    /// - [`WebUiError::Timeout`] when `timeout` elapses first.
    /// - [`WebUiError::WindowClosed`] when the window closes while waiting.
    /// - Whatever error [`PendingResponses::reject`] delivered.
    pub async fn wait(mut self, timeout: Duration) -> Result<Value> {
        let Some(rx) = self.rx.take() else {
            return Err(WebUiError::WindowClosed(self.window));
        };
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            // Sender dropped without an answer: the table was torn down.
            Ok(Err(_)) => Err(WebUiError::WindowClosed(self.window)),
            Err(_) => {
                debug!(window = %self.window, event_number = self.event_number, "response timed out");
                Err(WebUiError::Timeout {
                    window: self.window,
                    event_number: self.event_number,
                })
            }
        }
    }
}

impl fmt::Debug for PendingSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSlot")
            .field("window", &self.window)
            .field("event_number", &self.event_number)
            .finish_non_exhaustive()
    }
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        drop(self.rx.take());
        let mut guard = lock(&self.shard);
        // Only our own sender is closed now; a live one belongs to another waiter.
        if guard
            .slots
            .get(&self.event_number)
            .is_some_and(|tx| tx.is_closed())
        {
            guard.slots.remove(&self.event_number);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const W1: WindowId = WindowId::new(1);
    const W2: WindowId = WindowId::new(2);

    #[tokio::test]
    async fn test_fulfil_delivers_to_waiter() {
        // Arrange
        let pending = Arc::new(PendingResponses::new());
        let slot = pending.register(W1).unwrap();
        let n = slot.event_number();

        // Act
        let p = Arc::clone(&pending);
        tokio::spawn(async move {
            p.fulfil(W1, n, Value::Int(42));
        });
        let value = slot.wait(Duration::from_secs(2)).await;

        // Assert
        assert_eq!(value, Ok(Value::Int(42)));
        assert_eq!(pending.pending(W1), 0);
    }

    #[tokio::test]
    async fn test_event_numbers_are_per_window() {
        let pending = PendingResponses::new();
        let a = pending.register(W1).unwrap();
        let b = pending.register(W1).unwrap();
        let c = pending.register(W2).unwrap();
        assert_eq!(a.event_number(), 1);
        assert_eq!(b.event_number(), 2);
        assert_eq!(c.event_number(), 1);
    }

    #[tokio::test]
    async fn test_same_number_on_two_windows_does_not_cross_deliver() {
        let pending = PendingResponses::new();
        let on_w1 = pending.register_at(W1, 7).unwrap();
        let on_w2 = pending.register_at(W2, 7).unwrap();

        assert!(pending.fulfil(W2, 7, Value::from("two")));
        assert!(pending.fulfil(W1, 7, Value::from("one")));

        assert_eq!(on_w1.wait(Duration::from_secs(1)).await, Ok(Value::from("one")));
        assert_eq!(on_w2.wait(Duration::from_secs(1)).await, Ok(Value::from("two")));
    }

    #[tokio::test]
    async fn test_timeout_removes_slot() {
        let pending = PendingResponses::new();
        let slot = pending.register_at(W1, 3).unwrap();

        let result = slot.wait(Duration::from_millis(50)).await;

        assert_eq!(
            result,
            Err(WebUiError::Timeout {
                window: W1,
                event_number: 3
            })
        );
        assert_eq!(pending.pending(W1), 0);
        assert!(!pending.fulfil(W1, 3, Value::Int(1)), "late response is a no-op");
    }

    #[tokio::test]
    async fn test_close_window_fails_pending_with_window_closed() {
        let pending = PendingResponses::new();
        let slot = pending.register(W1).unwrap();

        assert_eq!(pending.close_window(W1), 1);

        assert_eq!(
            slot.wait(Duration::from_secs(5)).await,
            Err(WebUiError::WindowClosed(W1))
        );
        assert!(matches!(pending.register(W1), Err(WebUiError::WindowClosed(_))));
        pending.reopen(W1);
        assert!(pending.register(W1).is_ok());
    }

    #[tokio::test]
    async fn test_remove_window_cancels_only_that_window() {
        let pending = PendingResponses::new();
        let doomed = pending.register(W1).unwrap();
        let _survivor = pending.register(W2).unwrap();

        assert_eq!(pending.remove_window(W1), 1);

        assert_eq!(
            doomed.wait(Duration::from_secs(5)).await,
            Err(WebUiError::WindowClosed(W1))
        );
        assert_eq!(pending.pending(W2), 1);
    }

    #[test]
    fn test_fulfil_unknown_slot_is_noop() {
        let pending = PendingResponses::new();
        assert!(!pending.fulfil(W1, 99, Value::Bool(true)));
    }

    #[test]
    fn test_duplicate_register_at_is_rejected() {
        let pending = PendingResponses::new();
        let _slot = pending.register_at(W1, 5).unwrap();
        assert!(matches!(pending.register_at(W1, 5), Err(WebUiError::Transport(_))));
    }

    #[test]
    fn test_dropping_slot_unregisters_it() {
        let pending = PendingResponses::new();
        let slot = pending.register(W1).unwrap();
        drop(slot);
        assert_eq!(pending.pending(W1), 0);
    }

    #[tokio::test]
    async fn test_reject_delivers_error() {
        let pending = PendingResponses::new();
        let slot = pending.register(W1).unwrap();
        let n = slot.event_number();
        pending.reject(W1, n, WebUiError::Transport("script threw".into()));
        assert_eq!(
            slot.wait(Duration::from_secs(1)).await,
            Err(WebUiError::Transport("script threw".into()))
        );
    }

    #[tokio::test]
    async fn test_register_skips_number_taken_by_register_at() {
        // Arrange
        let pending = PendingResponses::new();
        let first = pending.register_at(W1, 1).unwrap();

        // Act
        let second = pending.register(W1).unwrap();

        // Assert
        assert_ne!(second.event_number(), first.event_number());
        assert!(pending.fulfil(W1, 1, Value::Int(7)));
        assert_eq!(first.wait(Duration::from_secs(1)).await, Ok(Value::Int(7)));
        assert_eq!(pending.pending(W1), 1);
        drop(second);
        assert_eq!(pending.pending(W1), 0);
    }

    #[test]
    fn test_pending_slot_debug_names_its_key() {
        let pending = PendingResponses::new();
        let slot = pending.register_at(W2, 9).unwrap();
        let text = format!("{slot:?}");
        assert!(text.contains("event_number: 9"));
    }
}
