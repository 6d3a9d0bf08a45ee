//! Binding table: (window, element) → callback.
//!
//! # Layout
//!
//! ```text
//! windows: RwLock<Shards { by_window: HashMap<WindowId, Arc<RwLock<WindowBindings>>>, retired }>
//!                                                             └─ element name → Arc<Binding>
//! ```
//!
//! The outer lock is only write-locked the first time a window gets a
//! binding, and when a window is dropped.  Binding, re-binding and lookups
//! for one window only touch that window's inner lock, so binds on different
//! windows proceed in parallel and a lookup never sees a half-written entry.
//! A removed window is retired: later binds for it are dropped instead of
//! growing a shard nobody would clear.
//!
//! # Re-binding
//!
//! Every `bind` call allocates a fresh [`BindId`]; binding an element again
//! replaces the old entry and retires its id.  Bind ids come from a single
//! process-wide counter, so they stay unique across contexts.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::event::Event;
use crate::value::{value_from_wire, Value, WireValue};
use crate::window::WindowId;

/// Element name that matches every otherwise-unbound event of a window.
pub const WILDCARD: &str = "";

static NEXT_BIND_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier handed out by [`BindingTable::bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindId(u64);

impl BindId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    fn allocate() -> Self {
        Self(NEXT_BIND_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for BindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Callback contract ─────────────────────────────────────────────────────────

/// Why a callback produced no usable response.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackFailure {
    /// The callback itself failed; no response is sent.
    Failed(String),
    /// The callback returned something the wire cannot carry; the caller gets
    /// an error response.
    Unencodable(String),
}

/// Result of running a callback: `Ok(None)` means "no response".
pub type Reply = std::result::Result<Option<Value>, CallbackFailure>;

/// Conversion of a callback's return value into a [`Reply`].
pub trait IntoResponse {
    fn into_response(self) -> Reply;
}

impl IntoResponse for () {
    fn into_response(self) -> Reply {
        Ok(None)
    }
}

impl IntoResponse for Value {
    fn into_response(self) -> Reply {
        Ok(Some(self))
    }
}

macro_rules! scalar_response {
    ($($ty:ty),*) => {
        $(impl IntoResponse for $ty {
            fn into_response(self) -> Reply {
                Ok(Some(Value::from(self)))
            }
        })*
    };
}

scalar_response!(String, &str, i64, i32, u32, bool, f64, f32);

impl IntoResponse for WireValue {
    fn into_response(self) -> Reply {
        value_from_wire(&self)
            .map(Some)
            .map_err(|e| CallbackFailure::Unencodable(e.to_string()))
    }
}

impl<T: IntoResponse> IntoResponse for Option<T> {
    fn into_response(self) -> Reply {
        match self {
            Some(inner) => inner.into_response(),
            None => Ok(None),
        }
    }
}

impl<T: IntoResponse, E: fmt::Display> IntoResponse for std::result::Result<T, E> {
    fn into_response(self) -> Reply {
        match self {
            Ok(inner) => inner.into_response(),
            Err(e) => Err(CallbackFailure::Failed(e.to_string())),
        }
    }
}

/// A native function reachable from JavaScript.
///
/// Implemented for every `Fn(&Event) -> R` closure whose return type
/// implements [`IntoResponse`].
pub trait Handler: Send + Sync + 'static {
    fn call(&self, event: &Event) -> Reply;
}

impl<F, R> Handler for F
where
    F: Fn(&Event) -> R + Send + Sync + 'static,
    R: IntoResponse,
{
    fn call(&self, event: &Event) -> Reply {
        self(event).into_response()
    }
}

/// One registered callback.
pub struct Binding {
    pub id: BindId,
    pub window: WindowId,
    pub element: String,
    handler: Box<dyn Handler>,
}

impl Binding {
    pub fn invoke(&self, event: &Event) -> Reply {
        self.handler.call(event)
    }

    pub fn is_wildcard(&self) -> bool {
        self.element == WILDCARD
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("window", &self.window)
            .field("element", &self.element)
            .finish_non_exhaustive()
    }
}

// ── Table ─────────────────────────────────────────────────────────────────────

type WindowBindings = HashMap<String, Arc<Binding>>;

#[derive(Default)]
struct Shards {
    by_window: HashMap<WindowId, Arc<RwLock<WindowBindings>>>,
    retired: HashSet<WindowId>,
}

/// Every binding of every window in one context.
#[derive(Default)]
pub struct BindingTable {
    windows: RwLock<Shards>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, window: WindowId) -> Option<Arc<RwLock<WindowBindings>>> {
        self.windows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_window
            .get(&window)
            .cloned()
    }

    /// `None` once `window` has been removed.
    fn shard_or_insert(&self, window: WindowId) -> Option<Arc<RwLock<WindowBindings>>> {
        if let Some(shard) = self.shard(window) {
            return Some(shard);
        }
        let mut windows = self.windows.write().unwrap_or_else(PoisonError::into_inner);
        if windows.retired.contains(&window) {
            return None;
        }
        Some(Arc::clone(windows.by_window.entry(window).or_default()))
    }

    /// Registers `handler` for `element` on `window`, replacing any previous
    /// binding of that pair.  An empty `element` binds every event.
    ///
    /// Binds for a removed window are dropped; the id is still allocated.
    pub fn bind(&self, window: WindowId, element: &str, handler: impl Handler) -> BindId {
        let binding = Arc::new(Binding {
            id: BindId::allocate(),
            window,
            element: element.to_string(),
            handler: Box::new(handler),
        });
        let id = binding.id;

        let Some(shard) = self.shard_or_insert(window) else {
            debug!(window = %window, element, bind_id = %id, "bind dropped for removed window");
            return id;
        };
        let previous = shard
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(element.to_string(), binding);

        match previous {
            Some(old) => debug!(window = %window, element, bind_id = %id, replaced = %old.id, "rebound"),
            None => debug!(window = %window, element, bind_id = %id, "bound"),
        }
        id
    }

    /// The binding for exactly (`window`, `element`), if any.
    pub fn get(&self, window: WindowId, element: &str) -> Option<Arc<Binding>> {
        let shard = self.shard(window)?;
        let bindings = shard.read().unwrap_or_else(PoisonError::into_inner);
        bindings.get(element).cloned()
    }

    /// Resolves an event target: the specific binding first, then the
    /// window's wildcard.
    pub fn resolve(&self, window: WindowId, element: &str) -> Option<Arc<Binding>> {
        let shard = self.shard(window)?;
        let bindings = shard.read().unwrap_or_else(PoisonError::into_inner);
        bindings
            .get(element)
            .or_else(|| bindings.get(WILDCARD))
            .cloned()
    }

    /// The window's wildcard binding, if any.
    pub fn wildcard(&self, window: WindowId) -> Option<Arc<Binding>> {
        self.get(window, WILDCARD)
    }

    /// Removes one binding. Returns whether it existed.
    pub fn unbind(&self, window: WindowId, element: &str) -> bool {
        self.shard(window)
            .map(|shard| {
                shard
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(element)
                    .is_some()
            })
            .unwrap_or(false)
    }

    /// Drops every binding of `window` and refuses new ones for it.
    pub fn remove_window(&self, window: WindowId) -> usize {
        let removed = {
            let mut windows = self.windows.write().unwrap_or_else(PoisonError::into_inner);
            windows.retired.insert(window);
            windows.by_window.remove(&window)
        };
        removed
            .map(|shard| shard.read().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }

    /// Number of bindings registered for `window`.
    pub fn count(&self, window: WindowId) -> usize {
        self.shard(window)
            .map(|shard| shard.read().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        self.windows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .by_window
            .clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
