//! # webui-core
//!
//! The native half of a browser-based desktop UI: window bookkeeping,
//! function bindings, event dispatch and argument marshaling between
//! JavaScript and Rust.
//!
//! This crate owns no sockets and starts no processes.  Everything that
//! leaves the process goes through the [`Transport`] trait; the
//! `webui-bridge` crate provides the WebSocket implementation.
//!
//! # Architecture overview
//!
//! ```text
//! browser ── transport ──► InboundEvent ──► Dispatcher ──► BindingTable ──► callback
//!                                              │                               │
//!                                              └──── encode ◄── Value ◄────────┘
//!                                                     │
//! browser ◄── transport ◄── ResponsePayload ◄─────────┘
//! ```
//!
//! - **`value`** – The four wire scalar kinds (string, integer, boolean,
//!   float) and the exact, lossless conversions between them.
//! - **`window`** – The window registry: id allocation, show state, root
//!   folders.  Ids start at 1 and are never reused within a context.
//! - **`binding`** – (window, element) → callback, with a per-window
//!   wildcard.
//! - **`dispatcher`** – The per-event state machine and the per-window
//!   worker queues that keep a slow callback from stalling other windows.
//! - **`correlation`** – Pending-response slots for native→JavaScript calls.
//! - **`app`** – The [`WebUi`] / [`Window`] facade tying it all together.
//!
//! # Example
//!
//! ```rust
//! use webui_core::transport::mock::RecordingTransport;
//! use webui_core::{Event, InboundEvent, WebUi};
//!
//! let ui = WebUi::new(RecordingTransport::new());
//! let window = ui.new_window();
//! window.bind("double", |e: &Event| e.get_int(0).map(|n| n * 2))?;
//! window.show("<html><body>hi</body></html>")?;
//!
//! ui.dispatch(InboundEvent::call(window.id(), "double", 1, vec![21.into()]));
//! # Ok::<(), webui_core::WebUiError>(())
//! ```

pub mod app;
pub mod binding;
pub mod config;
pub mod correlation;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod transport;
pub mod value;
pub mod window;

pub use app::{WebUi, Window};
pub use binding::{BindId, CallbackFailure, Handler, IntoResponse, Reply, WILDCARD};
pub use config::{Config, TlsConfig};
pub use correlation::{PendingResponses, PendingSlot};
pub use dispatcher::{DispatchOutcome, Dispatcher, WindowWorkers};
pub use error::{Result, WebUiError};
pub use event::{Event, EventType, InboundEvent};
pub use transport::{ResponsePayload, Transport};
pub use value::{ArgKind, ArgumentList, FromArg, Value, WireValue};
pub use window::{Content, DisplayRequest, ShowState, WindowId};
