//! webui-bridge library crate.
//!
//! Carries a [`webui_core::WebUi`] context to real browsers: every window is
//! an ordinary browser tab whose page connects back over a local WebSocket.
//!
//! ```text
//! Native app ── webui-core ──(Transport)── webui-bridge ──ws://── Browser page
//! ```
//!
//! # Layout
//!
//! ```text
//! domain/           JSON messages, BridgeConfig
//! application/      Page message ↔ core record translation
//! infrastructure/
//!   ├── ws_server   accept loop and per-page sessions (tokio-tungstenite)
//!   ├── sessions    SessionTable: the core's Transport
//!   ├── launcher    page generation and browser processes
//!   ├── config_file TOML loading
//!   └── bridge      Bridge::start / shutdown
//! ```
//!
//! `domain` does no I/O; `application` depends only on `domain` and
//! `webui-core`; `infrastructure` may use everything.

/// Domain layer: protocol and configuration types.
pub mod domain;

/// Application layer: message translation.
pub mod application;

/// Infrastructure layer: sockets, browsers, files.
pub mod infrastructure;
