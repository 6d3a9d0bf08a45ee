//! Domain layer for webui-bridge.
//!
//! Pure types with no I/O: the JSON messages exchanged with pages and the
//! bridge configuration.  No `tokio`, sockets or file access here.

pub mod config;
pub mod messages;

pub use config::{BridgeConfig, BridgeConfigFile};
pub use messages::{BrowserMsg, NativeMsg};
