//! Infrastructure layer for webui-bridge.
//!
//! All I/O lives here: the WebSocket listener and its session tasks, the
//! session table the core sends through, page generation, browser
//! processes and the configuration file.
//!
//! # What does NOT belong here?
//!
//! - Protocol translation (application layer)
//! - Message and configuration types (domain layer)

pub mod bridge;
pub mod config_file;
pub mod launcher;
pub mod sessions;
pub mod ws_server;

pub use bridge::Bridge;
pub use config_file::{load_config_file, ConfigError};
pub use sessions::SessionTable;
