//! Application layer for webui-bridge.
//!
//! Translation between page messages and the core's event and response
//! records, plus the [`BridgeError`] type for malformed traffic.  Opening
//! sockets and spawning tasks belong to the infrastructure layer.

pub mod bridge_service;

pub use bridge_service::{
    browser_msg_type_name, expect_hello, lifecycle_event, parse_browser_frame, translate_browser_msg,
    translate_response, translate_script, BridgeError, Inbound,
};
