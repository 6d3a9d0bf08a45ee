//! Error taxonomy shared by every component of the bridge core.
//!
//! Configuration and display errors surface synchronously to whoever called
//! the registry operation.  Argument decode errors surface to the callback at
//! the point of access.  Callback failures never leave the dispatcher: they
//! are logged there and turned into "no response".

use std::path::PathBuf;

use thiserror::Error;

use crate::window::WindowId;

/// Errors returned by the bridge core.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WebUiError {
    /// `new_window_id` was asked for an id that is live or was used before.
    #[error("window id {0} is already in use")]
    DuplicateId(WindowId),

    /// No browser, webview or session could be attached to show the content.
    #[error("failed to show window: {0}")]
    DisplayError(String),

    /// A root folder does not exist or is not a directory.
    #[error("invalid root folder {path:?}: {reason}")]
    PathError { path: PathBuf, reason: String },

    /// An argument was requested past the end of the argument list.
    #[error("argument index out of range (index: {index}, argument count: {count})")]
    IndexOutOfRange { index: usize, count: usize },

    /// The value is not one of the four scalar kinds the wire carries.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// The value cannot be represented exactly in the requested form.
    #[error("encoding error: {0}")]
    EncodingError(String),

    /// A pending response was not fulfilled in time.
    #[error("timed out waiting for response {event_number} on window {window}")]
    Timeout { window: WindowId, event_number: u64 },

    /// The window was closed or destroyed while a response was pending.
    #[error("window {0} was closed")]
    WindowClosed(WindowId),

    /// The window was never created in this context or has been destroyed.
    #[error("unknown window {0}")]
    UnknownWindow(WindowId),

    /// Configuration was rejected (malformed PEM, or changed after the first show).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A script run through `Window::script` threw in the browser.
    #[error("script failed in window {window}: {message}")]
    ScriptError { window: WindowId, message: String },

    /// The transport could not deliver a message.
    #[error("transport error: {0}")]
    Transport(String),
}

impl WebUiError {
    pub(crate) fn path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::PathError {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, WebUiError>;
