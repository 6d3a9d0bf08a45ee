//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for runtime settings.  It
//! starts from defaults, is overlaid with an optional TOML file
//! ([`BridgeConfigFile`]) and finally with command-line arguments, which win.
//!
//! Reading the file is the infrastructure layer's job; this module only
//! describes the shapes and how they combine.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// All runtime configuration for the bridge.
///
/// # Example
///
/// ```rust
/// use webui_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.bind_addr.ip().to_string(), "127.0.0.1");
/// assert!(cfg.launch_browser);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Address the WebSocket server binds to.  Port 0 picks a free port.
    pub bind_addr: SocketAddr,

    /// Host name pages use to reach the server (`ws://{public_host}:{port}`).
    pub public_host: String,

    /// Browser executable to open windows with.  `None` uses the platform
    /// default opener.
    pub browser: Option<String>,

    /// When `false`, windows are prepared but no browser is started; the page
    /// URL is logged instead.  Used by tests and headless runs.
    pub launch_browser: bool,

    /// Default timeout for native→JavaScript calls.
    pub response_timeout: Duration,

    /// How long a window may stay without a browser session (for example
    /// while a page reloads) before it counts as closed.
    pub reconnect_grace: Duration,

    /// Directory generated pages are written to.
    pub pages_dir: PathBuf,
}

impl Default for BridgeConfig {
    /// | Field            | Default                      |
    /// |------------------|------------------------------|
    /// | bind_addr        | `127.0.0.1:0`                |
    /// | public_host      | `127.0.0.1`                  |
    /// | browser          | platform default             |
    /// | launch_browser   | `true`                       |
    /// | response_timeout | 30 seconds                   |
    /// | reconnect_grace  | 1.5 seconds                  |
    /// | pages_dir        | `{temp}/webui-bridge`        |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            public_host: "127.0.0.1".to_string(),
            browser: None,
            launch_browser: true,
            response_timeout: Duration::from_secs(30),
            reconnect_grace: Duration::from_millis(1500),
            pages_dir: std::env::temp_dir().join("webui-bridge"),
        }
    }
}

impl BridgeConfig {
    /// Overlays every field the file sets.
    pub fn apply_file(&mut self, file: &BridgeConfigFile) {
        if let Some(addr) = file.server.bind_addr {
            self.bind_addr = addr;
        }
        if let Some(host) = &file.server.public_host {
            self.public_host = host.clone();
        }
        if let Some(browser) = &file.browser.command {
            self.browser = Some(browser.clone());
        }
        if let Some(launch) = file.browser.launch {
            self.launch_browser = launch;
        }
        if let Some(secs) = file.timeouts.response_secs {
            self.response_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = file.timeouts.reconnect_grace_ms {
            self.reconnect_grace = Duration::from_millis(ms);
        }
        if let Some(dir) = &file.browser.pages_dir {
            self.pages_dir = dir.clone();
        }
    }
}

// ── File schema ───────────────────────────────────────────────────────────────

/// On-disk configuration.  Every field is optional; absent fields keep the
/// value from [`BridgeConfig::default`].
///
/// ```toml
/// [server]
/// bind_addr = "127.0.0.1:8081"
/// public_host = "localhost"
///
/// [browser]
/// command = "firefox"
/// launch = true
///
/// [timeouts]
/// response_secs = 10
/// reconnect_grace_ms = 2000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfigFile {
    pub server: ServerSection,
    pub browser: BrowserSection,
    pub timeouts: TimeoutSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_addr: Option<SocketAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_host: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconnect_grace_ms: Option<u64>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_binds_loopback_on_any_port() {
        let cfg = BridgeConfig::default();
        assert!(cfg.bind_addr.ip().is_loopback());
        assert_eq!(cfg.bind_addr.port(), 0);
    }

    #[test]
    fn test_default_response_timeout_is_30s() {
        assert_eq!(BridgeConfig::default().response_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_empty_file_changes_nothing() {
        // Arrange
        let file: BridgeConfigFile = toml::from_str("").unwrap();
        let mut cfg = BridgeConfig::default();

        // Act
        cfg.apply_file(&file);

        // Assert
        assert_eq!(cfg, BridgeConfig::default());
    }

    #[test]
    fn test_file_overrides_only_what_it_sets() {
        // Arrange
        let file: BridgeConfigFile = toml::from_str(
            r#"
            [server]
            bind_addr = "0.0.0.0:9000"

            [browser]
            launch = false

            [timeouts]
            response_secs = 5
            "#,
        )
        .unwrap();
        let mut cfg = BridgeConfig::default();

        // Act
        cfg.apply_file(&file);

        // Assert
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert!(!cfg.launch_browser);
        assert_eq!(cfg.response_timeout, Duration::from_secs(5));
        assert_eq!(cfg.public_host, "127.0.0.1");
        assert_eq!(cfg.reconnect_grace, Duration::from_millis(1500));
    }

    #[test]
    fn test_browser_command_parses() {
        let file: Result<BridgeConfigFile, _> = toml::from_str(
            r#"
            [browser]
            command = "chromium"
            "#,
        );
        assert_eq!(file.unwrap().browser.command.as_deref(), Some("chromium"));
    }
}
