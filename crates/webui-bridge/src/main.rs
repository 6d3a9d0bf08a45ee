//! WebUI bridge: entry point.
//!
//! Starts the WebSocket server, runs one of the demo programs and waits until
//! every window is closed (or Ctrl+C).
//!
//! # Usage
//!
//! ```text
//! webui-bridge [OPTIONS] [COMMAND]
//!
//! Commands:
//!   minimal        One "Hello World" window (default)
//!   call-native    Buttons that call native functions, one returning a value
//!   serve-folder   Two windows serving pages from a folder
//!
//! Options:
//!   --config <PATH>        TOML configuration file
//!   --bind <IP>            Listener address [default: 127.0.0.1]
//!   --port <PORT>          Listener port, 0 for any [default: 0]
//!   --host <HOST>          Host pages use to reach the bridge
//!   --browser <CMD>        Browser executable
//!   --no-browser           Prepare pages but do not start a browser
//!   --timeout-secs <SECS>  Native→JavaScript response timeout
//! ```
//!
//! # Configuration precedence
//!
//! Built-in defaults, then the `--config` file, then command-line options.
//!
//! | Variable              | Option           |
//! |-----------------------|------------------|
//! | `WEBUI_CONFIG`        | `--config`       |
//! | `WEBUI_BIND`          | `--bind`         |
//! | `WEBUI_PORT`          | `--port`         |
//! | `WEBUI_PUBLIC_HOST`   | `--host`         |
//! | `WEBUI_BROWSER`       | `--browser`      |
//! | `WEBUI_NO_BROWSER`    | `--no-browser`   |
//! | `WEBUI_TIMEOUT_SECS`  | `--timeout-secs` |

mod demos;

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use webui_bridge::domain::{BridgeConfig, BridgeConfigFile};
use webui_bridge::infrastructure::{load_config_file, Bridge};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Runs WebUI demo programs in your browser.
#[derive(Debug, Parser)]
#[command(name = "webui-bridge", about = "Browser windows driven by native code", version)]
struct Cli {
    /// TOML configuration file.  A missing file is ignored.
    #[arg(long, env = "WEBUI_CONFIG")]
    config: Option<PathBuf>,

    /// IP address the WebSocket listener binds to.
    #[arg(long, env = "WEBUI_BIND")]
    bind: Option<IpAddr>,

    /// Listener port; 0 picks a free one.
    #[arg(long, env = "WEBUI_PORT")]
    port: Option<u16>,

    /// Host name pages use to reach the listener.
    #[arg(long, env = "WEBUI_PUBLIC_HOST")]
    host: Option<String>,

    /// Browser executable used to open windows.
    #[arg(long, env = "WEBUI_BROWSER")]
    browser: Option<String>,

    /// Write pages and log their URLs without starting a browser.
    #[arg(long, env = "WEBUI_NO_BROWSER")]
    no_browser: bool,

    /// Seconds to wait for a JavaScript result.
    #[arg(long, env = "WEBUI_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Option<Demo>,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
enum Demo {
    /// One "Hello World" window.
    Minimal,
    /// Buttons that call native functions.
    CallNative,
    /// Two windows serving pages from a folder.
    ServeFolder {
        /// Folder holding index.html and second.html.
        #[arg(long, default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/ui"))]
        root: PathBuf,
    },
}

impl Cli {
    /// Defaults, overlaid with `file`, overlaid with the command line.
    fn into_bridge_config(&self, file: &BridgeConfigFile) -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.apply_file(file);

        if let Some(ip) = self.bind {
            config.bind_addr.set_ip(ip);
        }
        if let Some(port) = self.port {
            config.bind_addr.set_port(port);
        }
        if let Some(host) = &self.host {
            config.public_host = host.clone();
        }
        if let Some(browser) = &self.browser {
            config.browser = Some(browser.clone());
        }
        if self.no_browser {
            config.launch_browser = false;
        }
        if let Some(secs) = self.timeout_secs {
            config.response_timeout = Duration::from_secs(secs);
        }
        config
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let file = match &cli.config {
        Some(path) => load_config_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => BridgeConfigFile::default(),
    };
    let config = cli.into_bridge_config(&file);

    let bridge = Bridge::start(config).await?;
    info!("WebUI bridge started on {}", bridge.local_addr());

    match cli.command.unwrap_or(Demo::Minimal) {
        Demo::Minimal => demos::minimal(bridge.ui())?,
        Demo::CallNative => demos::call_native(bridge.ui())?,
        Demo::ServeFolder { root } => demos::serve_folder(bridge.ui(), &root)
            .with_context(|| format!("serving {}", root.display()))?,
    }

    tokio::select! {
        _ = bridge.ui().wait() => info!("all windows closed"),
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("received Ctrl+C; shutting down"),
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        },
    }

    bridge.shutdown().await?;
    info!("WebUI bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_leave_config_untouched() {
        // Arrange
        let cli = Cli::parse_from(["webui-bridge"]);

        // Act
        let config = cli.into_bridge_config(&BridgeConfigFile::default());

        // Assert
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_cli_port_and_bind_override() {
        let cli = Cli::parse_from(["webui-bridge", "--bind", "0.0.0.0", "--port", "8080"]);
        let config = cli.into_bridge_config(&BridgeConfigFile::default());
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_cli_wins_over_file() {
        // Arrange
        let file: BridgeConfigFile = toml::from_str("[timeouts]\nresponse_secs = 5\n").unwrap();
        let cli = Cli::parse_from(["webui-bridge", "--timeout-secs", "9"]);

        // Act
        let config = cli.into_bridge_config(&file);

        // Assert
        assert_eq!(config.response_timeout, Duration::from_secs(9));
    }

    #[test]
    fn test_file_applies_when_cli_silent() {
        let file: BridgeConfigFile = toml::from_str("[browser]\nlaunch = false\n").unwrap();
        let cli = Cli::parse_from(["webui-bridge"]);
        assert!(!cli.into_bridge_config(&file).launch_browser);
    }

    #[test]
    fn test_no_browser_flag() {
        let cli = Cli::parse_from(["webui-bridge", "--no-browser"]);
        assert!(!cli.into_bridge_config(&BridgeConfigFile::default()).launch_browser);
    }

    #[test]
    fn test_serve_folder_defaults_to_bundled_ui() {
        let cli = Cli::parse_from(["webui-bridge", "serve-folder"]);
        let Some(Demo::ServeFolder { root }) = cli.command else {
            panic!("expected serve-folder");
        };
        assert!(root.ends_with("ui"));
    }

    #[test]
    fn test_invalid_bind_address_is_rejected() {
        assert!(Cli::try_parse_from(["webui-bridge", "--bind", "not.an.ip"]).is_err());
    }
}
