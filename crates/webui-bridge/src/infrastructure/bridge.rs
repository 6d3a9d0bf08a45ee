//! [`Bridge`]: a running WebSocket server wired to a [`WebUi`] context.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinHandle;
use tracing::info;
use webui_core::WebUi;

use crate::domain::BridgeConfig;
use crate::infrastructure::launcher::BrowserLauncher;
use crate::infrastructure::sessions::SessionTable;
use crate::infrastructure::ws_server::{bind_listener, run_server, ServerContext};

/// Owns the server task.  Windows are created through [`Bridge::ui`].
///
/// # Example
///
/// ```rust,no_run
/// # async fn demo() -> anyhow::Result<()> {
/// use webui_bridge::domain::BridgeConfig;
/// use webui_bridge::infrastructure::Bridge;
///
/// let bridge = Bridge::start(BridgeConfig::default()).await?;
/// let window = bridge.ui().new_window();
/// window.show("<html>Hello World</html>")?;
/// bridge.ui().wait().await;
/// bridge.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct Bridge {
    ui: WebUi,
    sessions: Arc<SessionTable>,
    local_addr: SocketAddr,
    server: JoinHandle<anyhow::Result<()>>,
}

impl Bridge {
    /// Binds the listener and starts accepting pages.
    ///
    /// # Errors
    ///
    /// Fails if the listener cannot be bound.
    pub async fn start(config: BridgeConfig) -> anyhow::Result<Self> {
        let listener = bind_listener(config.bind_addr).await?;
        let local_addr = listener
            .local_addr()
            .context("listener has no local address")?;
        let ws_url = format!("ws://{}:{}", config.public_host, local_addr.port());

        let sessions = Arc::new(SessionTable::new(BrowserLauncher::new(&config, ws_url)));
        let ui = WebUi::new(Arc::clone(&sessions) as Arc<dyn webui_core::Transport>);
        ui.set_response_timeout(config.response_timeout);

        let ctx = ServerContext {
            ui: ui.clone(),
            sessions: Arc::clone(&sessions),
            reconnect_grace: config.reconnect_grace,
        };
        let server = tokio::spawn(run_server(listener, ctx));
        info!(%local_addr, "bridge started");

        Ok(Self {
            ui,
            sessions,
            local_addr,
            server,
        })
    }

    pub fn ui(&self) -> &WebUi {
        &self.ui
    }

    /// Address the server actually bound (the real port when 0 was asked).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn sessions(&self) -> &Arc<SessionTable> {
        &self.sessions
    }

    /// Cleans the context up and waits for the accept loop to stop.
    ///
    /// # Errors
    ///
    /// Propagates a server error, or a panic of the server task.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.ui.cleanup();
        self.server.await.context("server task panicked")?
    }
}
