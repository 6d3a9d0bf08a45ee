//! WebSocket server: accept loop and per-page session tasks.
//!
//! Every page the bridge opens connects back here and introduces itself with
//! `Hello { window }`.  From then on the session runs two tasks:
//!
//! - **reader**: page frames → [`Inbound`] → [`WebUi::handle_event`] or
//!   [`WebUi::deliver_script_result`]
//! - **writer**: [`NativeMsg`]s queued by the [`SessionTable`] → JSON frames
//!
//! When a session ends the window is not closed at once: pages reconnect on
//! every reload or in-place navigation.  Only if no new session attaches
//! within the reconnect grace period does the core see `Disconnected`.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use futures_util::stream::SplitStream;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async, WebSocketStream,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use webui_core::{EventType, WebUi, WindowId};

use crate::application::{
    browser_msg_type_name, expect_hello, lifecycle_event, parse_browser_frame, translate_browser_msg,
    Inbound,
};
use crate::domain::NativeMsg;
use crate::infrastructure::sessions::SessionTable;

/// How long a freshly connected page has to send `Hello`.
pub const HELLO_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state handed to every session task.
#[derive(Clone)]
pub struct ServerContext {
    pub ui: WebUi,
    pub sessions: Arc<SessionTable>,
    pub reconnect_grace: Duration,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds the listener pages connect to.
///
/// # Errors
///
/// Fails if the address is in use or not bindable.
pub async fn bind_listener(addr: SocketAddr) -> anyhow::Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {addr}"))
}

/// Accepts page connections until the session table is shut down.
pub async fn run_server(listener: TcpListener, ctx: ServerContext) -> anyhow::Result<()> {
    let running = ctx.sessions.running();
    if let Ok(addr) = listener.local_addr() {
        info!("WebUI bridge listening on {addr}");
    }

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Short accept timeout so the running flag is re-checked regularly.
        match timeout(Duration::from_millis(200), listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("page connection from {peer_addr}");
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    handle_page_session(stream, peer_addr, ctx).await;
                });
            }
            Ok(Err(e)) => error!("accept error: {e}"),
            Err(_) => {}
        }
    }

    Ok(())
}

// ── Per-session handler ───────────────────────────────────────────────────────

async fn handle_page_session(stream: TcpStream, peer_addr: SocketAddr, ctx: ServerContext) {
    match run_session(stream, peer_addr, ctx).await {
        Ok(()) => debug!("session {peer_addr} closed normally"),
        Err(e) => warn!("session {peer_addr} closed with error: {e:#}"),
    }
}

async fn run_session(stream: TcpStream, peer_addr: SocketAddr, ctx: ServerContext) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    // ── Handshake: the first text frame must be Hello ─────────────────────────
    let window = timeout(HELLO_TIMEOUT, read_hello(&mut ws_rx))
        .await
        .with_context(|| format!("no Hello from {peer_addr} within {HELLO_TIMEOUT:?}"))??;

    let session = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel::<NativeMsg>();
    // Queued first so it precedes any flushed backlog.
    let _ = tx.send(NativeMsg::Welcome {
        window,
        session: session.to_string(),
    });
    if !ctx.sessions.attach(window, session, tx) {
        info!(window = %window, "page for a window that is not open; closing it");
        send_json(&mut ws_tx, &NativeMsg::Close).await?;
        return Ok(());
    }
    info!(window = %window, session = %session, "page connected");
    ctx.ui.handle_event(lifecycle_event(window, EventType::Connected));

    // ── Writer: native → page ─────────────────────────────────────────────────
    let writer_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, NativeMsg::Close);
            if let Err(e) = send_json(&mut ws_tx, &msg).await {
                debug!(window = %window, "send failed (page gone): {e:#}");
                break;
            }
            if closing {
                let _ = ws_tx.close().await;
                break;
            }
        }
    });

    // ── Reader: page → native ─────────────────────────────────────────────────
    let ui = ctx.ui.clone();
    let reader_task = tokio::spawn(async move {
        loop {
            let frame = match ws_rx.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) | None => {
                    debug!(window = %window, "page stream ended");
                    break;
                }
                Some(Err(e)) => {
                    warn!(window = %window, "WebSocket error: {e}");
                    break;
                }
            };

            match frame {
                WsMessage::Text(text) => {
                    let msg = match parse_browser_frame(&text) {
                        Ok(msg) => msg,
                        Err(e) => {
                            warn!(window = %window, "{e}");
                            continue;
                        }
                    };
                    debug!(window = %window, "page → native: {}", browser_msg_type_name(&msg));
                    match translate_browser_msg(window, msg) {
                        Ok(Inbound::Event(event)) => ui.handle_event(event),
                        Ok(Inbound::ScriptResult { seq, result }) => {
                            if !ui.deliver_script_result(window, seq, result) {
                                debug!(window = %window, seq, "script result with no waiter");
                            }
                        }
                        Err(e) => warn!(window = %window, "{e}"),
                    }
                }
                WsMessage::Binary(_) => warn!(window = %window, "unexpected binary frame (ignored)"),
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
                WsMessage::Close(_) => break,
            }
        }
    });

    tokio::select! {
        _ = writer_task => debug!(window = %window, "writer task ended"),
        _ = reader_task => debug!(window = %window, "reader task ended"),
    }

    if ctx.sessions.detach(window, session) {
        schedule_disconnect(ctx, window);
    }
    Ok(())
}

/// Reports `Disconnected` for `window` unless a page reattaches in time.
fn schedule_disconnect(ctx: ServerContext, window: WindowId) {
    tokio::spawn(async move {
        tokio::time::sleep(ctx.reconnect_grace).await;
        if ctx.sessions.is_connected(window) || !ctx.sessions.is_presented(window) {
            return;
        }
        info!(window = %window, "page did not reconnect; window closed");
        ctx.ui.handle_event(lifecycle_event(window, EventType::Disconnected));
    });
}

/// Waits for the session's first text frame, which must be `Hello`.
async fn read_hello(ws_rx: &mut SplitStream<WebSocketStream<TcpStream>>) -> anyhow::Result<WindowId> {
    loop {
        match ws_rx.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                let msg = parse_browser_frame(&text)?;
                return Ok(expect_hello(&msg)?);
            }
            Some(Ok(WsMessage::Close(_))) | None => bail!("closed before Hello"),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

async fn send_json<S>(sink: &mut S, msg: &NativeMsg) -> anyhow::Result<()>
where
    S: Sink<WsMessage> + Unpin,
    <S as Sink<WsMessage>>::Error: std::error::Error + Send + Sync + 'static,
{
    let text = serde_json::to_string(msg).context("serialising native message")?;
    sink.send(WsMessage::Text(text)).await?;
    Ok(())
}
