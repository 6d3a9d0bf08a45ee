//! Session table: the bridge's [`Transport`] implementation.
//!
//! Each presented window owns a slot.  A slot holds the browser session
//! currently attached to it (if any) and a backlog of scripts issued before
//! the page connected.  Sessions come and go as pages load and reload; the
//! slot survives until the window is closed natively.
//!
//! All methods are synchronous: outbound messages go onto an unbounded
//! channel drained by the session's writer task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use uuid::Uuid;
use webui_core::{DisplayRequest, ResponsePayload, Transport, WebUiError, WindowId};

use crate::application::{translate_response, translate_script};
use crate::domain::NativeMsg;
use crate::infrastructure::launcher::BrowserLauncher;

struct Session {
    id: Uuid,
    tx: UnboundedSender<NativeMsg>,
}

#[derive(Default)]
struct Slot {
    session: Option<Session>,
    backlog: Vec<NativeMsg>,
}

/// Browser sessions by window.
pub struct SessionTable {
    launcher: BrowserLauncher,
    slots: Mutex<HashMap<WindowId, Slot>>,
    running: Arc<AtomicBool>,
}

impl SessionTable {
    pub fn new(launcher: BrowserLauncher) -> Self {
        Self {
            launcher,
            slots: Mutex::new(HashMap::new()),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Cleared by [`Transport::shutdown`]; the accept loop watches it.
    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn launcher(&self) -> &BrowserLauncher {
        &self.launcher
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<WindowId, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes `tx` the window's current session and flushes queued scripts
    /// into it.  A previous session is detached; its writer ends once the
    /// sender is dropped.
    ///
    /// Returns `false` if the window has no slot (never presented, or closed).
    pub fn attach(&self, window: WindowId, id: Uuid, tx: UnboundedSender<NativeMsg>) -> bool {
        let mut slots = self.slots();
        let Some(slot) = slots.get_mut(&window) else {
            return false;
        };
        let queued = std::mem::take(&mut slot.backlog);
        if !queued.is_empty() {
            debug!(window = %window, count = queued.len(), "flushing queued scripts");
        }
        for msg in queued {
            // The receiver is alive: the session task holds it.
            let _ = tx.send(msg);
        }
        if let Some(old) = slot.session.replace(Session { id, tx }) {
            debug!(window = %window, old = %old.id, new = %id, "session replaced");
        }
        true
    }

    /// Removes session `id` from the window.
    ///
    /// Returns whether it was the window's current session.  A session that
    /// was already replaced detaches as a no-op.
    pub fn detach(&self, window: WindowId, id: Uuid) -> bool {
        let mut slots = self.slots();
        match slots.get_mut(&window) {
            Some(slot) if slot.session.as_ref().is_some_and(|s| s.id == id) => {
                slot.session = None;
                true
            }
            _ => false,
        }
    }

    /// Whether a browser session is attached to `window` right now.
    pub fn is_connected(&self, window: WindowId) -> bool {
        self.slots()
            .get(&window)
            .is_some_and(|slot| slot.session.is_some())
    }

    /// Whether `window` was presented and not closed since.
    pub fn is_presented(&self, window: WindowId) -> bool {
        self.slots().contains_key(&window)
    }

    fn send_live(&self, window: WindowId, msg: NativeMsg) -> webui_core::Result<()> {
        let slots = self.slots();
        let session = slots
            .get(&window)
            .and_then(|slot| slot.session.as_ref())
            .ok_or_else(|| WebUiError::Transport(format!("window {window} has no browser session")))?;
        session
            .tx
            .send(msg)
            .map_err(|_| WebUiError::Transport(format!("session for window {window} has ended")))
    }
}

impl Transport for SessionTable {
    fn present(&self, request: &DisplayRequest) -> webui_core::Result<()> {
        let window = request.window;
        if request.tls.is_some() {
            warn!(window = %window, "TLS certificate configured but the bridge serves plain ws://");
        }
        let url = self.launcher.prepare(request)?;

        {
            let mut slots = self.slots();
            let slot = slots.entry(window).or_default();
            if let Some(session) = &slot.session {
                if session.tx.send(NativeMsg::Navigate { url: url.clone() }).is_ok() {
                    info!(window = %window, refresh = request.refresh, "navigating live page");
                    return Ok(());
                }
                slot.session = None;
            } else if request.refresh {
                // Page is still loading; send it on as soon as it connects.
                slot.backlog.push(NativeMsg::Navigate { url });
                return Ok(());
            }
        }

        if let Err(e) = self.launcher.open(window, &url) {
            self.slots().remove(&window);
            return Err(e);
        }
        Ok(())
    }

    fn send_response(&self, window: WindowId, event_number: u64, payload: ResponsePayload) -> webui_core::Result<()> {
        self.send_live(window, translate_response(event_number, payload))
    }

    fn run_script(&self, window: WindowId, event_number: Option<u64>, script: &str) -> webui_core::Result<()> {
        let msg = translate_script(event_number, script);
        let mut slots = self.slots();
        let slot = slots
            .get_mut(&window)
            .ok_or_else(|| WebUiError::Transport(format!("window {window} is not presented")))?;
        match &slot.session {
            Some(session) => session
                .tx
                .send(msg)
                .map_err(|_| WebUiError::Transport(format!("session for window {window} has ended"))),
            None => {
                debug!(window = %window, "page not connected yet; script queued");
                slot.backlog.push(msg);
                Ok(())
            }
        }
    }

    fn close_window(&self, window: WindowId) {
        if let Some(slot) = self.slots().remove(&window) {
            if let Some(session) = slot.session {
                let _ = session.tx.send(NativeMsg::Close);
            }
            debug!(window = %window, "window slot released");
        }
    }

    fn shutdown(&self) {
        let drained: Vec<_> = self.slots().drain().collect();
        for (_, slot) in drained {
            if let Some(session) = slot.session {
                let _ = session.tx.send(NativeMsg::Close);
            }
        }
        self.running.store(false, Ordering::Relaxed);
        info!("session table shut down");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
