//! Application facade: one [`WebUi`] context and its [`Window`] handles.
//!
//! A context owns every table of the core (registry, bindings, pending
//! responses, configuration) plus the dispatcher and its per-window workers.
//! Nothing here is global, so tests and embedders can run several contexts
//! side by side, each with its own [`Transport`].

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::binding::{BindId, BindingTable, Handler};
use crate::config::Config;
use crate::correlation::PendingResponses;
use crate::dispatcher::{DispatchOutcome, Dispatcher, WindowWorkers};
use crate::error::{Result, WebUiError};
use crate::event::{EventType, InboundEvent};
use crate::transport::Transport;
use crate::value::{script_value_from_wire, Value, WireValue};
use crate::window::{Content, DisplayRequest, ShowState, WindowId, WindowRegistry};

struct Inner {
    registry: WindowRegistry,
    bindings: Arc<BindingTable>,
    pending: Arc<PendingResponses>,
    config: RwLock<Config>,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<Dispatcher>,
    workers: WindowWorkers,
    /// Number of windows currently shown; `wait` watches it drop to zero.
    shown: watch::Sender<usize>,
}

/// A bridge context. Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct WebUi {
    inner: Arc<Inner>,
}

impl WebUi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let bindings = Arc::new(BindingTable::new());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&bindings), Arc::clone(&transport)));
        let (shown, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                registry: WindowRegistry::new(),
                bindings,
                pending: Arc::new(PendingResponses::new()),
                config: RwLock::new(Config::default()),
                transport,
                workers: WindowWorkers::new(Arc::clone(&dispatcher)),
                dispatcher,
                shown,
            }),
        }
    }

    fn config_read(&self) -> RwLockReadGuard<'_, Config> {
        self.inner.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn config_write(&self) -> RwLockWriteGuard<'_, Config> {
        self.inner.config.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Configuration ─────────────────────────────────────────────────────────

    /// A copy of the current configuration.
    pub fn config(&self) -> Config {
        self.config_read().clone()
    }

    /// Root folder used by windows that have none of their own.
    ///
    /// # Errors
    ///
    /// [`WebUiError::PathError`] if `path` is not an existing directory,
    /// [`WebUiError::InvalidConfig`] once a window has been shown.
    pub fn set_default_root_folder(&self, path: impl AsRef<Path>) -> Result<()> {
        self.config_write().set_default_root_folder(path)
    }

    /// Serve over TLS with the given PEM certificate and private key.
    pub fn set_tls_certificate(&self, certificate_pem: &str, private_key_pem: &str) -> Result<()> {
        self.config_write().set_tls_certificate(certificate_pem, private_key_pem)
    }

    /// Default timeout for [`Window::script_default`].
    pub fn set_response_timeout(&self, timeout: Duration) {
        self.config_write().set_response_timeout(timeout);
    }

    // ── Windows ───────────────────────────────────────────────────────────────

    /// Creates a window with the next free id.
    pub fn new_window(&self) -> Window {
        let id = self.inner.registry.create();
        self.window_handle(id)
    }

    /// Creates a window with a caller-chosen id.
    ///
    /// # Errors
    ///
    /// [`WebUiError::DuplicateId`] if `id` is live or was used before.
    pub fn new_window_id(&self, id: usize) -> Result<Window> {
        let id = self.inner.registry.create_with_id(WindowId::new(id))?;
        Ok(self.window_handle(id))
    }

    /// The id [`new_window`](Self::new_window) would allocate next.
    pub fn get_new_window_id(&self) -> WindowId {
        self.inner.registry.free_id()
    }

    /// A handle to an existing window.
    pub fn window(&self, id: WindowId) -> Result<Window> {
        if !self.inner.registry.contains(id) {
            return Err(WebUiError::UnknownWindow(id));
        }
        Ok(self.window_handle(id))
    }

    /// Handles to every live window, by ascending id.
    pub fn windows(&self) -> Vec<Window> {
        self.inner
            .registry
            .ids_live()
            .into_iter()
            .map(|id| self.window_handle(id))
            .collect()
    }

    fn window_handle(&self, id: WindowId) -> Window {
        Window {
            ui: self.clone(),
            id,
        }
    }

    fn publish_shown(&self) {
        self.inner.shown.send_replace(self.inner.registry.shown_count());
    }

    /// Marks a window closed and fails whatever was waiting on it.
    fn mark_closed(&self, id: WindowId) -> Result<ShowState> {
        let previous = self.inner.registry.set_show_state(id, ShowState::Closed)?;
        self.inner.pending.close_window(id);
        self.publish_shown();
        Ok(previous)
    }

    // ── Inbound traffic ───────────────────────────────────────────────────────

    /// Queues an event from the transport on its window's worker.
    ///
    /// Events for unknown windows are dropped.  Must be called from within a
    /// tokio runtime.
    pub fn handle_event(&self, inbound: InboundEvent) {
        if !self.accept(&inbound) {
            return;
        }
        self.inner.workers.submit(inbound);
    }

    /// Runs an event on the calling thread, bypassing the worker queues.
    pub fn dispatch(&self, inbound: InboundEvent) -> DispatchOutcome {
        if !self.accept(&inbound) {
            return DispatchOutcome::Dropped;
        }
        self.inner.dispatcher.dispatch(inbound)
    }

    fn accept(&self, inbound: &InboundEvent) -> bool {
        let window = inbound.window;
        if !self.inner.registry.contains(window) {
            debug!(window = %window, element = %inbound.element, "event for unknown window dropped");
            return false;
        }
        match inbound.event_type {
            EventType::Disconnected => {
                if let Ok(ShowState::Shown) = self.mark_closed(window) {
                    info!(window = %window, "window closed by browser");
                }
            }
            EventType::Connected => debug!(window = %window, "browser connected"),
            _ => {}
        }
        true
    }

    /// Delivers the outcome of a script started by [`Window::script`].
    /// A script that returned nothing resolves to an empty string.
    ///
    /// Returns whether a caller was still waiting for it.
    pub fn deliver_script_result(
        &self,
        window: WindowId,
        event_number: u64,
        result: std::result::Result<WireValue, String>,
    ) -> bool {
        let pending = &self.inner.pending;
        match result {
            Ok(wire) => match script_value_from_wire(&wire) {
                Ok(value) => pending.fulfil(window, event_number, value),
                Err(e) => pending.reject(window, event_number, e),
            },
            Err(message) => pending.reject(window, event_number, WebUiError::ScriptError { window, message }),
        }
    }

    /// Pending-response table of this context.
    pub fn pending(&self) -> &Arc<PendingResponses> {
        &self.inner.pending
    }

    // ── Lifetime ──────────────────────────────────────────────────────────────

    /// Resolves once no window is shown.
    ///
    /// Returns immediately if nothing is shown right now.
    pub async fn wait(&self) {
        let mut rx = self.inner.shown.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|shown| *shown == 0).await;
    }

    /// Closes every window, which also releases [`wait`](Self::wait).
    pub fn exit(&self) {
        for window in self.windows() {
            if let Err(e) = window.close() {
                debug!(window = %window.id(), "close on exit: {e}");
            }
        }
        info!("all windows closed");
    }

    /// Destroys every window, fails every pending response and shuts the
    /// transport down.
    pub fn cleanup(&self) {
        for window in self.windows() {
            if let Err(e) = window.destroy() {
                debug!(window = %window.id(), "destroy on cleanup: {e}");
            }
        }
        let failed = self.inner.pending.close_all();
        self.inner.workers.stop_all();
        self.inner.bindings.clear();
        self.inner.transport.shutdown();
        self.publish_shown();
        info!(failed, "context cleaned up");
    }
}

// ── Window handle ─────────────────────────────────────────────────────────────

/// Handle to one window of a [`WebUi`] context.
#[derive(Clone)]
pub struct Window {
    ui: WebUi,
    id: WindowId,
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window").field("id", &self.id).finish()
    }
}

impl Window {
    pub fn id(&self) -> WindowId {
        self.id
    }

    fn ensure_live(&self) -> Result<()> {
        if self.ui.inner.registry.contains(self.id) {
            Ok(())
        } else {
            Err(WebUiError::UnknownWindow(self.id))
        }
    }

    /// Binds `handler` to `element`; an empty element catches every
    /// otherwise-unbound event of this window.
    pub fn bind(&self, element: &str, handler: impl Handler) -> Result<BindId> {
        self.ensure_live()?;
        let id = self.ui.inner.bindings.bind(self.id, element, handler);
        // A concurrent destroy drops the binding.
        self.ensure_live()?;
        Ok(id)
    }

    /// Shows inline markup, a URL, or a file.  A window that is already
    /// shown is refreshed in place.
    ///
    /// Relative files resolve against the window's root folder, else the
    /// default root folder.  The first successful show locks the global
    /// configuration.
    ///
    /// # Errors
    ///
    /// [`WebUiError::DisplayError`] if the file is missing or the transport
    /// could not display the window; the window's state is then unchanged.
    pub fn show(&self, content: &str) -> Result<()> {
        let ui = &self.ui.inner;
        let record = ui.registry.snapshot(self.id)?;
        let (default_root, tls) = {
            let config = self.ui.config_read();
            (config.default_root_folder().map(Path::to_path_buf), config.tls().cloned())
        };
        let root_folder = record.root_folder.or(default_root);
        let content = Content::classify(content).resolve(root_folder.as_deref())?;

        let request = DisplayRequest {
            window: self.id,
            content,
            root_folder,
            refresh: record.show_state == ShowState::Shown,
            tls: tls.clone(),
        };
        if let Err(e) = ui.transport.present(&request) {
            warn!(window = %self.id, "show failed: {e}");
            return Err(match e {
                WebUiError::DisplayError(_) => e,
                other => WebUiError::DisplayError(other.to_string()),
            });
        }

        let marked = ui.registry.with_record(self.id, |record| {
            record.show_state = ShowState::Shown;
            record.tls = tls;
        });
        if let Err(e) = marked {
            // Destroyed while presenting.
            ui.transport.close_window(self.id);
            warn!(window = %self.id, "window destroyed during show");
            return Err(e);
        }
        self.ui.config_write().freeze();
        ui.pending.reopen(self.id);
        self.ui.publish_shown();
        info!(window = %self.id, refresh = request.refresh, "window shown");
        Ok(())
    }

    /// Closes the window; pending responses fail with `WindowClosed`.
    /// Bindings survive, so the window can be shown again.
    pub fn close(&self) -> Result<()> {
        if self.ui.mark_closed(self.id)? == ShowState::Shown {
            self.ui.inner.transport.close_window(self.id);
            info!(window = %self.id, "window closed");
        }
        Ok(())
    }

    /// Closes the window and releases everything it owns.  Its id is never
    /// handed out again.
    pub fn destroy(&self) -> Result<()> {
        let was_shown = self.ui.mark_closed(self.id)? == ShowState::Shown;
        let ui = &self.ui.inner;
        ui.pending.remove_window(self.id);
        let unbound = ui.bindings.remove_window(self.id);
        ui.workers.stop(self.id);
        ui.registry.remove(self.id);
        // After removal, so a show racing this call cannot keep its slot.
        ui.transport.close_window(self.id);
        self.ui.publish_shown();
        info!(window = %self.id, unbound, was_shown, "window destroyed");
        Ok(())
    }

    pub fn is_shown(&self) -> bool {
        self.ui.inner.registry.is_shown(self.id)
    }

    /// Overrides the root folder for this window only.
    pub fn set_root_folder(&self, path: impl AsRef<Path>) -> Result<()> {
        self.ui.inner.registry.set_root_folder(self.id, path.as_ref())
    }

    /// Runs JavaScript without waiting for a result.
    pub fn run(&self, script: &str) -> Result<()> {
        self.ensure_live()?;
        self.ui.inner.transport.run_script(self.id, None, script)
    }

    /// Runs JavaScript and waits up to `timeout` for its value.
    ///
    /// # Errors
    ///
    /// [`WebUiError::Timeout`] if no answer arrives in time,
    /// [`WebUiError::WindowClosed`] if the window closes first,
    /// [`WebUiError::ScriptError`] if the script threw.
    pub async fn script(&self, script: &str, timeout: Duration) -> Result<Value> {
        self.ensure_live()?;
        let slot = self.ui.inner.pending.register(self.id)?;
        self.ui
            .inner
            .transport
            .run_script(self.id, Some(slot.event_number()), script)?;
        slot.wait(timeout).await
    }

    /// [`script`](Self::script) with the configured response timeout.
    pub async fn script_default(&self, script: &str) -> Result<Value> {
        let timeout = self.ui.config_read().response_timeout();
        self.script(script, timeout).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
