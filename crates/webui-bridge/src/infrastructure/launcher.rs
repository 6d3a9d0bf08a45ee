//! Browser launcher: turns a display request into a page and opens it.
//!
//! - **Markup** is written to a page under `pages_dir` with the bootstrap
//!   script injected.
//! - **HTML files** are copied the same way, with a `<base>` tag pointing
//!   back at their folder so relative links and assets keep working.
//! - **Other files** open directly as `file://` URLs.
//! - **URLs** open as-is; such pages must load the bootstrap themselves.
//!
//! The bootstrap script connects to the bridge, says `Hello` for its window
//! and exposes `webui.<name>(...args)` for every bound function.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info};
use webui_core::{Content, DisplayRequest, WebUiError, WindowId};

use crate::domain::BridgeConfig;

type Result<T> = std::result::Result<T, WebUiError>;

const BOOTSTRAP_JS: &str = r##"(function () {
  "use strict";
  const WS_URL = __WS_URL__;
  const WINDOW = __WINDOW__;
  const waiting = new Map();
  const queue = [];
  let socket = null;
  let ready = false;
  let nextEvent = 1;

  function send(msg) {
    if (ready) {
      socket.send(JSON.stringify(msg));
    } else {
      queue.push(msg);
    }
  }

  function call(element, ...args) {
    const event_number = nextEvent++;
    return new Promise((resolve, reject) => {
      waiting.set(event_number, { resolve, reject });
      send({ type: "Call", element, event_number, args });
    });
  }

  function settle(eventNumber, action) {
    const pending = waiting.get(eventNumber);
    if (pending) {
      waiting.delete(eventNumber);
      action(pending);
    }
  }

  function runScript(msg) {
    const reply = { type: "ScriptResult", seq: msg.seq };
    try {
      const value = new Function(msg.script)();
      if (value !== undefined && value !== null) reply.value = value;
    } catch (e) {
      reply.error = String(e);
    }
    if (msg.seq !== undefined) send(reply);
  }

  function connect() {
    socket = new WebSocket(WS_URL);
    socket.onopen = () => socket.send(JSON.stringify({ type: "Hello", window: WINDOW }));
    socket.onmessage = (frame) => {
      const msg = JSON.parse(frame.data);
      switch (msg.type) {
        case "Welcome":
          ready = true;
          while (queue.length) socket.send(JSON.stringify(queue.shift()));
          break;
        case "Response":
          settle(msg.event_number, (p) => p.resolve(msg.value));
          break;
        case "Done":
          settle(msg.event_number, (p) => p.resolve());
          break;
        case "Error":
          settle(msg.event_number, (p) => p.reject(new Error(msg.message)));
          break;
        case "RunScript":
          runScript(msg);
          break;
        case "Navigate":
          window.location.href = msg.url;
          break;
        case "Close":
          socket.close();
          window.close();
          break;
      }
    };
    socket.onclose = () => {
      ready = false;
      for (const pending of waiting.values()) pending.reject(new Error("webui: disconnected"));
      waiting.clear();
    };
  }

  document.addEventListener("click", (e) => {
    const link = e.target.closest("a[href]");
    if (link) send({ type: "Navigation", url: link.href, event_number: nextEvent++ });
    const target = e.target.closest("[id]");
    if (target) send({ type: "Click", element: target.id, event_number: nextEvent++ });
  });

  const api = { call };
  window.webui = new Proxy(api, {
    get: (target, name) => {
      if (name in target) return target[name];
      if (typeof name === "symbol" || name === "then") return undefined;
      return (...args) => call(name, ...args);
    },
  });
  connect();
})();"##;

/// The bootstrap script for `window`, ready to paste into a `<script>` tag.
pub fn bootstrap_script(ws_url: &str, window: WindowId) -> String {
    // A JSON string literal is a valid JavaScript string literal.
    let url_literal = serde_json::to_string(ws_url).unwrap_or_else(|_| "\"\"".to_string());
    BOOTSTRAP_JS
        .replace("__WS_URL__", &url_literal)
        .replace("__WINDOW__", &window.to_string())
}

/// Inserts `fragment` right after the opening `<head>` tag, else after
/// `<html>`, else at the very start.
pub fn inject_into_head(html: &str, fragment: &str) -> String {
    // ASCII lowercasing keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();
    let insert_at = ["<head", "<html"].iter().find_map(|tag| {
        let start = lower.find(tag)?;
        lower[start..].find('>').map(|end| start + end + 1)
    });
    match insert_at {
        Some(at) => format!("{}{}{}", &html[..at], fragment, &html[at..]),
        None => format!("{fragment}{html}"),
    }
}

/// `file://` URL for an absolute path.
pub fn file_url(path: &Path) -> String {
    let text = path.display().to_string();
    if cfg!(windows) {
        format!("file:///{}", text.replace('\\', "/"))
    } else {
        format!("file://{text}")
    }
}

fn is_html(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
        .unwrap_or(false)
}

fn display_error(what: impl std::fmt::Display) -> WebUiError {
    WebUiError::DisplayError(what.to_string())
}

/// Prepares pages and starts browsers.
pub struct BrowserLauncher {
    ws_url: String,
    browser: Option<String>,
    launch: bool,
    pages_dir: PathBuf,
    generation: AtomicU64,
}

impl BrowserLauncher {
    pub fn new(config: &BridgeConfig, ws_url: String) -> Self {
        Self {
            ws_url,
            browser: config.browser.clone(),
            launch: config.launch_browser,
            pages_dir: config.pages_dir.clone(),
            generation: AtomicU64::new(1),
        }
    }

    /// WebSocket URL pages connect to.
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Produces the URL for `request`, writing a page first when needed.
    ///
    /// # Errors
    ///
    /// [`WebUiError::DisplayError`] if a source file cannot be read or the
    /// page cannot be written.
    pub fn prepare(&self, request: &DisplayRequest) -> Result<String> {
        match &request.content {
            Content::Url(url) => Ok(url.clone()),
            Content::Markup(markup) => {
                let base = request.root_folder.as_deref();
                self.write_page(request.window, markup, base)
            }
            Content::File(path) if is_html(path) => {
                let markup = fs::read_to_string(path)
                    .map_err(|e| display_error(format!("cannot read {}: {e}", path.display())))?;
                self.write_page(request.window, &markup, path.parent())
            }
            Content::File(path) => Ok(file_url(path)),
        }
    }

    fn write_page(&self, window: WindowId, markup: &str, base: Option<&Path>) -> Result<String> {
        let mut head = String::new();
        if let Some(base) = base {
            let base_url = file_url(&base.canonicalize().unwrap_or_else(|_| base.to_path_buf()));
            head.push_str(&format!("<base href=\"{}/\">", base_url.trim_end_matches('/')));
        }
        head.push_str("<script>");
        head.push_str(&bootstrap_script(&self.ws_url, window));
        head.push_str("</script>");

        fs::create_dir_all(&self.pages_dir).map_err(|e| {
            display_error(format!("cannot create {}: {e}", self.pages_dir.display()))
        })?;
        // A fresh name per write so an in-place refresh is never served from cache.
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let page = self.pages_dir.join(format!("window-{window}-{generation}.html"));
        fs::write(&page, inject_into_head(markup, &head))
            .map_err(|e| display_error(format!("cannot write {}: {e}", page.display())))?;
        debug!(window = %window, page = %page.display(), "page written");
        Ok(file_url(&page))
    }

    /// Opens `url` in a browser, or only logs it when launching is disabled.
    ///
    /// # Errors
    ///
    /// [`WebUiError::DisplayError`] if the browser process cannot start.
    pub fn open(&self, window: WindowId, url: &str) -> Result<()> {
        if !self.launch {
            info!(window = %window, "browser launch disabled; open {url}");
            return Ok(());
        }
        let mut command = self.command_for(url);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
            .spawn()
            .map_err(|e| display_error(format!("could not start browser {:?}: {e}", command.get_program())))?;
        info!(window = %window, "browser opened for {url}");
        Ok(())
    }

    fn command_for(&self, url: &str) -> Command {
        if let Some(browser) = &self.browser {
            let mut command = Command::new(browser);
            command.arg(url);
            return command;
        }
        if cfg!(target_os = "windows") {
            let mut command = Command::new("cmd");
            command.args(["/C", "start", ""]).arg(url);
            command
        } else if cfg!(target_os = "macos") {
            let mut command = Command::new("open");
            command.arg(url);
            command
        } else {
            let mut command = Command::new("xdg-open");
            command.arg(url);
            command
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
