//! Window registry: identity allocation and per-window state.
//!
//! Each window record sits behind its own `Mutex`, and the id → record map
//! behind an `RwLock` that is only write-locked to insert or remove a whole
//! window.  Operations on one window therefore never wait on another.
//!
//! # Id policy
//!
//! Ids start at 1 and are never handed out twice by the same registry:
//! destroyed ids are retired, and `create_with_id` refuses retired ids with
//! [`WebUiError::DuplicateId`] just as it refuses live ones.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TlsConfig;
use crate::error::{Result, WebUiError};

/// Process-unique identifier of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(usize);

impl WindowId {
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for WindowId {
    fn from(id: usize) -> Self {
        Self(id)
    }
}

/// Display state of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowState {
    NotShown,
    Shown,
    Closed,
}

/// What `show` was asked to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Inline HTML.
    Markup(String),
    /// A remote or otherwise absolute URL, passed through untouched.
    Url(String),
    /// A local file, already resolved against the applicable root folder.
    File(PathBuf),
}

impl Content {
    /// Classifies a raw `show` argument without touching the filesystem.
    ///
    /// Anything that looks like markup (`<` after leading whitespace) is
    /// inline HTML; `http(s)://` and `file://` prefixes are URLs; the rest is
    /// a path.
    pub fn classify(raw: &str) -> Content {
        let trimmed = raw.trim_start();
        if trimmed.starts_with('<') {
            Content::Markup(raw.to_string())
        } else if ["http://", "https://", "file://"]
            .iter()
            .any(|prefix| trimmed.starts_with(prefix))
        {
            Content::Url(trimmed.to_string())
        } else {
            Content::File(PathBuf::from(trimmed))
        }
    }

    /// Resolves a relative file path against `root` and checks it exists.
    ///
    /// # Errors
    ///
    /// Returns [`WebUiError::DisplayError`] if the file cannot be found.
    pub fn resolve(self, root: Option<&Path>) -> Result<Content> {
        match self {
            Content::File(path) => {
                let full = match root {
                    Some(root) if path.is_relative() => root.join(&path),
                    _ => path,
                };
                if !full.is_file() {
                    return Err(WebUiError::DisplayError(format!(
                        "file {} does not exist",
                        full.display()
                    )));
                }
                Ok(Content::File(full))
            }
            other => Ok(other),
        }
    }
}

/// Everything the transport needs to put a window on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRequest {
    pub window: WindowId,
    pub content: Content,
    /// Effective root folder: the window override, else the process default.
    pub root_folder: Option<PathBuf>,
    /// The window is already shown; refresh it in place.
    pub refresh: bool,
    pub tls: Option<TlsConfig>,
}

/// State tracked for one window.
#[derive(Debug, Clone)]
pub struct WindowRecord {
    pub id: WindowId,
    pub root_folder: Option<PathBuf>,
    pub show_state: ShowState,
    pub tls: Option<TlsConfig>,
}

impl WindowRecord {
    fn new(id: WindowId) -> Self {
        Self {
            id,
            root_folder: None,
            show_state: ShowState::NotShown,
            tls: None,
        }
    }
}

/// Checks that `path` exists and is a directory.
pub(crate) fn validate_folder(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(WebUiError::path(path, "does not exist"));
    }
    if !path.is_dir() {
        return Err(WebUiError::path(path, "is not a directory"));
    }
    Ok(path.to_path_buf())
}

fn lock(record: &Mutex<WindowRecord>) -> MutexGuard<'_, WindowRecord> {
    record.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Registry ──────────────────────────────────────────────────────────────────

struct Ids {
    /// Lowest id `create` will consider next.
    next: usize,
    /// Every id ever allocated, live or destroyed.
    used: HashSet<WindowId>,
}

/// Table of every window in one bridge context.
pub struct WindowRegistry {
    windows: RwLock<HashMap<WindowId, Arc<Mutex<WindowRecord>>>>,
    ids: Mutex<Ids>,
}

impl Default for WindowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            ids: Mutex::new(Ids {
                next: 1,
                used: HashSet::new(),
            }),
        }
    }

    fn ids(&self) -> MutexGuard<'_, Ids> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, id: WindowId) {
        self.windows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(Mutex::new(WindowRecord::new(id))));
    }

    /// Allocates the next never-used id and creates its window.
    pub fn create(&self) -> WindowId {
        let id = {
            let mut ids = self.ids();
            let mut candidate = ids.next;
            while ids.used.contains(&WindowId(candidate)) {
                candidate += 1;
            }
            ids.next = candidate + 1;
            ids.used.insert(WindowId(candidate));
            WindowId(candidate)
        };
        self.insert(id);
        debug!(window = %id, "window created");
        id
    }

    /// Creates a window with a caller-chosen id.
    ///
    /// # Errors
    ///
    /// Returns [`WebUiError::DuplicateId`] if `id` was ever allocated here.
    pub fn create_with_id(&self, id: WindowId) -> Result<WindowId> {
        {
            let mut ids = self.ids();
            if !ids.used.insert(id) {
                return Err(WebUiError::DuplicateId(id));
            }
        }
        self.insert(id);
        debug!(window = %id, "window created with explicit id");
        Ok(id)
    }

    /// The id `create` would return right now, without allocating it.
    ///
    /// Another thread may claim it before the caller uses it.
    pub fn free_id(&self) -> WindowId {
        let ids = self.ids();
        let mut candidate = ids.next;
        while ids.used.contains(&WindowId(candidate)) {
            candidate += 1;
        }
        WindowId(candidate)
    }

    fn record(&self, id: WindowId) -> Result<Arc<Mutex<WindowRecord>>> {
        self.windows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(WebUiError::UnknownWindow(id))
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.record(id).is_ok()
    }

    /// A copy of the window's current state.
    pub fn snapshot(&self, id: WindowId) -> Result<WindowRecord> {
        let record = self.record(id)?;
        let copy = lock(&record).clone();
        Ok(copy)
    }

    /// Runs `f` with the window's record locked.
    pub fn with_record<T>(&self, id: WindowId, f: impl FnOnce(&mut WindowRecord) -> T) -> Result<T> {
        let record = self.record(id)?;
        let mut guard = lock(&record);
        Ok(f(&mut guard))
    }

    /// Overrides the root folder for one window.
    ///
    /// # Errors
    ///
    /// [`WebUiError::PathError`] if `path` is not an existing directory,
    /// [`WebUiError::UnknownWindow`] if the window does not exist.
    pub fn set_root_folder(&self, id: WindowId, path: &Path) -> Result<()> {
        let folder = validate_folder(path)?;
        self.with_record(id, |record| record.root_folder = Some(folder))
    }

    pub fn is_shown(&self, id: WindowId) -> bool {
        self.snapshot(id)
            .map(|record| record.show_state == ShowState::Shown)
            .unwrap_or(false)
    }

    /// Sets the show state and returns the previous one.
    pub fn set_show_state(&self, id: WindowId, state: ShowState) -> Result<ShowState> {
        self.with_record(id, |record| std::mem::replace(&mut record.show_state, state))
    }

    /// Removes a window; its id stays retired.
    pub fn remove(&self, id: WindowId) -> Option<WindowRecord> {
        let removed = self
            .windows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        removed.map(|record| lock(&record).clone())
    }

    /// Ids of every live window, sorted.
    pub fn ids_live(&self) -> Vec<WindowId> {
        let mut ids: Vec<WindowId> = self
            .windows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Number of windows currently shown.
    pub fn shown_count(&self) -> usize {
        self.ids_live()
            .into_iter()
            .filter(|id| self.is_shown(*id))
            .count()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
