//! File watching.
//!
//! Two modes: **native**, where the editor feeds file-change
//! notifications through [`Watcher::notify`], and **polling**, where a
//! timer thread compares file mtimes under the watched roots. The mode
//! is resolved from configuration plus whether the editor advertises
//! dynamic watcher registration.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

use super::config::WatcherMode;

const SOURCE_EXTENSIONS: &[&str] = &["prose", "cnl"];
const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    Created,
    Changed,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub kind: FileEventKind,
    pub path: PathBuf,
}

/// Health-endpoint view of the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherStatus {
    pub mode: &'static str,
    pub watched_roots: usize,
    pub pending_events: usize,
}

struct WatcherState {
    pending: VecDeque<FileEvent>,
    mtimes: FxHashMap<PathBuf, SystemTime>,
    stopped: bool,
}

/// Watches workspace roots for source-file changes.
pub struct Watcher {
    mode: WatcherMode,
    roots: Vec<PathBuf>,
    state: Arc<Mutex<WatcherState>>,
    poller: Option<std::thread::JoinHandle<()>>,
}

impl Watcher {
    /// Resolve `Auto` using the editor's advertised capability and start
    /// polling if needed.
    pub fn start(mode: WatcherMode, roots: Vec<PathBuf>, editor_supports_watchers: bool) -> Self {
        let resolved = match mode {
            WatcherMode::Auto => {
                if editor_supports_watchers {
                    WatcherMode::Native
                } else {
                    WatcherMode::Polling
                }
            }
            other => other,
        };
        let state = Arc::new(Mutex::new(WatcherState {
            pending: VecDeque::new(),
            mtimes: FxHashMap::default(),
            stopped: false,
        }));

        let poller = if resolved == WatcherMode::Polling {
            // Seed mtimes so startup does not flood Created events.
            {
                let mut guard = state.lock();
                for root in &roots {
                    scan_into(root, &mut guard.mtimes);
                }
            }
            let state = Arc::clone(&state);
            let roots = roots.clone();
            Some(
                std::thread::Builder::new()
                    .name("prose-watcher".to_string())
                    .spawn(move || poll_loop(state, roots))
                    .unwrap_or_else(|e| panic!("spawning watcher failed: {e}")),
            )
        } else {
            None
        };

        debug!(mode = ?resolved, roots = roots.len(), "watcher started");
        Self {
            mode: resolved,
            roots,
            state,
            poller,
        }
    }

    /// Native mode: the host feeds editor file-change notifications.
    pub fn notify(&self, kind: FileEventKind, path: PathBuf) {
        self.state.lock().pending.push_back(FileEvent { kind, path });
    }

    /// Drain pending events for processing.
    pub fn drain(&self) -> Vec<FileEvent> {
        self.state.lock().pending.drain(..).collect()
    }

    pub fn status(&self) -> WatcherStatus {
        let state = self.state.lock();
        WatcherStatus {
            mode: match self.mode {
                WatcherMode::Native => "native",
                WatcherMode::Polling => "polling",
                WatcherMode::Auto => "auto",
            },
            watched_roots: self.roots.len(),
            pending_events: state.pending.len(),
        }
    }

    pub fn stop(mut self) {
        self.state.lock().stopped = true;
        if let Some(poller) = self.poller.take() {
            let _ = poller.join();
        }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.state.lock().stopped = true;
    }
}

fn poll_loop(state: Arc<Mutex<WatcherState>>, roots: Vec<PathBuf>) {
    loop {
        // Short sleeps keep shutdown prompt.
        for _ in 0..(POLL_INTERVAL.as_millis() / 50) {
            if state.lock().stopped {
                return;
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        let mut current: FxHashMap<PathBuf, SystemTime> = FxHashMap::default();
        for root in &roots {
            scan_into(root, &mut current);
        }

        let mut guard = state.lock();
        if guard.stopped {
            return;
        }
        let previous = std::mem::take(&mut guard.mtimes);
        for (path, mtime) in &current {
            match previous.get(path) {
                None => guard.pending.push_back(FileEvent {
                    kind: FileEventKind::Created,
                    path: path.clone(),
                }),
                Some(old) if old != mtime => guard.pending.push_back(FileEvent {
                    kind: FileEventKind::Changed,
                    path: path.clone(),
                }),
                Some(_) => {}
            }
        }
        for path in previous.keys() {
            if !current.contains_key(path) {
                guard.pending.push_back(FileEvent {
                    kind: FileEventKind::Deleted,
                    path: path.clone(),
                });
            }
        }
        guard.mtimes = current;
    }
}

fn scan_into(dir: &Path, out: &mut FxHashMap<PathBuf, SystemTime>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            scan_into(&path, out);
            continue;
        }
        let is_source = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e));
        if !is_source {
            continue;
        }
        if let Ok(mtime) = entry.metadata().and_then(|m| m.modified()) {
            out.insert(path, mtime);
        }
    }
}
