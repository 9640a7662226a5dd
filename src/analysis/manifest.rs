//! Workspace capability manifest.
//!
//! A JSON file at a configured path:
//!
//! ```json
//! { "allow": { "io": ["demo.capdemo.hello", "demo.tools.*"] } }
//! ```
//!
//! Keys are lower-cased capability names; entries are fully-qualified
//! function names or `module.*` wildcards. Unknown capabilities are
//! ignored and duplicates are deduplicated on read. A missing file means
//! no restrictions. The cache is read-through with file-mtime
//! invalidation.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Manifest load failures; surfaced as `M0xx` diagnostics by the engine.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest could not be read: {0}")]
    Io(#[from] std::io::Error),
    #[error("manifest is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    allow: IndexMap<String, Vec<String>>,
}

/// Parsed allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityManifest {
    allow: IndexMap<String, IndexSet<String>>,
}

impl CapabilityManifest {
    pub fn parse(json: &str) -> Result<Self, ManifestError> {
        let raw: RawManifest = serde_json::from_str(json)?;
        let mut allow = IndexMap::new();
        for (key, entries) in raw.allow {
            // Duplicate entries dedupe via the set.
            let set: IndexSet<String> = entries.into_iter().collect();
            allow.insert(key.to_lowercase(), set);
        }
        Ok(Self { allow })
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Whether `module.func` may exercise the capability under `key`.
    pub fn allows(&self, key: &str, module: &str, func: &str) -> bool {
        let Some(entries) = self.allow.get(key) else {
            return false;
        };
        entries.contains(&format!("{module}.{func}")) || entries.contains(&format!("{module}.*"))
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.allow.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.allow.is_empty()
    }
}

/// Outcome of a manifest read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestState {
    /// No manifest configured, or the file is absent — no restrictions.
    Absent,
    Loaded(CapabilityManifest),
    /// Present but unreadable (`M001`).
    Unreadable(String),
    /// Present but not valid JSON of the expected shape (`M002`).
    Malformed(String),
}

struct CacheState {
    manifest: Option<CapabilityManifest>,
    mtime: Option<SystemTime>,
}

/// Read-through manifest cache keyed by file mtime.
pub struct ManifestCache {
    path: Option<PathBuf>,
    state: Mutex<CacheState>,
}

impl ManifestCache {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            state: Mutex::new(CacheState {
                manifest: None,
                mtime: None,
            }),
        }
    }

    /// The current state, reloading when the file changed.
    pub fn state(&self) -> ManifestState {
        let Some(path) = self.path.as_ref() else {
            return ManifestState::Absent;
        };
        let mut state = self.state.lock();

        let mtime = std::fs::metadata(path).and_then(|m| m.modified()).ok();
        if mtime.is_none() {
            // File absent: forget any previously loaded manifest.
            state.manifest = None;
            state.mtime = None;
            return ManifestState::Absent;
        }
        if mtime == state.mtime {
            if let Some(manifest) = &state.manifest {
                return ManifestState::Loaded(manifest.clone());
            }
        }

        match CapabilityManifest::load(path) {
            Ok(manifest) => {
                debug!(path = %path.display(), "capability manifest loaded");
                state.manifest = Some(manifest.clone());
                state.mtime = mtime;
                ManifestState::Loaded(manifest)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "capability manifest not loaded");
                state.manifest = None;
                state.mtime = None;
                match err {
                    ManifestError::Io(e) => ManifestState::Unreadable(e.to_string()),
                    ManifestError::Malformed(e) => ManifestState::Malformed(e.to_string()),
                }
            }
        }
    }

    /// The current manifest; load failures downgrade to `None` (the
    /// caller surfaces them via [`ManifestCache::state`]).
    pub fn current(&self) -> Option<CapabilityManifest> {
        match self.state() {
            ManifestState::Loaded(manifest) => Some(manifest),
            _ => None,
        }
    }
}
