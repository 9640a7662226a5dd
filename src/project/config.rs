//! Environment-driven configuration.
//!
//! Every flag is optional; defaults match the documented behavior. Flag
//! names are read verbatim from the environment (the host process maps
//! editor settings onto them).

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameScope {
    /// Only open documents.
    Open,
    /// The whole workspace index.
    Workspace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatMode {
    Lossless,
    Normalize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherMode {
    /// Editor-fed file-change notifications.
    Native,
    /// Timer-driven mtime comparison.
    Polling,
    /// Native when the editor advertises dynamic watcher registration,
    /// polling otherwise.
    Auto,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub enforce_pii_checks: bool,
    pub diagnostics_workspace_enabled: bool,
    pub references_chunk: usize,
    pub rename_chunk: usize,
    pub rename_scope: RenameScope,
    pub format_mode: FormatMode,
    pub format_reflow: bool,
    pub locale: String,
    pub index_persist: bool,
    pub index_path: Option<PathBuf>,
    pub module_search_roots: Vec<PathBuf>,
    pub capability_manifest_path: Option<PathBuf>,
    pub watcher_mode: WatcherMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enforce_pii_checks: false,
            diagnostics_workspace_enabled: true,
            references_chunk: 200,
            rename_chunk: 200,
            rename_scope: RenameScope::Workspace,
            format_mode: FormatMode::Lossless,
            format_reflow: true,
            locale: "en-US".to_string(),
            index_persist: true,
            index_path: None,
            module_search_roots: vec![],
            capability_manifest_path: None,
            watcher_mode: WatcherMode::Auto,
        }
    }
}

impl Config {
    /// Read recognized flags from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_bool("enforcePiiChecks") {
            config.enforce_pii_checks = v;
        }
        if let Some(v) = env_bool("diagnosticsWorkspaceEnabled") {
            config.diagnostics_workspace_enabled = v;
        }
        if let Some(v) = env_usize("referencesChunk") {
            config.references_chunk = v;
        }
        if let Some(v) = env_usize("renameChunk") {
            config.rename_chunk = v;
        }
        if let Ok(v) = std::env::var("renameScope") {
            config.rename_scope = match v.as_str() {
                "open" => RenameScope::Open,
                _ => RenameScope::Workspace,
            };
        }
        if let Ok(v) = std::env::var("formatMode") {
            config.format_mode = match v.as_str() {
                "normalize" => FormatMode::Normalize,
                _ => FormatMode::Lossless,
            };
        }
        if let Some(v) = env_bool("formatReflow") {
            config.format_reflow = v;
        }
        if let Ok(v) = std::env::var("locale") {
            if !v.is_empty() {
                config.locale = v;
            }
        }
        if let Some(v) = env_bool("indexPersist") {
            config.index_persist = v;
        }
        if let Ok(v) = std::env::var("indexPath") {
            if !v.is_empty() {
                config.index_path = Some(PathBuf::from(v));
            }
        }
        if let Ok(v) = std::env::var("moduleSearchRoots") {
            config.module_search_roots = v
                .split(':')
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect();
        }
        if let Ok(v) = std::env::var("capabilityManifestPath") {
            if !v.is_empty() {
                config.capability_manifest_path = Some(PathBuf::from(v));
            }
        }
        if let Ok(v) = std::env::var("watcherMode") {
            config.watcher_mode = match v.as_str() {
                "native" => WatcherMode::Native,
                "polling" => WatcherMode::Polling,
                _ => WatcherMode::Auto,
            };
        }
        config
    }

    /// The index snapshot path for a workspace root.
    pub fn index_path_for(&self, root: &Path) -> PathBuf {
        self.index_path
            .clone()
            .unwrap_or_else(|| root.join(".cache/index.json"))
    }
}

fn env_bool(name: &str) -> Option<bool> {
    match std::env::var(name).ok()?.as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.enforce_pii_checks);
        assert!(config.diagnostics_workspace_enabled);
        assert_eq!(config.references_chunk, 200);
        assert_eq!(config.rename_chunk, 200);
        assert_eq!(config.rename_scope, RenameScope::Workspace);
        assert_eq!(config.format_mode, FormatMode::Lossless);
        assert_eq!(config.locale, "en-US");
        assert!(config.index_persist);
        assert_eq!(config.watcher_mode, WatcherMode::Auto);
    }

    #[test]
    fn test_index_path_default() {
        let config = Config::default();
        let path = config.index_path_for(Path::new("/ws"));
        assert_eq!(path, PathBuf::from("/ws/.cache/index.json"));
    }
}
