//! The process-wide lexicon registry.
//!
//! An explicit service: create it at startup, pass handles to whatever
//! needs lexicon access, and construct isolated instances in tests.
//! Swapping the active lexicon bumps a generation counter; caches derived
//! from the previous lexicon compare generations and drop themselves.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use smol_str::SmolStr;
use tracing::info;

use super::{chinese, english, KeywordIndex, Lexicon};

struct RegistryState {
    lexicons: IndexMap<SmolStr, Arc<Lexicon>>,
    indexes: IndexMap<SmolStr, Arc<KeywordIndex>>,
    active: SmolStr,
    generation: u64,
}

/// Registry of immutable lexicons, keyed by BCP-47 id.
pub struct LexiconRegistry {
    state: RwLock<RegistryState>,
}

impl LexiconRegistry {
    /// A registry preloaded with the built-in lexicons, English active.
    pub fn with_builtins() -> Self {
        let registry = Self::empty();
        registry.register(english());
        registry.register(chinese());
        registry
    }

    /// An empty registry for tests that build their own lexicons.
    pub fn empty() -> Self {
        Self {
            state: RwLock::new(RegistryState {
                lexicons: IndexMap::new(),
                indexes: IndexMap::new(),
                active: SmolStr::new("en-US"),
                generation: 0,
            }),
        }
    }

    /// Register a lexicon and precompile its keyword index.
    pub fn register(&self, lexicon: Lexicon) {
        let id = lexicon.id.clone();
        let index = Arc::new(KeywordIndex::build(&lexicon));
        let mut state = self.state.write();
        state.lexicons.insert(id.clone(), Arc::new(lexicon));
        state.indexes.insert(id, index);
    }

    pub fn get(&self, id: &str) -> Option<Arc<Lexicon>> {
        self.state.read().lexicons.get(id).cloned()
    }

    pub fn index_for(&self, id: &str) -> Option<Arc<KeywordIndex>> {
        self.state.read().indexes.get(id).cloned()
    }

    /// The active lexicon. Falls back to the first registered lexicon if
    /// the active id was never registered.
    pub fn active(&self) -> Option<Arc<Lexicon>> {
        let state = self.state.read();
        state
            .lexicons
            .get(&state.active)
            .or_else(|| state.lexicons.values().next())
            .cloned()
    }

    /// Swap the active lexicon. Returns false when the id is unknown.
    /// A successful swap invalidates every lexicon-derived cache via the
    /// generation counter.
    pub fn set_active(&self, id: &str) -> bool {
        let mut state = self.state.write();
        if !state.lexicons.contains_key(id) {
            return false;
        }
        if state.active != id {
            state.active = SmolStr::new(id);
            state.generation += 1;
            info!(lexicon = id, generation = state.generation, "active lexicon changed");
        }
        true
    }

    /// Current cache generation. Consumers snapshot this alongside any
    /// lexicon-derived artifact and recompute when it moves.
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    pub fn ids(&self) -> Vec<SmolStr> {
        self.state.read().lexicons.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().lexicons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().lexicons.is_empty()
    }
}

impl Default for LexiconRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = LexiconRegistry::with_builtins();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("en-US").is_some());
        assert!(registry.get("zh-CN").is_some());
        assert_eq!(registry.active().unwrap().id, "en-US");
    }

    #[test]
    fn test_swap_bumps_generation() {
        let registry = LexiconRegistry::with_builtins();
        let before = registry.generation();
        assert!(registry.set_active("zh-CN"));
        assert_eq!(registry.generation(), before + 1);
        // Swapping to the already-active lexicon is a no-op.
        assert!(registry.set_active("zh-CN"));
        assert_eq!(registry.generation(), before + 1);
    }

    #[test]
    fn test_unknown_swap_rejected() {
        let registry = LexiconRegistry::with_builtins();
        assert!(!registry.set_active("fr-FR"));
        assert_eq!(registry.active().unwrap().id, "en-US");
    }

    #[test]
    fn test_isolated_instance() {
        let registry = LexiconRegistry::empty();
        assert!(registry.is_empty());
        assert!(registry.active().is_none());
    }
}
