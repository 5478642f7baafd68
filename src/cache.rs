//! Composed-template cache.
//!
//! The cache is read on every render and must never block concurrent
//! readers, so the map lives behind an `ArcSwap` (the same trick the config
//! hot path uses elsewhere in this codebase family): lookups are a lock-free
//! atomic load, inserts clone-and-swap. Inserts only happen once per unique
//! composition, so the copy cost is irrelevant.
//!
//! Invalidation is generational: a hot-reload pass bumps the generation and
//! swaps in an empty map. Entries are tagged with the generation they were
//! built under, so an insert racing a reload can never resurrect a stale
//! template - its tag no longer matches and the next lookup misses.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use rustc_hash::FxHashMap;

use crate::name::TemplateRef;
use crate::template::TemplateSet;

/// The deterministic identity of one fully resolved render target.
///
/// Two descriptors produce the same key exactly when they would produce the
/// same composed template; the requested fragment is deliberately absent
/// from page keys, since fragments are sub-blocks of one composition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum CacheKey {
    Component {
        context: String,
        name: String,
    },
    Page {
        context: String,
        base_layout: String,
        context_layout: String,
        page: String,
        render_as_admin: bool,
    },
}

impl From<&TemplateRef> for CacheKey {
    fn from(tref: &TemplateRef) -> Self {
        if tref.is_component {
            CacheKey::Component {
                context: tref.context.clone(),
                name: tref.fragment.clone(),
            }
        } else {
            CacheKey::Page {
                context: tref.context.clone(),
                base_layout: tref.base_layout.clone(),
                context_layout: tref.context_layout.clone(),
                page: tref.page.clone(),
                render_as_admin: tref.render_as_admin,
            }
        }
    }
}

#[derive(Clone)]
struct CachedTemplate {
    generation: u64,
    template: Arc<TemplateSet>,
}

pub(crate) struct TemplateCache {
    entries: ArcSwap<FxHashMap<CacheKey, CachedTemplate>>,
    generation: AtomicU64,
}

impl TemplateCache {
    pub(crate) fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(FxHashMap::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Lock-free lookup. Entries from an older generation are misses.
    pub(crate) fn get(&self, key: &CacheKey) -> Option<Arc<TemplateSet>> {
        let generation = self.generation.load(Ordering::Acquire);
        self.entries
            .load()
            .get(key)
            .filter(|entry| entry.generation == generation)
            .map(|entry| entry.template.clone())
    }

    /// Insert a composition under the current generation. Losing an insert
    /// race is fine: composition is a pure function of the descriptor and
    /// the current view sets, so both candidates are equivalent.
    pub(crate) fn insert(&self, key: CacheKey, template: Arc<TemplateSet>) {
        let generation = self.generation.load(Ordering::Acquire);
        self.entries.rcu(|entries| {
            let mut next = FxHashMap::clone(entries);
            next.insert(
                key.clone(),
                CachedTemplate {
                    generation,
                    template: template.clone(),
                },
            );
            next
        });
    }

    /// Drop every cached composition: bump the generation and swap in an
    /// empty map. Called as the first step of a hot-reload pass.
    pub(crate) fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::Release);
        self.entries.store(Arc::new(FxHashMap::default()));
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.load().len()
    }
}
