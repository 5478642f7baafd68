//! Render orchestration.
//!
//! The [`Renderer`] owns the per-context view sets, the registered data
//! providers and the composed-template cache, and drives one render from
//! reference string to written bytes:
//!
//! 1. hot reload (when enabled): rebuild every view set, drop the cache
//! 2. parse the reference, resolve context and layout defaults
//! 3. fetch the composed template from the cache, composing on a miss
//! 4. merge provider data with caller data
//! 5. execute the root, or the requested fragment, into the writer
//!
//! Failures surface before anything is written, so a caller can still send
//! an error page on the same response.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, debug_span, info};

use crate::cache::{CacheKey, TemplateCache};
use crate::compose;
use crate::data::{self, DataProvider, DataResult, PageData};
use crate::error::RenderError;
use crate::name::{DEFAULT_LAYOUT, SHARED_CONTEXT, TemplateRef, split_context_selector};
use crate::source::ViewSource;
use crate::views::ViewSet;

/// Registry state shared by every render call. One mutex guards it all;
/// renders only hold the lock to resolve, compose on a cache miss, and
/// snapshot provider lists, never while executing templates or running
/// data providers. Cache lookups bypass the lock entirely.
struct Registry {
    views: FxHashMap<String, ViewSet>,
    base_data: FxHashMap<String, Vec<DataProvider>>,
    layout_data: FxHashMap<(String, String), Vec<DataProvider>>,
}

/// Composes and renders HTML views out of layered template files.
pub struct Renderer {
    registry: Mutex<Registry>,
    cache: TemplateCache,
    hot_reload: bool,
}

impl Renderer {
    /// Create a renderer over the shared views in `source`.
    ///
    /// With `hot_reload` every render re-reads all view sources and drops
    /// the template cache first. Meant for development only.
    pub fn new(source: Arc<dyn ViewSource>, hot_reload: bool) -> Result<Self, RenderError> {
        let shared = ViewSet::build(source, false)
            .map_err(|err| RenderError::Create(format!("could not load views: {err}")))?;

        info!(
            hot_reload,
            pages = shared.pages.len(),
            layouts = shared.layouts.len(),
            "renderer ready"
        );

        let mut views = FxHashMap::default();
        views.insert(SHARED_CONTEXT.to_owned(), shared);

        Ok(Self {
            registry: Mutex::new(Registry {
                views,
                base_data: FxHashMap::default(),
                layout_data: FxHashMap::default(),
            }),
            cache: TemplateCache::new(),
            hot_reload,
        })
    }

    /// Register a context with its own views overlaying the shared ones.
    ///
    /// The context's components are merged over the shared components once
    /// here, so renders pay no merge cost.
    pub fn add_context(
        &self,
        name: &str,
        source: Arc<dyn ViewSource>,
    ) -> Result<(), RenderError> {
        if name.is_empty() {
            return Err(RenderError::ContextNotAdded(
                "context name is empty".to_owned(),
            ));
        }

        let mut registry = self.registry.lock();
        if registry.views.contains_key(name) {
            return Err(RenderError::ContextNotAdded(format!(
                "`{name}` already added"
            )));
        }

        let overlay = ViewSet::build(source, true).map_err(|err| {
            RenderError::Create(format!("could not load views for context `{name}`: {err}"))
        })?;
        let merged = merge_components(&registry.views[SHARED_CONTEXT], overlay);

        debug!(context = name, components = merged.components.len(), "context added");
        registry.views.insert(name.to_owned(), merged);

        Ok(())
    }

    /// Register a data provider for every render using the named base
    /// layout. An empty name selects the default layout.
    pub fn add_base_data(
        &self,
        base_name: &str,
        provider: impl Fn() -> DataResult + Send + Sync + 'static,
    ) -> Result<(), RenderError> {
        let base_name = default_if_empty(base_name);

        let mut registry = self.registry.lock();
        if !registry.views[SHARED_CONTEXT].layouts.contains_key(base_name) {
            return Err(RenderError::Create(format!(
                "could not add base data: no base layout `{base_name}`"
            )));
        }

        registry
            .base_data
            .entry(base_name.to_owned())
            .or_default()
            .push(Arc::new(provider));

        Ok(())
    }

    /// Register a data provider for every render of `context` using the
    /// named context layout. An empty layout name selects the default.
    pub fn add_layout_data(
        &self,
        context: &str,
        layout_name: &str,
        provider: impl Fn() -> DataResult + Send + Sync + 'static,
    ) -> Result<(), RenderError> {
        if context == SHARED_CONTEXT {
            return Err(RenderError::Create(
                "could not add layout data: use base data for shared views".to_owned(),
            ));
        }

        let layout_name = default_if_empty(layout_name);

        let mut registry = self.registry.lock();
        let has_layout = registry
            .views
            .get(context)
            .is_some_and(|views| views.layouts.contains_key(layout_name));
        if !has_layout {
            return Err(RenderError::Create(format!(
                "could not add layout data: no layout `{layout_name}` in context `{context}`"
            )));
        }

        registry
            .layout_data
            .entry((context.to_owned(), layout_name.to_owned()))
            .or_default()
            .push(Arc::new(provider));

        Ok(())
    }

    /// Render `reference` for `context_selector` into `out`.
    ///
    /// The selector is `""` for shared views, a context name, or
    /// `admin/<context>` to wrap the context's page in the admin layout.
    pub fn render(
        &self,
        out: &mut dyn Write,
        context_selector: &str,
        reference: &str,
        data: Option<PageData>,
    ) -> Result<(), RenderError> {
        let _span = debug_span!("render", selector = context_selector, reference).entered();

        if self.hot_reload {
            self.reload()?;
        }

        let tref = self.resolve(context_selector, reference)?;
        let key = CacheKey::from(&tref);

        // the cache read stays off the registry lock, so concurrent renders
        // only contend on a miss
        let template = match self.cache.get(&key) {
            Some(template) => template,
            None => {
                let registry = self.registry.lock();
                let composed = Arc::new(compose::compose(&registry.views, &tref)?);
                self.cache.insert(key, composed.clone());
                debug!(definitions = ?composed.names(), "template composed");
                composed
            }
        };

        let (base_providers, layout_providers) = {
            let registry = self.registry.lock();
            let base_providers = registry
                .base_data
                .get(&tref.base_layout)
                .cloned()
                .unwrap_or_default();
            let layout_providers = registry
                .layout_data
                .get(&(tref.context.clone(), tref.context_layout.clone()))
                .cloned()
                .unwrap_or_default();
            (base_providers, layout_providers)
        };

        if let Some(fragment) = tref.execution_name() {
            if !template.contains(fragment) {
                return Err(RenderError::FragmentNotFound(fragment.to_owned()));
            }
        }

        let merged = data::merge(
            &base_providers,
            &layout_providers,
            tref.takes_raw_page_data(),
            data,
        )?;

        match tref.execution_name() {
            Some(fragment) => template.execute(fragment, &merged, out)?,
            None => template.execute_root(&merged, out)?,
        }

        Ok(())
    }

    /// Parse the reference and fill in context and layout defaults from the
    /// registry.
    fn resolve(&self, context_selector: &str, reference: &str) -> Result<TemplateRef, RenderError> {
        let mut tref = TemplateRef::parse(reference)?;

        let (render_as_admin, context) = split_context_selector(context_selector);
        tref.context = context.to_owned();
        tref.render_as_admin = render_as_admin;

        let registry = self.registry.lock();
        let views = registry
            .views
            .get(context)
            .ok_or_else(|| RenderError::UnknownContext(context.to_owned()))?;

        if tref.context != SHARED_CONTEXT && tref.context_layout.is_empty() {
            tref.context_layout = views.default_layout.clone().unwrap_or_default();
        }

        // shared references have no context layer: a single layout segment
        // addresses the base, and any leftover segment is dropped so
        // equivalent compositions share one cache key
        if tref.context == SHARED_CONTEXT {
            if tref.base_layout.is_empty() {
                tref.base_layout = std::mem::take(&mut tref.context_layout);
            } else {
                tref.context_layout.clear();
            }
        }

        if !tref.is_component && tref.base_layout.is_empty() {
            tref.base_layout = registry.views[SHARED_CONTEXT]
                .default_layout
                .clone()
                .unwrap_or_default();
        }

        Ok(tref)
    }

    /// Rebuild every view set from its source and drop all cached
    /// compositions. Shared views rebuild first since context components
    /// merge over them.
    fn reload(&self) -> Result<(), RenderError> {
        let mut registry = self.registry.lock();

        let shared_source = registry.views[SHARED_CONTEXT].source.clone();
        let shared = ViewSet::build(shared_source, false)?;

        let contexts: Vec<String> = registry
            .views
            .keys()
            .filter(|name| *name != SHARED_CONTEXT)
            .cloned()
            .collect();

        let mut rebuilt = FxHashMap::default();
        for name in contexts {
            let overlay = ViewSet::build(registry.views[&name].source.clone(), true)?;
            rebuilt.insert(name, merge_components(&shared, overlay));
        }
        rebuilt.insert(SHARED_CONTEXT.to_owned(), shared);

        registry.views = rebuilt;
        self.cache.invalidate();

        debug!("views reloaded");

        Ok(())
    }
}

/// Overlay a context's components over the shared ones.
fn merge_components(shared: &ViewSet, mut overlay: ViewSet) -> ViewSet {
    let mut components = shared.components.clone();
    components.absorb(&overlay.components);
    overlay.components = components;
    overlay
}

fn default_if_empty(name: &str) -> &str {
    if name.is_empty() { DEFAULT_LAYOUT } else { name }
}
