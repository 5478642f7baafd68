//! View set loading.
//!
//! A view set is everything one context contributes: its components
//! (pre-parsed, since they are shared by every composition in the context),
//! its pages and layouts (kept as raw text and parsed per composition), and
//! the name of its default layout if one exists.
//!
//! The on-disk convention is fixed:
//!
//! ```text
//! components/*.html    components, named by file stem
//! pages/*.html         pages, named by file stem
//! *.html               layouts; `<name>.base.html` in the shared set,
//!                      `<name>.layout.html` in a context overlay
//! ```

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::RenderError;
use crate::name::DEFAULT_LAYOUT;
use crate::source::ViewSource;
use crate::template::TemplateSet;

const COMPONENTS_GLOB: &str = "components/*.html";
const PAGES_GLOB: &str = "pages/*.html";
const LAYOUTS_GLOB: &str = "*.html";

const BASE_SUFFIX: &str = ".base.html";
const LAYOUT_SUFFIX: &str = ".layout.html";

/// One context's loaded views. Rebuilt from its source on hot reload.
#[derive(Clone)]
pub(crate) struct ViewSet {
    pub(crate) source: Arc<dyn ViewSource>,

    pub(crate) layouts: FxHashMap<String, String>,
    pub(crate) pages: FxHashMap<String, String>,
    pub(crate) default_layout: Option<String>,

    pub(crate) components: TemplateSet,
}

impl ViewSet {
    /// Load all views from `source`. `overlay` selects the layout naming
    /// convention: context overlays use `.layout.html`, the shared set
    /// `.base.html`. Fails on the first unreadable or unparsable file.
    pub(crate) fn build(
        source: Arc<dyn ViewSource>,
        overlay: bool,
    ) -> Result<Self, RenderError> {
        let mut components = TemplateSet::new();
        for path in source.glob(COMPONENTS_GLOB)? {
            let text = source.read(&path)?;
            components.define(component_name(&path), &text)?;
        }
        debug!(count = components.len(), "loaded components");

        let mut pages = FxHashMap::default();
        for path in source.glob(PAGES_GLOB)? {
            let text = source.read(&path)?;
            pages.insert(page_name(&path).to_owned(), text);
        }
        debug!(count = pages.len(), "loaded pages");

        let mut layouts = FxHashMap::default();
        let mut default_layout = None;
        for path in source.glob(LAYOUTS_GLOB)? {
            let text = source.read(&path)?;
            let name = if overlay {
                layout_name(&path)
            } else {
                base_name(&path)
            };
            if name == DEFAULT_LAYOUT {
                default_layout = Some(name.to_owned());
            }
            layouts.insert(name.to_owned(), text);
        }
        debug!(count = layouts.len(), "loaded layouts");

        Ok(Self {
            source,
            layouts,
            pages,
            default_layout,
            components,
        })
    }
}

fn component_name(path: &str) -> &str {
    strip(path, "components/", ".html")
}

fn page_name(path: &str) -> &str {
    strip(path, "pages/", ".html")
}

fn base_name(path: &str) -> &str {
    path.strip_suffix(BASE_SUFFIX).unwrap_or(path)
}

fn layout_name(path: &str) -> &str {
    path.strip_suffix(LAYOUT_SUFFIX).unwrap_or(path)
}

fn strip<'p>(path: &'p str, prefix: &str, suffix: &str) -> &'p str {
    let path = path.strip_prefix(prefix).unwrap_or(path);
    path.strip_suffix(suffix).unwrap_or(path)
}
