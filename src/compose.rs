//! Layered template composition.
//!
//! Builds the single executable template for one resolved render target by
//! stacking up to three layers over the context's components:
//!
//! 1. the base layout from the shared views becomes the root, or a bare
//!    `content` shell when no layout is requested
//! 2. the context layout (and, for admin renders, the admin context's
//!    layout on top) is defined under the `layout` slot
//! 3. the page is defined under the `content` slot
//!
//! Slots bind late: a layer defined later overrides the slot for every
//! inclusion, which is what makes the same base wrap any context or page.

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::error::RenderError;
use crate::name::{ADMIN_CONTEXT, SHARED_CONTEXT, TemplateRef};
use crate::template::TemplateSet;
use crate::views::ViewSet;

/// Slot a context layout fills inside a base layout.
const LAYOUT_SLOT: &str = "layout";

/// Slot a page fills inside a layout.
const CONTENT_SLOT: &str = "content";

/// Root used for pages rendered without any layout.
const PAGE_SHELL: &str = r#"{{ block "content" . }}{{ end }}"#;

/// Compose the template for a fully resolved descriptor. Pure with respect
/// to the view sets: same views and descriptor, same result.
pub(crate) fn compose(
    views: &FxHashMap<String, ViewSet>,
    tref: &TemplateRef,
) -> Result<TemplateSet, RenderError> {
    let context_views = views
        .get(&tref.context)
        .ok_or_else(|| RenderError::UnknownContext(tref.context.clone()))?;

    if tref.is_component {
        let mut set = context_views.components.clone();
        if !set.root_from(&tref.fragment) {
            return Err(RenderError::ComponentNotFound(tref.fragment.clone()));
        }
        return Ok(set);
    }

    let shared = views
        .get(SHARED_CONTEXT)
        .ok_or_else(|| RenderError::UnknownContext(SHARED_CONTEXT.to_owned()))?;

    let mut set = context_views.components.clone();

    let without_layout = tref.base_layout.is_empty() && tref.context_layout.is_empty();
    if without_layout {
        set.set_root("page", PAGE_SHELL)?;
    } else {
        let base = shared
            .layouts
            .get(&tref.base_layout)
            .ok_or_else(|| RenderError::LayoutNotFound(tref.base_layout.clone()))?;
        set.set_root(&tref.base_layout, base)?;

        if tref.context != SHARED_CONTEXT && !tref.context_layout.is_empty() {
            let layout = context_views
                .layouts
                .get(&tref.context_layout)
                .ok_or_else(|| RenderError::LayoutNotFound(tref.context_layout.clone()))?;
            set.define(LAYOUT_SLOT, layout)?;
        }

        if tref.render_as_admin {
            let admin = views
                .get(ADMIN_CONTEXT)
                .and_then(|admin| admin.layouts.get(&tref.context_layout))
                .ok_or_else(|| RenderError::LayoutNotFound(tref.context_layout.clone()))?;
            set.define(LAYOUT_SLOT, admin)?;
        }
    }

    let page = context_views
        .pages
        .get(&tref.page)
        .or_else(|| shared.pages.get(&tref.page))
        .ok_or_else(|| RenderError::PageNotFound(tref.page.clone()))?;
    set.define(CONTENT_SLOT, page)?;

    trace!(page = %tref.page, definitions = ?set.names(), "composed template");

    Ok(set)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::source::{MemorySource, ViewSource};

    fn view_set(files: &[(&str, &str)], overlay: bool) -> ViewSet {
        let source: Arc<dyn ViewSource> =
            Arc::new(files.iter().copied().collect::<MemorySource>());
        ViewSet::build(source, overlay).unwrap()
    }

    fn shared_views(files: &[(&str, &str)]) -> FxHashMap<String, ViewSet> {
        let mut views = FxHashMap::default();
        views.insert(SHARED_CONTEXT.to_owned(), view_set(files, false));
        views
    }

    fn with_context(
        mut views: FxHashMap<String, ViewSet>,
        name: &str,
        files: &[(&str, &str)],
    ) -> FxHashMap<String, ViewSet> {
        let mut overlay = view_set(files, true);
        let mut components = views[SHARED_CONTEXT].components.clone();
        components.absorb(&overlay.components);
        overlay.components = components;
        views.insert(name.to_owned(), overlay);
        views
    }

    fn rendered(views: &FxHashMap<String, ViewSet>, tref: &TemplateRef) -> String {
        let set = compose(views, tref).unwrap();
        let mut out = Vec::new();
        set.execute_root(&json!({}), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn page_ref(page: &str) -> TemplateRef {
        TemplateRef {
            page: page.to_owned(),
            ..TemplateRef::default()
        }
    }

    #[test]
    fn test_page_without_layout() {
        let views = shared_views(&[("pages/hello.html", "hello world")]);
        assert_eq!(rendered(&views, &page_ref("hello")), "hello world");
    }

    #[test]
    fn test_page_inside_base_layout() {
        let views = shared_views(&[
            ("default.base.html", "<b>{{ block \"content\" . }}{{ end }}</b>"),
            ("pages/hello.html", "hello"),
        ]);
        let mut tref = page_ref("hello");
        tref.base_layout = "default".to_owned();
        assert_eq!(rendered(&views, &tref), "<b>hello</b>");
    }

    #[test]
    fn test_context_layout_fills_the_layout_slot() {
        let views = shared_views(&[(
            "default.base.html",
            "<b>{{ block \"layout\" . }}{{ block \"content\" . }}{{ end }}{{ end }}</b>",
        )]);
        let views = with_context(
            views,
            "shop",
            &[
                ("default.layout.html", "<l>{{ block \"content\" . }}{{ end }}</l>"),
                ("pages/hello.html", "hello"),
            ],
        );
        let tref = TemplateRef {
            context: "shop".to_owned(),
            base_layout: "default".to_owned(),
            context_layout: "default".to_owned(),
            page: "hello".to_owned(),
            ..TemplateRef::default()
        };
        assert_eq!(rendered(&views, &tref), "<b><l>hello</l></b>");
    }

    #[test]
    fn test_base_inline_slot_survives_empty_context_layout() {
        let views = shared_views(&[(
            "default.base.html",
            "<b>{{ block \"layout\" . }}inline {{ block \"content\" . }}{{ end }}{{ end }}</b>",
        )]);
        let views = with_context(views, "shop", &[("pages/hello.html", "hello")]);
        let tref = TemplateRef {
            context: "shop".to_owned(),
            base_layout: "default".to_owned(),
            page: "hello".to_owned(),
            ..TemplateRef::default()
        };
        assert_eq!(rendered(&views, &tref), "<b>inline hello</b>");
    }

    #[test]
    fn test_admin_layout_overrides_context_layout() {
        let views = shared_views(&[(
            "default.base.html",
            "<b>{{ block \"layout\" . }}{{ block \"content\" . }}{{ end }}{{ end }}</b>",
        )]);
        let views = with_context(
            views,
            "shop",
            &[
                ("default.layout.html", "<l>{{ block \"content\" . }}{{ end }}</l>"),
                ("pages/hello.html", "hello"),
            ],
        );
        let views = with_context(
            views,
            "admin",
            &[("default.layout.html", "<a>{{ block \"content\" . }}{{ end }}</a>")],
        );
        let tref = TemplateRef {
            context: "shop".to_owned(),
            base_layout: "default".to_owned(),
            context_layout: "default".to_owned(),
            page: "hello".to_owned(),
            render_as_admin: true,
            ..TemplateRef::default()
        };
        assert_eq!(rendered(&views, &tref), "<b><a>hello</a></b>");
    }

    #[test]
    fn test_context_page_shadows_shared_page() {
        let views = shared_views(&[("pages/hello.html", "shared")]);
        let views = with_context(views, "shop", &[("pages/hello.html", "shop")]);
        let mut tref = page_ref("hello");
        tref.context = "shop".to_owned();
        assert_eq!(rendered(&views, &tref), "shop");
    }

    #[test]
    fn test_shared_page_fallback() {
        let views = shared_views(&[("pages/hello.html", "shared")]);
        let views = with_context(views, "shop", &[]);
        let mut tref = page_ref("hello");
        tref.context = "shop".to_owned();
        assert_eq!(rendered(&views, &tref), "shared");
    }

    #[test]
    fn test_component_composition() {
        let views = shared_views(&[("components/c0.html", "c0 says {{ .msg }}")]);
        let tref = TemplateRef {
            fragment: "c0".to_owned(),
            is_component: true,
            ..TemplateRef::default()
        };
        let set = compose(&views, &tref).unwrap();
        let mut out = Vec::new();
        set.execute_root(&json!({"msg": "hi"}), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "c0 says hi");
    }

    #[test]
    fn test_page_uses_components() {
        let views = shared_views(&[
            ("components/c0.html", "[component]"),
            ("pages/hello.html", "page {{ template \"c0\" . }}"),
        ]);
        assert_eq!(rendered(&views, &page_ref("hello")), "page [component]");
    }

    #[test]
    fn test_missing_component() {
        let views = shared_views(&[]);
        let tref = TemplateRef {
            fragment: "nope".to_owned(),
            is_component: true,
            ..TemplateRef::default()
        };
        assert!(matches!(
            compose(&views, &tref),
            Err(RenderError::ComponentNotFound(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_missing_page() {
        let views = shared_views(&[]);
        assert!(matches!(
            compose(&views, &page_ref("nope")),
            Err(RenderError::PageNotFound(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_missing_base_layout() {
        let views = shared_views(&[("pages/hello.html", "hello")]);
        let mut tref = page_ref("hello");
        tref.base_layout = "default".to_owned();
        assert!(matches!(
            compose(&views, &tref),
            Err(RenderError::LayoutNotFound(name)) if name == "default"
        ));
    }

    #[test]
    fn test_missing_context_layout() {
        let views = shared_views(&[(
            "default.base.html",
            "{{ block \"content\" . }}{{ end }}",
        )]);
        let views = with_context(views, "shop", &[("pages/hello.html", "hello")]);
        let tref = TemplateRef {
            context: "shop".to_owned(),
            base_layout: "default".to_owned(),
            context_layout: "special".to_owned(),
            page: "hello".to_owned(),
            ..TemplateRef::default()
        };
        assert!(matches!(
            compose(&views, &tref),
            Err(RenderError::LayoutNotFound(name)) if name == "special"
        ));
    }

    #[test]
    fn test_composition_is_deterministic() {
        let views = shared_views(&[
            ("default.base.html", "<b>{{ block \"content\" . }}{{ end }}</b>"),
            ("pages/hello.html", "hello"),
        ]);
        let mut tref = page_ref("hello");
        tref.base_layout = "default".to_owned();

        let first = rendered(&views, &tref);
        let second = rendered(&views, &tref);
        assert_eq!(first, second);
    }
}
