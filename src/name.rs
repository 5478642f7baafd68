//! Template reference parsing.
//!
//! A reference selects what to render:
//!
//! ```text
//! [base=>][contextLayout=>]page[#fragment]    a page, optionally layered
//! #component                                  a bare component
//! ```
//!
//! `=>` separates layering segments, `#` splits a page from a fragment.
//! Whitespace around segments is insignificant; the separator characters
//! cannot appear inside a segment name.

use crate::error::RenderError;

/// Separates layering segments in a template reference.
pub(crate) const LAYER_SEPARATOR: &str = "=>";

/// Splits a page reference into page and fragment, or prefixes a component.
pub(crate) const FRAGMENT_SEPARATOR: char = '#';

/// Name of the always-present shared context.
pub const SHARED_CONTEXT: &str = "";

/// Name of the context whose layouts wrap admin renders.
pub(crate) const ADMIN_CONTEXT: &str = "admin";

/// Layout name substituted when a reference or registration omits one.
pub(crate) const DEFAULT_LAYOUT: &str = "default";

const MAX_LAYER_SEGMENTS: usize = 3;
const MAX_FRAGMENT_SEGMENTS: usize = 2;

/// A parsed template reference, enriched with context information by the
/// renderer before composition. Empty strings mean "absent".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TemplateRef {
    pub(crate) context: String,
    pub(crate) base_layout: String,
    pub(crate) context_layout: String,
    pub(crate) page: String,
    pub(crate) fragment: String,
    pub(crate) is_component: bool,
    pub(crate) render_as_admin: bool,
}

impl TemplateRef {
    /// Parse a reference string. Pure: no registry knowledge, no defaults.
    pub(crate) fn parse(reference: &str) -> Result<Self, RenderError> {
        let invalid = || RenderError::InvalidReference(reference.to_owned());

        let segments: Vec<&str> = reference.split(LAYER_SEPARATOR).collect();
        if segments.len() > MAX_LAYER_SEGMENTS {
            return Err(invalid());
        }

        let mut parsed = TemplateRef::default();
        match segments.as_slice() {
            [page] => {
                parsed.page = page.trim().to_owned();
            }
            [context_layout, page] => {
                parsed.context_layout = context_layout.trim().to_owned();
                parsed.page = page.trim().to_owned();
            }
            [base_layout, context_layout, page] => {
                parsed.base_layout = base_layout.trim().to_owned();
                parsed.context_layout = context_layout.trim().to_owned();
                parsed.page = page.trim().to_owned();
            }
            _ => unreachable!("split returns 1..=3 segments here"),
        }

        let fragments: Vec<&str> = parsed.page.split(FRAGMENT_SEPARATOR).collect();
        if fragments.len() > MAX_FRAGMENT_SEGMENTS {
            return Err(invalid());
        }
        if let [page, fragment] = fragments.as_slice() {
            let fragment = fragment.trim();
            if fragment.is_empty() {
                return Err(invalid());
            }
            // both slices borrow the page field, so build the owned
            // replacements before storing them
            let page = page.trim().to_owned();
            parsed.fragment = fragment.to_owned();
            parsed.page = page;
        }

        // a leading `#` denotes a bare component lookup
        parsed.is_component = reference.starts_with(FRAGMENT_SEPARATOR);

        let has_separator = |segment: &str| {
            segment.contains(LAYER_SEPARATOR) || segment.contains(FRAGMENT_SEPARATOR)
        };
        if has_separator(&parsed.base_layout)
            || has_separator(&parsed.context_layout)
            || has_separator(&parsed.page)
            || has_separator(&parsed.fragment)
        {
            return Err(invalid());
        }

        Ok(parsed)
    }

    /// The definition name executed against the composed template: the
    /// fragment (also the component name) if one was requested, otherwise
    /// the composed root.
    pub(crate) fn execution_name(&self) -> Option<&str> {
        if self.fragment.is_empty() {
            None
        } else {
            Some(&self.fragment)
        }
    }

    /// Fragment and component renders receive caller data unmodified,
    /// without the record/collection naming convenience.
    pub(crate) fn takes_raw_page_data(&self) -> bool {
        !self.fragment.is_empty()
    }
}

/// Split a render-call context selector into (render-as-admin, context name).
///
/// `""` selects the shared context; `name` a registered context; a
/// `admin/name` or `/admin/name` prefix selects `name` and marks the render
/// for admin wrapping.
pub(crate) fn split_context_selector(selector: &str) -> (bool, &str) {
    const ADMIN_PREFIX: &str = "admin/";

    let selector = selector.strip_prefix('/').unwrap_or(selector);
    match selector.strip_prefix(ADMIN_PREFIX) {
        Some(rest) => (true, rest),
        None => (false, selector),
    }
}
