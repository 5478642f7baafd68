//! Renderer error taxonomy.
//!
//! Setup misuse surfaces as [`RenderError::Create`] or
//! [`RenderError::ContextNotAdded`]; everything else is a render-time
//! failure. The four "does not exist" variants are distinct so an HTTP
//! adapter can map them to 4xx responses while the wrapped template and
//! data errors become 5xx.

use thiserror::Error;

use crate::source::SourceError;
use crate::template::TemplateError;

/// Errors returned by [`Renderer`](crate::Renderer) calls.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Setup-time misconfiguration: a failed view build or an invalid data
    /// registration. The reason is flattened to text so internal error types
    /// do not leak into the API.
    #[error("create failed: {0}")]
    Create(String),

    #[error("context not added: {0}")]
    ContextNotAdded(String),

    #[error("rendering failed: component `{0}` does not exist")]
    ComponentNotFound(String),

    #[error("rendering failed: page `{0}` does not exist")]
    PageNotFound(String),

    #[error("rendering failed: fragment `{0}` does not exist")]
    FragmentNotFound(String),

    #[error("rendering failed: layout `{0}` does not exist")]
    LayoutNotFound(String),

    /// The template reference string violates the reference grammar.
    #[error("rendering failed: invalid template reference `{0}`")]
    InvalidReference(String),

    /// The render call selected a context that was never registered.
    #[error("rendering failed: unknown context `{0}`")]
    UnknownContext(String),

    /// Template syntax or execution failure.
    #[error("rendering failed")]
    Template(#[from] TemplateError),

    /// A registered data provider returned an error.
    #[error("rendering failed: could not build data")]
    Data(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The view source failed while building or reloading a view set.
    #[error("rendering failed: could not load views")]
    Source(#[from] SourceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_failed_lookup() {
        let err = RenderError::PageNotFound("dashboard".to_owned());
        let display = format!("{err}");
        assert!(display.contains("page"));
        assert!(display.contains("dashboard"));

        let err = RenderError::LayoutNotFound("default".to_owned());
        assert!(format!("{err}").contains("layout"));
    }

    #[test]
    fn test_source_chain_is_preserved() {
        use std::error::Error as _;

        let err = RenderError::from(SourceError::NotFound("pages/p0.html".to_owned()));
        assert!(err.source().is_some());
    }
}
