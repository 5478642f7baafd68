//! Server-side HTML view composition.
//!
//! `weft` assembles pages out of layered template files: a shared base
//! layout, an optional per-context layout, a page, and a library of
//! components usable from all of them. Contexts (think "shop", "admin",
//! one per bounded part of an application) overlay the shared views with
//! their own pages, layouts and component overrides.
//!
//! What to render is selected by a compact reference string:
//!
//! ```text
//! "hello"                  page in the default layout
//! "minimal=>hello"         page in the `minimal` layout
//! "base=>wide=>hello"      explicit base and context layout
//! "hello#greeting"         one fragment of a page
//! "#button"                a bare component
//! ```
//!
//! Composed templates are cached; with hot reload enabled every render
//! re-reads the view sources instead.
//!
//! ```
//! use std::sync::Arc;
//! use weft::{MemorySource, PageData, Renderer};
//!
//! let views: MemorySource = [
//!     ("default.base.html", r#"<html>{{ block "content" . }}{{ end }}</html>"#),
//!     ("pages/hello.html", "<h1>hello {{ .name }}</h1>"),
//! ]
//! .into_iter()
//! .collect();
//!
//! let renderer = Renderer::new(Arc::new(views), false)?;
//!
//! let mut out = Vec::new();
//! renderer.render(&mut out, "", "hello", Some(PageData::mapping([("name", "world")])))?;
//! assert_eq!(out, b"<html><h1>hello world</h1></html>");
//! # Ok::<(), weft::RenderError>(())
//! ```

mod cache;
mod compose;
mod data;
mod error;
mod name;
mod renderer;
mod source;
mod template;
mod views;

pub use data::{DataMap, DataResult, PageData};
pub use error::RenderError;
pub use name::SHARED_CONTEXT;
pub use renderer::Renderer;
pub use source::{DirSource, MemorySource, SourceError, ViewSource};
pub use template::{TemplateError, TemplateSet};
