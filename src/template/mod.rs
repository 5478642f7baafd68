//! Minimal named-template engine used for view composition.
//!
//! This is deliberately not a general-purpose template language. It supports
//! exactly what layered composition needs:
//!
//! - `{{ .a.b }}` / `{{ . }}` - dotted-path interpolation, HTML-escaped
//! - `{{ block "name" . }}...{{ end }}` - define `name` and include it here
//! - `{{ define "name" }}...{{ end }}` - define without including
//! - `{{ template "name" . }}` - include a named template
//! - `{{ if .path }}...{{ else }}...{{ end }}` - JSON truthiness
//! - `{{ range .path }}...{{ end }}` - iterate an array, `.` bound to the element
//!
//! The key property is late binding: an inclusion resolves against the set's
//! *current* definition of a name, so a layout parsed early can reference
//! `content` and pick up a page body parsed later. Redefining a name
//! overrides the earlier definition. This is what makes base layout ->
//! context layout -> page layering work.

mod parse;
mod render;

use std::io::Write;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;

/// Template syntax and execution errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template `{name}` syntax error: {detail}")]
    Syntax { name: String, detail: String },

    #[error("template `{0}` is not defined")]
    Undefined(String),

    #[error("template recursion limit exceeded")]
    Recursion,

    #[error("template rendering failed: {0}")]
    Render(String),

    #[error("could not write output")]
    Io(#[from] std::io::Error),
}

/// A dotted data path. Empty segments means the current value (`.`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DataPath(pub(crate) Vec<String>);

/// One parsed template instruction.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Output(DataPath),
    Include {
        name: String,
        arg: Option<DataPath>,
    },
    If {
        cond: DataPath,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
    Range {
        over: DataPath,
        body: Vec<Node>,
    },
}

/// A set of named templates plus one distinguished root.
///
/// Bodies are stored behind `Arc`, so cloning a whole set (which composition
/// does for every new page) only copies the name table. Execution never
/// mutates the set, making a cached set safe to share between renders.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    defs: FxHashMap<String, Arc<[Node]>>,
    root: Option<Arc<[Node]>>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `source` and register its body under `name`.
    ///
    /// Any `block`/`define` actions inside the source are registered as
    /// definitions of their own. An existing definition of the same name is
    /// overridden.
    pub fn define(&mut self, name: &str, source: &str) -> Result<(), TemplateError> {
        let parsed = parse::parse(name, source)?;
        for (def_name, body) in parsed.defs {
            self.defs.insert(def_name, body.into());
        }
        self.defs.insert(name.to_owned(), parsed.body.into());
        Ok(())
    }

    /// Parse `source` as the root template of the set.
    ///
    /// Nested `block`/`define` definitions are registered; the body itself
    /// gets no name and is reachable only through [`execute_root`].
    ///
    /// [`execute_root`]: TemplateSet::execute_root
    pub(crate) fn set_root(&mut self, name: &str, source: &str) -> Result<(), TemplateError> {
        let parsed = parse::parse(name, source)?;
        for (def_name, body) in parsed.defs {
            self.defs.insert(def_name, body.into());
        }
        self.root = Some(parsed.body.into());
        Ok(())
    }

    /// Use an already registered definition as the root. Returns `false` if
    /// no definition with that name exists.
    pub(crate) fn root_from(&mut self, name: &str) -> bool {
        match self.defs.get(name) {
            Some(body) => {
                self.root = Some(body.clone());
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    pub(crate) fn body(&self, name: &str) -> Option<Arc<[Node]>> {
        self.defs.get(name).cloned()
    }

    /// Copy every definition from `other` into this set, overriding
    /// definitions with the same name.
    pub(crate) fn absorb(&mut self, other: &TemplateSet) {
        for (name, body) in &other.defs {
            self.defs.insert(name.clone(), body.clone());
        }
    }

    /// Sorted definition names, for logging and assertions.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.defs.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Execute the named definition against `data`, writing to `out`.
    pub fn execute(
        &self,
        name: &str,
        data: &Value,
        out: &mut dyn Write,
    ) -> Result<(), TemplateError> {
        let body = self
            .body(name)
            .ok_or_else(|| TemplateError::Undefined(name.to_owned()))?;
        render::execute(self, &body, data, out, 0)
    }

    /// Execute the root template against `data`, writing to `out`.
    pub fn execute_root(&self, data: &Value, out: &mut dyn Write) -> Result<(), TemplateError> {
        let body = self
            .root
            .clone()
            .ok_or_else(|| TemplateError::Undefined("(root)".to_owned()))?;
        render::execute(self, &body, data, out, 0)
    }
}
