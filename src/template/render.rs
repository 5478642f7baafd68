//! Template execution.
//!
//! Walks parsed nodes against a `serde_json::Value`, resolving inclusions
//! through the owning [`TemplateSet`] so that late-bound overrides win.

use std::io::Write;

use serde_json::Value;

use super::{DataPath, Node, TemplateError, TemplateSet};

/// Guards against mutually recursive definitions.
const MAX_DEPTH: usize = 64;

const NULL: Value = Value::Null;

pub(super) fn execute(
    set: &TemplateSet,
    nodes: &[Node],
    data: &Value,
    out: &mut dyn Write,
    depth: usize,
) -> Result<(), TemplateError> {
    if depth > MAX_DEPTH {
        return Err(TemplateError::Recursion);
    }

    for node in nodes {
        match node {
            Node::Text(text) => out.write_all(text.as_bytes())?,
            Node::Output(path) => write_value(resolve(data, path), out)?,
            Node::Include { name, arg } => {
                let body = set
                    .body(name)
                    .ok_or_else(|| TemplateError::Undefined(name.clone()))?;
                let scoped = match arg {
                    Some(path) => resolve(data, path),
                    None => data,
                };
                execute(set, &body, scoped, out, depth + 1)?;
            }
            Node::If {
                cond,
                then,
                otherwise,
            } => {
                let branch = if truthy(resolve(data, cond)) {
                    then
                } else {
                    otherwise
                };
                execute(set, branch, data, out, depth + 1)?;
            }
            Node::Range { over, body } => {
                if let Value::Array(items) = resolve(data, over) {
                    for item in items {
                        execute(set, body, item, out, depth + 1)?;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Follow a dotted path through objects; anything missing resolves to null.
fn resolve<'v>(data: &'v Value, path: &DataPath) -> &'v Value {
    let mut current = data;
    for segment in &path.0 {
        current = match current {
            Value::Object(map) => map.get(segment).unwrap_or(&NULL),
            _ => &NULL,
        };
    }
    current
}

fn write_value(value: &Value, out: &mut dyn Write) -> Result<(), TemplateError> {
    match value {
        Value::Null => Ok(()),
        Value::String(text) => escape(text, out),
        Value::Bool(_) | Value::Number(_) => {
            write!(out, "{value}")?;
            Ok(())
        }
        Value::Array(_) | Value::Object(_) => {
            let json = serde_json::to_string(value)
                .map_err(|err| TemplateError::Render(err.to_string()))?;
            escape(&json, out)
        }
    }
}

/// HTML-escape `text` into `out`, copying unescaped runs in one write.
fn escape(text: &str, out: &mut dyn Write) -> Result<(), TemplateError> {
    let mut rest = text;
    while let Some(at) = rest.find(['&', '<', '>', '"', '\'']) {
        out.write_all(rest[..at].as_bytes())?;
        let escaped: &[u8] = match rest.as_bytes()[at] {
            b'&' => b"&amp;",
            b'<' => b"&lt;",
            b'>' => b"&gt;",
            b'"' => b"&#34;",
            _ => b"&#39;",
        };
        out.write_all(escaped)?;
        rest = &rest[at + 1..];
    }
    out.write_all(rest.as_bytes())?;
    Ok(())
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
