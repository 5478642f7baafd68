//! Template source scanner.
//!
//! Turns raw template text into a body of [`Node`]s plus the list of named
//! definitions introduced by `block` and `define` actions at any depth.

use super::{DataPath, Node, TemplateError};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

pub(super) struct Parsed {
    pub(super) body: Vec<Node>,
    pub(super) defs: Vec<(String, Vec<Node>)>,
}

pub(super) fn parse(name: &str, source: &str) -> Result<Parsed, TemplateError> {
    let mut parser = Parser {
        name,
        source,
        pos: 0,
        defs: Vec::new(),
    };

    let (body, terminator) = parser.nodes(&[])?;
    debug_assert!(terminator.is_none());

    Ok(Parsed {
        body,
        defs: parser.defs,
    })
}

struct Parser<'a> {
    name: &'a str,
    source: &'a str,
    pos: usize,
    defs: Vec<(String, Vec<Node>)>,
}

impl Parser<'_> {
    fn syntax(&self, detail: impl Into<String>) -> TemplateError {
        TemplateError::Syntax {
            name: self.name.to_owned(),
            detail: detail.into(),
        }
    }

    /// Parse nodes until end of input or one of `terminators` (`end`/`else`).
    /// Returns the matched terminator, if any.
    fn nodes(
        &mut self,
        terminators: &[&str],
    ) -> Result<(Vec<Node>, Option<String>), TemplateError> {
        let mut nodes = Vec::new();

        loop {
            let rest = &self.source[self.pos..];

            let Some(open) = rest.find(OPEN) else {
                if !terminators.is_empty() {
                    return Err(self.syntax("missing {{ end }}"));
                }
                if !rest.is_empty() {
                    nodes.push(Node::Text(rest.to_owned()));
                }
                self.pos = self.source.len();
                return Ok((nodes, None));
            };

            if open > 0 {
                nodes.push(Node::Text(rest[..open].to_owned()));
            }

            let after = &rest[open + OPEN.len()..];
            let Some(close) = after.find(CLOSE) else {
                return Err(self.syntax("unclosed action"));
            };
            let action = after[..close].trim();
            self.pos += open + OPEN.len() + close + CLOSE.len();

            if terminators.contains(&action) {
                return Ok((nodes, Some(action.to_owned())));
            }
            if action == "end" || action == "else" {
                return Err(self.syntax(format!("unexpected `{action}`")));
            }

            if let Some(node) = self.action(action)? {
                nodes.push(node);
            }
        }
    }

    /// Parse one action body (the text between `{{` and `}}`).
    /// `define` produces no inline node.
    fn action(&mut self, action: &str) -> Result<Option<Node>, TemplateError> {
        let mut tokens = action.split_whitespace();
        let Some(head) = tokens.next() else {
            return Err(self.syntax("empty action"));
        };

        let node = match head {
            "block" => {
                let name = self.quoted(tokens.next())?;
                let arg = self.optional_path(&mut tokens)?;
                let (body, _) = self.nodes(&["end"])?;
                self.defs.push((name.clone(), body));
                Node::Include { name, arg }
            }
            "define" => {
                let name = self.quoted(tokens.next())?;
                self.done(&mut tokens)?;
                let (body, _) = self.nodes(&["end"])?;
                self.defs.push((name, body));
                return Ok(None);
            }
            "template" => {
                let name = self.quoted(tokens.next())?;
                let arg = self.optional_path(&mut tokens)?;
                Node::Include { name, arg }
            }
            "if" => {
                let cond = self.path(tokens.next())?;
                self.done(&mut tokens)?;
                let (then, terminator) = self.nodes(&["end", "else"])?;
                let otherwise = if terminator.as_deref() == Some("else") {
                    self.nodes(&["end"])?.0
                } else {
                    Vec::new()
                };
                Node::If {
                    cond,
                    then,
                    otherwise,
                }
            }
            "range" => {
                let over = self.path(tokens.next())?;
                self.done(&mut tokens)?;
                let (body, _) = self.nodes(&["end"])?;
                Node::Range { over, body }
            }
            _ if head.starts_with('.') => {
                self.done(&mut tokens)?;
                Node::Output(self.parse_path(head)?)
            }
            _ => return Err(self.syntax(format!("unknown action `{head}`"))),
        };

        self.done(&mut tokens)?;
        Ok(Some(node))
    }

    fn done<'t>(&self, tokens: &mut impl Iterator<Item = &'t str>) -> Result<(), TemplateError> {
        match tokens.next() {
            Some(extra) => Err(self.syntax(format!("unexpected `{extra}`"))),
            None => Ok(()),
        }
    }

    fn quoted(&self, token: Option<&str>) -> Result<String, TemplateError> {
        let Some(token) = token else {
            return Err(self.syntax("expected a quoted template name"));
        };
        token
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| self.syntax(format!("expected a quoted template name, got `{token}`")))
    }

    fn path(&self, token: Option<&str>) -> Result<DataPath, TemplateError> {
        let Some(token) = token else {
            return Err(self.syntax("expected a data path"));
        };
        self.parse_path(token)
    }

    fn optional_path<'t>(
        &self,
        tokens: &mut impl Iterator<Item = &'t str>,
    ) -> Result<Option<DataPath>, TemplateError> {
        match tokens.next() {
            Some(token) => Ok(Some(self.parse_path(token)?)),
            None => Ok(None),
        }
    }

    fn parse_path(&self, token: &str) -> Result<DataPath, TemplateError> {
        let Some(rest) = token.strip_prefix('.') else {
            return Err(self.syntax(format!("expected a data path, got `{token}`")));
        };
        if rest.is_empty() {
            return Ok(DataPath(Vec::new()));
        }

        let segments: Vec<String> = rest.split('.').map(str::to_owned).collect();
        if segments.iter().any(String::is_empty) {
            return Err(self.syntax(format!("invalid data path `{token}`")));
        }

        Ok(DataPath(segments))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_text_only() {
        let parsed = parse("t", "just text").unwrap();
        assert_eq!(parsed.body, vec![Node::Text("just text".to_owned())]);
        assert!(parsed.defs.is_empty());
    }

    #[test]
    fn test_parse_output_path() {
        let parsed = parse("t", "{{ .a.b }}").unwrap();
        assert_eq!(
            parsed.body,
            vec![Node::Output(DataPath(vec!["a".to_owned(), "b".to_owned()]))]
        );
    }

    #[test]
    fn test_parse_dot_is_empty_path() {
        let parsed = parse("t", "{{ . }}").unwrap();
        assert_eq!(parsed.body, vec![Node::Output(DataPath(Vec::new()))]);
    }

    #[test]
    fn test_parse_block_registers_definition_and_inclusion() {
        let parsed = parse("t", r#"{{ block "b" . }}body{{ end }}"#).unwrap();
        assert_eq!(
            parsed.body,
            vec![Node::Include {
                name: "b".to_owned(),
                arg: Some(DataPath(Vec::new())),
            }]
        );
        assert_eq!(parsed.defs.len(), 1);
        assert_eq!(parsed.defs[0].0, "b");
        assert_eq!(parsed.defs[0].1, vec![Node::Text("body".to_owned())]);
    }

    #[test]
    fn test_parse_nested_block_definitions_collected() {
        let parsed = parse(
            "t",
            r#"{{ block "outer" . }}{{ block "inner" . }}x{{ end }}{{ end }}"#,
        )
        .unwrap();
        let names: Vec<&str> = parsed.defs.iter().map(|(n, _)| n.as_str()).collect();
        assert!(names.contains(&"outer"));
        assert!(names.contains(&"inner"));
    }

    #[test]
    fn test_parse_rejects_unquoted_name() {
        assert!(parse("t", "{{ block content . }}x{{ end }}").is_err());
    }

    #[test]
    fn test_parse_rejects_stray_end() {
        assert!(parse("t", "{{ end }}").is_err());
    }

    #[test]
    fn test_parse_rejects_else_outside_if() {
        assert!(parse("t", r#"{{ block "b" . }}{{ else }}{{ end }}"#).is_err());
    }

    #[test]
    fn test_parse_rejects_trailing_tokens() {
        assert!(parse("t", "{{ .a extra }}").is_err());
    }

    #[test]
    fn test_parse_rejects_double_dot_path() {
        assert!(parse("t", "{{ .a..b }}").is_err());
    }
}
