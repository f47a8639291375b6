// src/storage/jsonpaths.rs

//! JSONPaths documents: an ordered list of path expressions, one per target
//! column.
//!
//! ```json
//! { "jsonpaths": ["$['artist']", "$.song.title", "$['tags'][0]"] }
//! ```
//!
//! Supported steps are `.name`, `['name']`, `["name"]` and `[index]`.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct JsonPathsDocument {
    jsonpaths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Key(String),
    Index(usize),
}

/// One compiled path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    source: String,
    steps: Vec<Step>,
}

impl JsonPath {
    pub fn parse(expr: &str) -> Result<Self, String> {
        let source = expr.trim().to_string();
        let mut rest = source
            .strip_prefix('$')
            .ok_or_else(|| format!("path '{source}' must start with '$'"))?;
        let mut steps = Vec::new();

        while !rest.is_empty() {
            if let Some(after_dot) = rest.strip_prefix('.') {
                let end = after_dot
                    .find(['.', '['])
                    .unwrap_or(after_dot.len());
                let key = &after_dot[..end];
                if key.is_empty() {
                    return Err(format!("empty key in path '{source}'"));
                }
                steps.push(Step::Key(key.to_string()));
                rest = &after_dot[end..];
            } else if let Some(inner) = rest.strip_prefix('[') {
                let close = inner
                    .find(']')
                    .ok_or_else(|| format!("unclosed '[' in path '{source}'"))?;
                let token = inner[..close].trim();
                steps.push(parse_bracket(token, &source)?);
                rest = &inner[close + 1..];
            } else {
                return Err(format!("unexpected '{rest}' in path '{source}'"));
            }
        }

        if steps.is_empty() {
            return Err(format!("path '{source}' selects the whole record"));
        }

        Ok(Self { source, steps })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluate against a record; `None` when any step is missing.
    pub fn evaluate<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        self.steps.iter().try_fold(record, |current, step| match step {
            Step::Key(key) => current.get(key.as_str()),
            Step::Index(idx) => current.get(*idx),
        })
    }
}

fn parse_bracket(token: &str, source: &str) -> Result<Step, String> {
    let quoted = token
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .or_else(|| token.strip_prefix('"').and_then(|t| t.strip_suffix('"')));

    match quoted {
        Some(key) if !key.is_empty() => Ok(Step::Key(key.to_string())),
        Some(_) => Err(format!("empty key in path '{source}'")),
        None => token
            .parse::<usize>()
            .map(Step::Index)
            .map_err(|_| format!("invalid subscript '[{token}]' in path '{source}'")),
    }
}

/// Parse a JSONPaths document into compiled paths, in column order.
pub fn parse_document(contents: &[u8]) -> Result<Vec<JsonPath>, String> {
    let doc: JsonPathsDocument = serde_json::from_slice(contents)
        .map_err(|e| format!("not a JSONPaths document: {e}"))?;

    if doc.jsonpaths.is_empty() {
        return Err("JSONPaths document lists no paths".to_string());
    }

    doc.jsonpaths.iter().map(|p| JsonPath::parse(p)).collect()
}
