//! Path expressions over parsed documents
//!
//! The built-in [`NavigationEngine`] understands the navigation subset used
//! by jute templates: dotted field steps, a `[n]` indexer and a handful of
//! collection functions. Evaluation works on collections, so stepping into an
//! array field flattens it, and missing fields simply yield nothing.
//!
//! ```text
//! $ name.given.first()
//! Patient.name[1].family
//! telecom.exists()
//! ```

use anyhow::{anyhow, bail, Result};
use serde_json::Value;

/// Evaluates a path expression against a parsed document
pub trait PathEngine: Send + Sync {
    fn evaluate(&self, input: &Value, expr: &str) -> Result<Vec<Value>>;
}

/// Built-in engine for field navigation and basic collection functions
#[derive(Debug, Default, Clone, Copy)]
pub struct NavigationEngine;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Field { name: String, index: Option<usize> },
    Call(Function),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    First,
    Last,
    Count,
    Exists,
    Empty,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "first" => Some(Function::First),
            "last" => Some(Function::Last),
            "count" => Some(Function::Count),
            "exists" => Some(Function::Exists),
            "empty" => Some(Function::Empty),
            _ => None,
        }
    }

    fn apply(self, mut items: Vec<Value>) -> Vec<Value> {
        match self {
            Function::First => items.into_iter().take(1).collect(),
            Function::Last => items.pop().into_iter().collect(),
            Function::Count => vec![Value::from(items.len())],
            Function::Exists => vec![Value::Bool(!items.is_empty())],
            Function::Empty => vec![Value::Bool(items.is_empty())],
        }
    }
}

impl PathEngine for NavigationEngine {
    fn evaluate(&self, input: &Value, expr: &str) -> Result<Vec<Value>> {
        let steps = parse(expr)?;
        let mut current = vec![input.clone()];

        for (position, step) in steps.iter().enumerate() {
            current = match step {
                Step::Field { name, index } => {
                    let selected = if position == 0 && is_resource_type(input, name) {
                        vec![input.clone()]
                    } else {
                        navigate(&current, name)
                    };
                    match index {
                        Some(n) => selected.into_iter().nth(*n).into_iter().collect(),
                        None => selected,
                    }
                }
                Step::Call(function) => function.apply(current),
            };
        }

        Ok(current)
    }
}

/// `Patient.name` starts at the root when the root is a Patient
fn is_resource_type(root: &Value, name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_uppercase())
        && root.get("resourceType").and_then(Value::as_str) == Some(name)
}

fn navigate(items: &[Value], name: &str) -> Vec<Value> {
    let mut out = Vec::new();
    for item in items {
        match item.get(name) {
            Some(Value::Array(values)) => {
                out.extend(values.iter().filter(|v| !v.is_null()).cloned());
            }
            Some(Value::Null) | None => {}
            Some(value) => out.push(value.clone()),
        }
    }
    out
}

fn parse(expr: &str) -> Result<Vec<Step>> {
    let expr = strip_marker(expr.trim());
    if expr.is_empty() {
        bail!("empty path expression");
    }

    expr.split('.')
        .map(|segment| parse_step(segment.trim()))
        .collect()
}

/// Templates mark expressions with a leading `$ `
fn strip_marker(expr: &str) -> &str {
    match expr.strip_prefix('$') {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim_start(),
        _ => expr,
    }
}

fn parse_step(segment: &str) -> Result<Step> {
    if segment.is_empty() {
        bail!("empty step in path expression");
    }

    if let Some(open) = segment.find('(') {
        let name = &segment[..open];
        if &segment[open..] != "()" {
            bail!("function '{}' takes no arguments", name);
        }
        return Function::lookup(name)
            .map(Step::Call)
            .ok_or_else(|| anyhow!("unknown function '{}'", name));
    }

    let (name, index) = match segment.find('[') {
        Some(open) => {
            let inner = segment[open + 1..]
                .strip_suffix(']')
                .ok_or_else(|| anyhow!("unclosed indexer in '{}'", segment))?;
            let index = inner
                .trim()
                .parse::<usize>()
                .map_err(|_| anyhow!("invalid index '{}' in '{}'", inner, segment))?;
            (&segment[..open], Some(index))
        }
        None => (segment, None),
    };

    if !is_identifier(name) {
        bail!("invalid identifier '{}'", name);
    }

    Ok(Step::Field {
        name: name.to_string(),
        index,
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}
