//! Local evaluation preview
//!
//! Parses YAML or JSON input, evaluates a path expression against it and
//! renders the result as YAML. Every failure is turned into
//! [`Rendered::Error`] so callers never have to handle a parse or evaluation
//! error themselves.

pub mod path;

use anyhow::{bail, Result};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub use path::{NavigationEngine, PathEngine};

/// Format of the input text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum InputFormat {
    #[default]
    #[value(alias = "yml")]
    Yaml,
    Json,
}

impl FromStr for InputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(InputFormat::Yaml),
            "json" => Ok(InputFormat::Json),
            other => bail!("unknown input format '{}', expected yaml or json", other),
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputFormat::Yaml => f.write_str("yaml"),
            InputFormat::Json => f.write_str("json"),
        }
    }
}

/// Rendered outcome of an evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// Result serialized as YAML
    Output(String),
    /// Parse or evaluation failure message
    Error(String),
}

impl Rendered {
    pub fn is_error(&self) -> bool {
        matches!(self, Rendered::Error(_))
    }

    pub fn text(&self) -> &str {
        match self {
            Rendered::Output(text) | Rendered::Error(text) => text,
        }
    }
}

/// Parse input text into a document value
pub fn parse_input(format: InputFormat, text: &str) -> Result<Value> {
    let value: Value = match format {
        InputFormat::Yaml => serde_yaml::from_str(text)?,
        InputFormat::Json => serde_json::from_str(text)?,
    };
    Ok(value)
}

/// Evaluate `path` against `text` with the built-in engine
pub fn evaluate(format: InputFormat, text: &str, path: &str) -> Rendered {
    evaluate_with(&NavigationEngine, format, text, path)
}

pub fn evaluate_with(
    engine: &dyn PathEngine,
    format: InputFormat,
    text: &str,
    path: &str,
) -> Rendered {
    match try_evaluate(engine, format, text, path) {
        Ok(yaml) => Rendered::Output(yaml),
        Err(e) => {
            tracing::debug!(%format, error = %e, "evaluation failed");
            Rendered::Error(e.to_string())
        }
    }
}

fn try_evaluate(engine: &dyn PathEngine, format: InputFormat, text: &str, path: &str) -> Result<String> {
    let document = parse_input(format, text)?;
    let result = engine.evaluate(&document, path)?;
    Ok(serde_yaml::to_string(&result)?)
}
