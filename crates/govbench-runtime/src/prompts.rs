//! Prompt templates loaded from disk.
//!
//! Two rendering styles are in use:
//!
//! - **Literal**: each `{name}` placeholder is replaced verbatim; every other
//!   brace is left alone. Used for the scenario and governance prompts, which
//!   embed JSON examples with bare braces.
//! - **Format**: `{name}` fields with `{{` and `}}` escapes. Used for the
//!   evaluation prompt. The template is parsed once at load time and any
//!   unknown or malformed field is rejected before work starts.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Placeholder in the scenario prompt.
pub const SCENARIO_CLASS_FIELD: &str = "scenario_class";
/// Placeholder in the governance prompt.
pub const SCENARIO_JSON_FIELD: &str = "scenario_json";
/// Fields accepted by the evaluation prompt.
pub const EVALUATION_FIELDS: [&str; 4] = [
    "scenario_json",
    "mi9_logs_json",
    "opentelemetry_logs_json",
    "langchain_logs_json",
];

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to read prompt template {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Prompt template {} is empty", .0.display())]
    Empty(PathBuf),

    #[error("Unterminated field starting at byte {0}")]
    Unterminated(usize),

    #[error("Single '}}' at byte {0}; use '}}}}' for a literal brace")]
    UnmatchedClose(usize),

    #[error("Invalid field name '{0}'")]
    InvalidField(String),

    #[error("Unknown field '{name}' (expected one of: {expected})")]
    UnknownField { name: String, expected: String },

    #[error("No value supplied for field '{0}'")]
    MissingValue(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Field(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Body {
    Literal(String),
    Format(Vec<Segment>),
}

/// A loaded prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    body: Body,
}

impl PromptTemplate {
    /// A template rendered by verbatim placeholder replacement.
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            body: Body::Literal(text.into()),
        }
    }

    /// Parse a format-style template, accepting only `allowed` field names.
    pub fn format(text: &str, allowed: &[&str]) -> Result<Self, TemplateError> {
        let segments = parse_format(text)?;
        for segment in &segments {
            if let Segment::Field(name) = segment {
                if !allowed.contains(&name.as_str()) {
                    return Err(TemplateError::UnknownField {
                        name: name.clone(),
                        expected: allowed.join(", "),
                    });
                }
            }
        }
        Ok(Self {
            body: Body::Format(segments),
        })
    }

    pub fn load_literal(path: &Path) -> Result<Self, TemplateError> {
        read_template(path).map(Self::literal)
    }

    pub fn load_format(path: &Path, allowed: &[&str]) -> Result<Self, TemplateError> {
        let text = read_template(path)?;
        Self::format(&text, allowed)
    }

    /// Fill the template.
    ///
    /// Literal templates ignore values whose placeholder does not occur.
    /// Format templates require a value for every field they reference.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String, TemplateError> {
        match &self.body {
            Body::Literal(text) => Ok(values.iter().fold(text.clone(), |acc, (name, value)| {
                acc.replace(&format!("{{{name}}}"), value)
            })),
            Body::Format(segments) => {
                let lookup: BTreeMap<&str, &str> = values.iter().copied().collect();
                let mut out = String::new();
                for segment in segments {
                    match segment {
                        Segment::Text(text) => out.push_str(text),
                        Segment::Field(name) => {
                            let value = lookup
                                .get(name.as_str())
                                .ok_or_else(|| TemplateError::MissingValue(name.clone()))?;
                            out.push_str(value);
                        }
                    }
                }
                Ok(out)
            }
        }
    }
}

fn read_template(path: &Path) -> Result<String, TemplateError> {
    let text = fs::read_to_string(path).map_err(|source| TemplateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if text.trim().is_empty() {
        return Err(TemplateError::Empty(path.to_path_buf()));
    }
    Ok(text)
}

fn parse_format(text: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = text.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                literal.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                literal.push('}');
            }
            '}' => return Err(TemplateError::UnmatchedClose(offset)),
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, ch)) => name.push(ch),
                        None => return Err(TemplateError::Unterminated(offset)),
                    }
                }
                if name.is_empty() || !name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
                    return Err(TemplateError::InvalidField(name));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Field(name));
            }
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Text(literal));
    }
    Ok(segments)
}
