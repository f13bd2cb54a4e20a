//! JSON extraction from free-form model output.
//!
//! Models wrap their JSON in prose, markdown fences, or both. The extractor
//! finds the most plausible JSON substring and hands it back untouched.
//! It never parses: a caller must attempt a full parse and treat a parse
//! failure exactly like an extraction miss.

use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use thiserror::Error;

lazy_static! {
    // Non-greedy so the first closing fence ends the block.
    static ref JSON_FENCE: Regex = Regex::new(r"(?s)```json\n(.*?)\n```").unwrap();
}

/// Why no usable structured output could be obtained from a response.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("no JSON found in response")]
    NoJson,

    #[error("extracted JSON failed to parse: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Extract a JSON substring from noisy response text.
///
/// 1. A ```` ```json ```` fenced block wins; its trimmed interior is returned
///    verbatim.
/// 2. Otherwise the slice from the earliest `{`/`[` to the latest `}`/`]`
///    (inclusive, trimmed) is returned.
///
/// Returns `None` for empty input, input without an opening bracket, or when
/// the closing boundary precedes the opening one.
pub fn extract_json(text: &str) -> Option<&str> {
    if text.is_empty() {
        return None;
    }

    if let Some(caps) = JSON_FENCE.captures(text) {
        return caps.get(1).map(|m| m.as_str().trim());
    }

    let start = match (text.find('{'), text.find('[')) {
        (Some(curly), Some(square)) => curly.min(square),
        (Some(curly), None) => curly,
        (None, Some(square)) => square,
        (None, None) => return None,
    };

    let end = match (text.rfind('}'), text.rfind(']')) {
        (Some(curly), Some(square)) => curly.max(square),
        (Some(curly), None) => curly,
        (None, Some(square)) => square,
        (None, None) => return None,
    };

    if end < start {
        return None;
    }

    // Brackets are single-byte, so both boundaries sit on char boundaries.
    Some(text[start..=end].trim())
}

/// Extract and deserialize in one step.
///
/// Extraction misses and parse failures both surface as [`ExtractError`].
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, ExtractError> {
    let json = extract_json(text).ok_or(ExtractError::NoJson)?;
    Ok(serde_json::from_str(json)?)
}
