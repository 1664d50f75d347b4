//! Line-oriented test-case spec parsing.
//!
//! A spec is a plain-text file with one test case per line in the form
//! `<input> -> <expected>`. Blank lines and `#` comments are ignored.
//! Lines without the separator are skipped rather than rejected; the
//! corpus predates strict validation and the harness stays lenient.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SpecError;

/// Separator between the input expression and the expected output.
const SEPARATOR: &str = "->";

/// A typed argument decoded from a test-case input expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArgValue {
    /// A numeric argument (all numerics are carried as f64).
    Number(f64),
    /// A plain string argument, surrounding quotes stripped.
    Text(String),
    /// A flat list of numbers/strings.
    List(Vec<ArgValue>),
}

impl ArgValue {
    /// Renders the value back into source-level literal syntax.
    ///
    /// Lists render as `[a, b, c]`, strings are quoted, and numbers that
    /// carry no fractional part render without a trailing `.0` so the
    /// staged program reads the way a human would have written it.
    pub fn to_literal(&self) -> String {
        match self {
            ArgValue::Number(n) => format_number(*n),
            ArgValue::Text(s) => format!("\"{}\"", s),
            ArgValue::List(items) => {
                let inner: Vec<String> = items.iter().map(|v| v.to_literal()).collect();
                format!("[{}]", inner.join(", "))
            }
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// One parsed test case: the raw texts plus the decoded arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Original input expression text (left of `->`).
    pub input: String,
    /// Expected output text (right of `->`, trimmed).
    pub expected: String,
    /// Decoded ordered argument list.
    pub args: Vec<ArgValue>,
}

/// Parses spec text into an ordered sequence of test cases.
///
/// # Errors
///
/// Returns `SpecError::Empty` only when the whole text trims to nothing.
/// Non-blank text whose lines are all malformed parses to an empty vec;
/// the zero-case score boundary is the scorer's concern.
pub fn parse_spec(text: &str) -> Result<Vec<TestCase>, SpecError> {
    if text.trim().is_empty() {
        return Err(SpecError::Empty);
    }

    let mut cases = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((input, expected)) = line.split_once(SEPARATOR) else {
            debug!(line, "Skipping spec line without '->' separator");
            continue;
        };

        let input = input.trim().to_string();
        cases.push(TestCase {
            args: decode_input(&input),
            input,
            expected: expected.trim().to_string(),
        });
    }

    Ok(cases)
}

/// Decodes an input expression into typed arguments.
///
/// Precedence is load-bearing: a bracket-delimited input must be treated
/// as a single list before the generic comma split, otherwise `[1, 2, 3]`
/// would be mis-split into three malformed arguments.
fn decode_input(input: &str) -> Vec<ArgValue> {
    let trimmed = input.trim();

    // Whole input is one list literal.
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        return vec![decode_list(&trimmed[1..trimmed.len() - 1])];
    }

    // `[array], value` or `value, [array]` — exactly two arguments.
    if let Some(pair) = decode_list_scalar_pair(trimmed) {
        return pair;
    }

    // Generic comma split into N scalars.
    if trimmed.contains(',') {
        return trimmed.split(',').map(decode_scalar).collect();
    }

    vec![decode_scalar(trimmed)]
}

/// Decodes the two-argument mixed forms, or `None` if the input is not one.
fn decode_list_scalar_pair(input: &str) -> Option<Vec<ArgValue>> {
    if input.starts_with('[') {
        let close = input.find(']')?;
        let rest = input[close + 1..].trim_start();
        let scalar = rest.strip_prefix(',')?.trim();
        if scalar.is_empty() || scalar.contains('[') {
            return None;
        }
        Some(vec![
            decode_list(&input[1..close]),
            decode_scalar(scalar),
        ])
    } else if input.ends_with(']') {
        let open = input.find('[')?;
        let scalar = input[..open].trim_end().strip_suffix(',')?.trim();
        if scalar.is_empty() || scalar.contains(',') {
            return None;
        }
        Some(vec![
            decode_scalar(scalar),
            decode_list(&input[open + 1..input.len() - 1]),
        ])
    } else {
        None
    }
}

/// Decodes bracket-inner content into a flat list argument.
fn decode_list(inner: &str) -> ArgValue {
    if inner.trim().is_empty() {
        return ArgValue::List(Vec::new());
    }
    ArgValue::List(inner.split(',').map(decode_scalar).collect())
}

/// Decodes a single element: numeric parse first, raw string otherwise.
fn decode_scalar(raw: &str) -> ArgValue {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(n) => ArgValue::Number(n),
        Err(_) => ArgValue::Text(strip_quotes(trimmed).to_string()),
    }
}

/// Strips one pair of matching surrounding quotes, if present.
///
/// Re-rendering always quotes strings, so parsing must not keep the
/// original quotes or the staged literal would be double-quoted.
fn strip_quotes(s: &str) -> &str {
    if s.len() >= 2 {
        let bytes = s.as_bytes();
        if (bytes[0] == b'"' && bytes[s.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[s.len() - 1] == b'\'')
        {
            return &s[1..s.len() - 1];
        }
    }
    s
}
