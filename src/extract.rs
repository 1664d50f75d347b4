//! Code extraction from free-form agent responses.
//!
//! Agents are instructed to reply with a single fenced code block, but
//! they occasionally wrap code in XML-style tags, inline backticks, or
//! nothing at all. The extraction strategies are tried in strict priority
//! order and the whole input is returned verbatim as a last resort; the
//! fallback is deliberate, not an error.

use regex::Regex;
use std::sync::OnceLock;

/// Matches a triple-backtick fence with an optional language tag.
fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[a-zA-Z0-9_+\-]*\r?\n?(.*?)```").expect("valid fence regex")
    })
}

/// Matches an XML-style opening tag.
fn open_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<([A-Za-z][A-Za-z0-9_\-]*)>").expect("valid tag regex"))
}

/// Matches a single-line inline backtick span.
fn inline_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`\n]+)`").expect("valid inline regex"))
}

/// Isolates the executable snippet from an agent response.
///
/// Strategies, first match wins:
/// 1. fenced block (```lang ... ```), inner text trimmed;
/// 2. matching pair of same-named XML-style tags, inner text trimmed;
/// 3. inline backtick span;
/// 4. the entire input, verbatim.
pub fn extract_code(text: &str) -> String {
    if let Some(caps) = fence_re().captures(text) {
        return caps[1].trim().to_string();
    }

    if let Some(inner) = extract_tag_pair(text) {
        return inner;
    }

    if let Some(caps) = inline_re().captures(text) {
        return caps[1].trim().to_string();
    }

    text.to_string()
}

/// Finds the first open tag that has a matching same-named close tag.
///
/// The regex crate has no backreferences, so the close tag is located by
/// a plain substring search after the open tag.
fn extract_tag_pair(text: &str) -> Option<String> {
    for caps in open_tag_re().captures_iter(text) {
        let open = caps.get(0)?;
        let name = &caps[1];
        let close = format!("</{}>", name);
        let after = &text[open.end()..];
        if let Some(idx) = after.find(&close) {
            return Some(after[..idx].trim().to_string());
        }
    }
    None
}
