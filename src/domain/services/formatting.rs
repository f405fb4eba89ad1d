#[cfg(test)]
#[path = "formatting_test.rs"]
mod tests;

use minijinja::HtmlEscape;
use once_cell::sync::Lazy;
use regex::Regex;

/// Shown in place of a reply that came back without any Korean text.
pub const FALLBACK_REPLY: &str = "(당황한 듯 잠시 말을 멈췄다가) ...응, 그래. 다시 말해줄래?";

static ACTION_RE: Lazy<Regex> = Lazy::new(|| return Regex::new(r"(\s*\([^)]+\)\s*)").unwrap());
static LEAKED_TOKENS_RE: Lazy<Regex> =
    Lazy::new(|| return Regex::new(r"(?i)milliseconds|seconds|thinking|thought").unwrap());
static LATIN_ACTION_RE: Lazy<Regex> =
    Lazy::new(|| return Regex::new(r"\([a-zA-Z\s]+\)").unwrap());
static HANGUL_RE: Lazy<Regex> = Lazy::new(|| return Regex::new(r"[가-힣]").unwrap());

/// Escapes text the same way the page template autoescapes values.
pub fn escape_html(text: &str) -> String {
    return HtmlEscape(text).to_string();
}

/// Renders a reply as HTML: stage directions in parentheses get the action
/// style and newlines become line breaks.
pub fn style(text: &str) -> String {
    let escaped = escape_html(text);
    let formatted = ACTION_RE.replace_all(&escaped, r#"<span class="action-text">$1</span>"#);

    return formatted.replace('\n', "<br>");
}

/// Cleans up model output before it enters the chat history. Steps run in a
/// fixed order: leaked reasoning tokens, Latin-only stage directions, then the
/// Korean presence check.
pub fn sanitize(text: &str) -> String {
    let without_tokens = LEAKED_TOKENS_RE.replace_all(text, "");
    let without_latin = LATIN_ACTION_RE.replace_all(&without_tokens, "");

    if !HANGUL_RE.is_match(&without_latin) {
        tracing::debug!(reply = text, "Reply had no Korean text, using fallback");
        return FALLBACK_REPLY.to_string();
    }

    return without_latin.to_string();
}
