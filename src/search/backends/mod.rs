//! One module per content backend.
//!
//! Every backend exposes an async fetch function with the same failure
//! contract: transport errors, non-2xx statuses, timeouts, and parse
//! failures are logged at `warn!` and yield an empty result set for that
//! backend only — nothing propagates past the backend boundary. Each
//! backend carries its own request timeout; the scraped ones parse with
//! regular expressions over pages this system does not control, so their
//! extraction patterns are best-effort by design.

pub mod bing;
pub mod douban;
pub mod gnews;
pub mod tavily;
pub mod weibo;

use std::sync::LazyLock;

use regex::Regex;

/// Browser UA sent to the scraped endpoints — they refuse default
/// library agents.
pub(crate) const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag regex"));

/// Drop every HTML/XML tag, keeping the text between them.
pub(crate) fn strip_tags(text: &str) -> String {
    TAG_RE.replace_all(text, "").to_string()
}

/// Truncate on a character boundary — result titles and descriptions are
/// mostly CJK, so byte slicing would panic mid-codepoint.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
