//! Graph-intent detection.
//!
//! Two signal paths with a precedence rule: the explicit UI toggle always
//! wins; the keyword vocabulary is consulted only when the toggle is off.
//! Pure text check, no service call, never fails.

use std::sync::OnceLock;

use regex::Regex;

/// Questions shorter than this never trigger keyword detection.
pub const MIN_GRAPH_LEN: usize = 10;

/// Fixed vocabulary of visualization requests, word-bounded.
const GRAPH_KEYWORD_PATTERN: &str = r"(?i)\b(graph|chart|plot|visualize|visualization|trend|compare|comparison|distribution|histogram|pie chart|bar chart|line chart)\b";

fn graph_keywords() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(GRAPH_KEYWORD_PATTERN).unwrap())
}

/// Decide whether this turn should produce a chart.
///
/// `toggle` is the sticky UI-level switch; when it is on the question text
/// is never consulted.
pub fn needs_graph(question: &str, toggle: bool) -> bool {
    if toggle {
        return true;
    }
    keyword_match(question)
}

/// Keyword path only — used by callers that track the toggle separately.
pub fn keyword_match(question: &str) -> bool {
    let trimmed = question.trim();
    if trimmed.len() < MIN_GRAPH_LEN {
        return false;
    }
    graph_keywords().is_match(trimmed)
}
