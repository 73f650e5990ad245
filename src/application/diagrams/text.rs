//! Free-text cleanup for diagram labels.

use std::sync::LazyLock;

use regex::Regex;

/// Characters kept before truncation.
pub const TEXT_BUDGET: usize = 77 * 4;
pub const WRAP_COLUMNS: usize = 80;
const ELLIPSIS: &str = "[...]";
const LINE_BREAK: &str = "<br/>";

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").expect("Invalid regex"));
static REFS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\s*Refs:.*$").expect("Invalid regex"));

/// Cleans, truncates and wraps `text` at the default column width.
pub fn wrap_text(text: &str) -> String {
    wrap_text_at(text, WRAP_COLUMNS)
}

/// Links reduced to their text, trailing `Refs:` dropped, truncated to
/// [`TEXT_BUDGET`], greedily wrapped at `columns` and HTML-escaped.
///
/// Budget and columns count source characters, so entities are never split.
pub fn wrap_text_at(text: &str, columns: usize) -> String {
    if text.is_empty() {
        return String::new();
    }
    let unlinked = LINK_RE.replace_all(text, "$1");
    let without_refs = REFS_RE.replace(&unlinked, "");

    let truncated = if without_refs.chars().count() > TEXT_BUDGET {
        let head: String = without_refs.chars().take(TEXT_BUDGET).collect();
        format!("{head}{ELLIPSIS}")
    } else {
        without_refs.into_owned()
    };
    greedy_wrap(&truncated, columns)
        .iter()
        .map(|line| htmlize::escape_all_quotes(line.as_str()))
        .collect::<Vec<_>>()
        .join(LINE_BREAK)
}

/// Fills lines word by word up to `columns`; words longer than a line are split.
fn greedy_wrap(text: &str, columns: usize) -> Vec<String> {
    let columns = columns.max(1);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > columns {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(columns);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let needed = if current_len == 0 {
            word.len()
        } else {
            current_len + 1 + word.len()
        };
        if needed > columns && current_len > 0 {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }
    if current_len > 0 {
        lines.push(current);
    }
    lines
}
