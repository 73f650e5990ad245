//! Line-oriented passes run over the assembled markdown.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::application::report::context::RenderContext;
use crate::application::report::markdown::{title_anchor, RFI_PLACEHOLDER, SKIP_TOC, TOC_PLACEHOLDER};
use crate::application::report::numberer::MAX_NUMBERED_DEPTH;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.*)$").expect("Invalid regex"));
static NUMBERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)*\s").expect("Invalid regex"));
static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s*<a (?:id|name)=['"]([^'"]*)['"]></a>"#).expect("Invalid regex")
});
static RFI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(RFI[\s:]*(.*)\)").expect("Invalid regex"));

/// Markdown spliced around the report body, each list in filename order.
#[derive(Debug, Clone, Default)]
pub struct Fragments {
    pub pre: Vec<String>,
    pub post: Vec<String>,
}

/// Line from which the numbering pass starts numbering headings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberingStart {
    Immediately,
    AtLine(usize),
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Normalized heading depth relative to `top_level`, never below 1.
fn depth(hashes: usize, top_level: usize) -> usize {
    (hashes + 1).saturating_sub(top_level).max(1)
}

/// Splices fragments around `body` and drops the TOC placeholder.
///
/// Pre fragments are applied in reverse filename order, each directly before
/// the body, so the lowest-numbered one ends up adjacent to it. Numbering
/// starts where the placeholder was, or at the body when there is none.
pub fn inject_fragments(body: &str, fragments: &Fragments) -> (String, NumberingStart) {
    let mut lines: Vec<&str> = Vec::new();
    for fragment in fragments.pre.iter().rev() {
        lines.extend(fragment.trim_end_matches('\n').split('\n'));
    }
    let body_start = lines.len();

    let body_lines: Vec<&str> = body.split('\n').collect();
    let placeholder = body_lines.iter().position(|l| l.contains(TOC_PLACEHOLDER));
    lines.extend(body_lines);
    for fragment in &fragments.post {
        lines.extend(fragment.trim_end_matches('\n').split('\n'));
    }

    let start = body_start + placeholder.unwrap_or(0);
    debug!(
        "inject_fragments: pre={}, post={}, start={}",
        fragments.pre.len(),
        fragments.post.len(),
        start
    );
    let text = lines.join("\n").replace(TOC_PLACEHOLDER, "");
    (text, NumberingStart::AtLine(start))
}

/// Prefixes headings with their hierarchical number.
///
/// Headings inside code fences, before the start line, already numbered, or
/// emitted while numbering was disabled are left as they are.
pub fn number_headings(
    markdown: &str,
    ctx: &mut RenderContext,
    top_level: usize,
    start: NumberingStart,
) -> String {
    let mut in_fence = false;
    let mut started = start == NumberingStart::Immediately;
    let mut out: Vec<String> = Vec::new();

    for (i, line) in markdown.split('\n').enumerate() {
        if let NumberingStart::AtLine(n) = start {
            started |= i >= n;
        }
        if is_fence(line) {
            in_fence = !in_fence;
            out.push(line.to_string());
            continue;
        }
        if in_fence || !started {
            out.push(line.to_string());
            continue;
        }
        let Some(caps) = HEADING_RE.captures(line) else {
            out.push(line.to_string());
            continue;
        };
        let hashes = &caps[1];
        let text = &caps[2];
        if NUMBERED_RE.is_match(text) || ctx.take_unnumbered(line) {
            out.push(line.to_string());
            continue;
        }
        let number = ctx.numberer().get_number(hashes.len(), top_level);
        if number.is_empty() {
            out.push(line.to_string());
        } else {
            out.push(format!("{hashes} {number} {text}"));
        }
    }
    out.join("\n")
}

/// Anchors every listed heading and returns the annotated markdown with the TOC text.
///
/// Headings carrying the skip marker or deeper than the numbering depth stay out.
pub fn synthesize_toc(markdown: &str, top_level: usize) -> (String, String) {
    let mut toc = String::new();
    let mut in_fence = false;
    let mut out: Vec<String> = Vec::new();

    for line in markdown.split('\n') {
        if is_fence(line) {
            in_fence = !in_fence;
        }
        let caps = match HEADING_RE.captures(line) {
            Some(caps) if !in_fence && !line.contains(SKIP_TOC) => caps,
            _ => {
                out.push(line.to_string());
                continue;
            }
        };
        let level = depth(caps[1].len(), top_level);
        if level > MAX_NUMBERED_DEPTH {
            out.push(line.to_string());
            continue;
        }
        let text = &caps[2];
        let title = ANCHOR_RE.replace_all(text, "").trim().to_string();
        let anchor = match ANCHOR_RE.captures(text) {
            Some(existing) => {
                out.push(line.to_string());
                existing[1].to_string()
            }
            None => {
                let anchor = title_anchor(&title);
                out.push(format!("{} <a id='{anchor}'></a>", line.trim_end()));
                anchor
            }
        };
        let link = format!("[{title}](#{anchor})");
        let entry = match level {
            1 => format!("**{link}**"),
            2 => format!("***{link}***"),
            _ => link,
        };
        toc.push_str(&format!("{}* {entry}\n", "  ".repeat(level - 1)));
    }
    (out.join("\n"), toc)
}

/// Replaces the TOC placeholder with the synthesized table of contents.
pub fn apply_toc(markdown: &str, top_level: usize) -> String {
    let (annotated, toc) = synthesize_toc(markdown, top_level);
    annotated.replace(TOC_PLACEHOLDER, &toc)
}

/// Turns `(RFI: text)` markers into numbered back-links and fills the RFI placeholder.
pub fn expand_rfis(markdown: &str) -> String {
    let mut requests: Vec<String> = Vec::new();
    let mut out = String::with_capacity(markdown.len());
    let mut last = 0;

    for caps in RFI_RE.captures_iter(markdown) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let n = requests.len() + 1;
        let text = caps
            .get(1)
            .map(|m| m.as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or("Please complete");
        requests.push(text.to_string());
        out.push_str(&markdown[last..whole.start()]);
        out.push_str(&format!(
            "<sup><a id=\"backtorfi{n}\" href=\"#rfi{n}\">[RFI:{n}]</a></sup> "
        ));
        last = whole.end();
    }
    out.push_str(&markdown[last..]);

    let items = requests
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "<li id=\"rfi{n}\">{r} <a href=\"#backtorfi{n}\">&#8617</a></li>",
                n = i + 1
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    out.replace(RFI_PLACEHOLDER, &format!("<ol>{items}</ol>"))
}
