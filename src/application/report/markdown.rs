//! Markdown building blocks shared by report sections and annexes.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

pub const PAGEBREAK: &str = "<div class=\"pagebreak\"></div>";
pub const TOC_PLACEHOLDER: &str = "__TOC_PLACEHOLDER__";
pub const RFI_PLACEHOLDER: &str = "__RFI_PLACEHOLDER__";
/// Marker keeping a heading out of the table of contents.
pub const SKIP_TOC: &str = "skipTOC";

pub const PRINT_TABLE: &str =
    "<table markdown=\"block\" style=\"print-color-adjust: exact; -webkit-print-color-adjust: exact;\">";

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("Invalid regex"));

/// Anchor derived from heading text.
pub fn title_anchor(title: &str) -> String {
    let hash = title
        .to_lowercase()
        .trim_end()
        .replace(' ', "-")
        .replace([':', ',', '`', '\''], "");
    TAG_RE.replace_all(&hash, "").into_owned()
}

/// Heading line with its anchor tag and optional skip marker, without surrounding blank lines.
pub fn heading_line(level: usize, title: &str, anchor: &str, skip_toc: bool) -> String {
    let skip = if skip_toc {
        format!("  <div class='{SKIP_TOC}'></div>")
    } else {
        String::new()
    };
    let sep = if skip_toc { " " } else { "" };
    format!(
        "{} {}{sep}{skip} <a id='{anchor}'></a>",
        "#".repeat(level),
        title.trim_end()
    )
}

pub fn true_or_false_mark(value: bool) -> &'static str {
    if value {
        "<span style=\"color:green;\">&#10004;</span>"
    } else {
        "&#10060;"
    }
}

pub fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

/// HTML escaping with both quote kinds encoded.
pub fn escape(text: &str) -> String {
    htmlize::escape_all_quotes(text).into_owned()
}

/// Renders nested mappings and lists as an indented markdown list.
///
/// A negative starting level renders the first nesting without indentation.
pub fn nested_markdown_list(data: &Value, level: isize) -> String {
    let mut out = String::new();
    write_nested(data, level, &mut out);
    out
}

fn write_nested(data: &Value, level: isize, out: &mut String) {
    let indent = "  ".repeat(level.max(0) as usize);
    match data {
        Value::Object(map) => {
            for (key, value) in map {
                out.push_str(&format!("{indent}- **{key}**: "));
                match value {
                    Value::Object(_) | Value::Array(_) => {
                        out.push('\n');
                        write_nested(value, level + 1, out);
                    }
                    other => out.push_str(&format!("{}\n", scalar(other))),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Object(_) => write_nested(item, level + 1, out),
                    Value::Array(_) => {
                        out.push_str(&format!("{indent}- \n"));
                        write_nested(item, level + 1, out);
                    }
                    other => out.push_str(&format!("{indent}- {}\n", scalar(other))),
                }
            }
        }
        other => out.push_str(&format!("{indent}- {}\n", scalar(other))),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}
