//! Standalone HTML page wrapping the rendered markdown.

use pulldown_cmark::{html, Options, Parser};

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<style>
@media print {
    .pagebreak {
        clear: both;
        min-height: 1px;
        page-break-after: always;
    }
}</style>
<link rel="stylesheet" href="css/tm.css">
</head>
<body>"#;

const PAGE_TAIL: &str = "</body>\n</html>\n";

/// Converts report markdown to HTML; raw HTML blocks in the markdown pass through.
pub fn markdown_to_html(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let parser = Parser::new_ext(markdown, options);
    let mut body = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut body, parser);
    body
}

pub fn wrap_page(markdown: &str) -> String {
    format!("{PAGE_HEAD}{}{PAGE_TAIL}", markdown_to_html(markdown))
}
