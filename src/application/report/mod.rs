//! Markdown report rendering.
//!
//! A render runs in fixed order over one buffer: reset the numbering context,
//! assemble the body from the selected template, splice fragments, number
//! headings, synthesize the table of contents, expand RFI markers.

pub mod annexes;
pub mod context;
pub mod html;
pub mod markdown;
pub mod numberer;
pub mod passes;
pub mod sections;
pub mod templates;

use generational_arena::Index;
use tracing::debug;

use crate::domain::ThreatModelGraph;

pub use context::RenderContext;
pub use numberer::HeadingNumberer;
pub use passes::{Fragments, NumberingStart};
pub use templates::ReportTemplate;

/// Knobs of one report render.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub template: ReportTemplate,
    pub ancestor_data: bool,
    pub header_level: usize,
    pub main_title: Option<String>,
    pub heading_numbering: bool,
    pub process_toc: bool,
    pub top_level: usize,
    /// `None` disables fragment injection
    pub fragments: Option<Fragments>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            template: ReportTemplate::Full,
            ancestor_data: true,
            header_level: 1,
            main_title: None,
            heading_numbering: true,
            process_toc: true,
            top_level: 1,
            fragments: None,
        }
    }
}

/// Renders the report for `tm` with a fresh numbering context.
pub fn render_report(g: &ThreatModelGraph, tm: Index, options: &ReportOptions) -> String {
    let mut ctx = RenderContext::new();
    render_report_with(g, tm, options, &mut ctx)
}

/// Renders the report using a caller-provided context.
pub fn render_report_with(
    g: &ThreatModelGraph,
    tm: Index,
    options: &ReportOptions,
    ctx: &mut RenderContext,
) -> String {
    ctx.reset();

    let body = options.template.render(
        g,
        tm,
        ctx,
        options.ancestor_data,
        options.header_level,
        options.main_title.as_deref(),
    );
    debug!(
        "render_report: template={}, body_len={}",
        options.template,
        body.len()
    );

    let (text, start) = match &options.fragments {
        Some(fragments) => passes::inject_fragments(&body, fragments),
        None => (body, NumberingStart::Immediately),
    };

    let text = if options.heading_numbering {
        passes::number_headings(&text, ctx, options.top_level, start)
    } else {
        text
    };

    let text = if options.process_toc {
        passes::apply_toc(&text, options.top_level)
    } else {
        text.replace(markdown::TOC_PLACEHOLDER, "")
    };

    passes::expand_rfis(&text)
}
