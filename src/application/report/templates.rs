//! Fixed report layouts selectable by name.

use std::fmt;
use std::str::FromStr;

use generational_arena::Index;

use crate::application::report::annexes::{
    iso27001_summary, keys_summary, operational_hardening, testing_guide,
};
use crate::application::report::context::RenderContext;
use crate::application::report::markdown::{PAGEBREAK, RFI_PLACEHOLDER};
use crate::application::report::sections::{render_tm_report_part, SectionOptions};
use crate::domain::{DomainError, ThreatModelGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTemplate {
    /// Root with table of contents and summaries, then every annex
    Full,
    /// No table of contents; adds requests for information and the testing guide
    MkDocs,
    /// No table of contents, no summaries, keys annex only
    Compact,
}

impl ReportTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            ReportTemplate::Full => "TM_templateFull",
            ReportTemplate::MkDocs => "TM_templateMKDOCS",
            ReportTemplate::Compact => "TM_templateNoTocNoSummary",
        }
    }

    pub fn has_toc(&self) -> bool {
        matches!(self, ReportTemplate::Full)
    }

    /// Assembles the report body for `tm` and its nested models.
    pub fn render(
        &self,
        g: &ThreatModelGraph,
        tm: Index,
        ctx: &mut RenderContext,
        ancestor_data: bool,
        header_level: usize,
        main_title: Option<&str>,
    ) -> String {
        let hl = header_level;
        let root_opts = SectionOptions {
            ancestor_data,
            toc: self.has_toc(),
            summary: !matches!(self, ReportTemplate::Compact),
            header_level: hl,
            main_title,
        };
        let child_opts = SectionOptions {
            ancestor_data: false,
            header_level: hl,
            ..SectionOptions::default()
        };

        let mut lines = vec![render_tm_report_part(g, tm, ctx, &root_opts)];
        for descendant in g.descendants_tm(tm) {
            lines.push(render_tm_report_part(g, descendant, ctx, &child_opts));
        }

        let has_iso = g
            .threat_model(tm)
            .is_some_and(|d| !d.iso27001_ref.is_empty());
        match self {
            ReportTemplate::Full => {
                lines.push(PAGEBREAK.into());
                lines.push(ctx.header(hl + 1, "Annex 1 Operational Hardening", None, false));
                lines.push(operational_hardening(g, tm, ctx, hl + 1));
                lines.push(PAGEBREAK.into());
                lines.push(ctx.header(hl + 1, "Annex 2: Key Summary", None, false));
                lines.push(keys_summary(g, tm, ctx, hl + 1));
                if has_iso {
                    lines.push(PAGEBREAK.into());
                    lines.push(iso27001_summary(g, tm, ctx, hl + 1));
                }
            }
            ReportTemplate::MkDocs => {
                lines.push(ctx.header(hl + 1, "Requests For Information", None, false));
                lines.push(RFI_PLACEHOLDER.into());
                lines.push(PAGEBREAK.into());
                lines.push(operational_hardening(g, tm, ctx, hl + 1));
                lines.push(PAGEBREAK.into());
                lines.push(testing_guide(g, tm, ctx, hl + 1));
                lines.push(PAGEBREAK.into());
                lines.push(keys_summary(g, tm, ctx, hl + 1));
                if has_iso {
                    lines.push(PAGEBREAK.into());
                    lines.push(iso27001_summary(g, tm, ctx, hl + 1));
                }
            }
            ReportTemplate::Compact => {
                lines.push(PAGEBREAK.into());
                lines.push(ctx.header(hl + 1, "Annex 1: Keys Summary", None, false));
                lines.push(keys_summary(g, tm, ctx, hl + 1));
            }
        }
        lines.join("\n")
    }
}

impl FromStr for ReportTemplate {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TM_templateFull" | "TM_template" => Ok(ReportTemplate::Full),
            "TM_templateMKDOCS" => Ok(ReportTemplate::MkDocs),
            "TM_templateNoTocNoSummary" => Ok(ReportTemplate::Compact),
            other => Err(DomainError::UnknownTemplate(other.to_string())),
        }
    }
}

impl fmt::Display for ReportTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
