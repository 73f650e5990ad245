//! Markdown for one threat model section and the blocks it is made of.

use generational_arena::Index;

use crate::application::report::context::RenderContext;
use crate::application::report::markdown::{
    escape, nested_markdown_list, true_or_false_mark, yes_no, PAGEBREAK, PRINT_TABLE,
    TOC_PLACEHOLDER,
};
use crate::domain::{ReferenceRole, ThreatModelGraph};

/// How one model section is rendered.
#[derive(Debug, Clone, Copy)]
pub struct SectionOptions<'a> {
    pub ancestor_data: bool,
    pub toc: bool,
    pub summary: bool,
    pub header_level: usize,
    /// Replaces the root section title
    pub main_title: Option<&'a str>,
}

impl Default for SectionOptions<'_> {
    fn default() -> Self {
        Self {
            ancestor_data: true,
            toc: false,
            summary: false,
            header_level: 1,
            main_title: None,
        }
    }
}

fn has_proposal(g: &ThreatModelGraph, idx: Index) -> bool {
    g.object(idx).extra("proposal").is_some()
}

fn proposal_text(g: &ThreatModelGraph, idx: Index) -> Option<String> {
    g.object(idx).extra_str("proposal")
}

fn css_class(g: &ThreatModelGraph, idx: Index) -> &'static str {
    if has_proposal(g, idx) {
        "proposal"
    } else {
        "current"
    }
}

/// Threat or its enclosing model comes from a proposal.
fn threat_from_proposal(g: &ThreatModelGraph, threat: Index) -> bool {
    has_proposal(g, threat) || g.model_of(threat).is_some_and(|tm| has_proposal(g, tm))
}

fn parent_model_id(g: &ThreatModelGraph, threat: Index) -> String {
    g.model_of(threat)
        .map(|tm| g.object(tm).id.clone())
        .unwrap_or_default()
}

fn ticket_cell(g: &ThreatModelGraph, threat: Index) -> String {
    g.threat(threat)
        .and_then(|d| d.ticket_link.as_deref())
        .filter(|link| !link.is_empty())
        .map(|link| format!("<br/><a href=\"{}\"> Ticket link  </a>", escape(link)))
        .unwrap_or_default()
}

pub fn executive_summary(g: &ThreatModelGraph, tm: Index, ctx: &mut RenderContext, hl: usize) -> String {
    let unmit_no_op = g.threats_by_mitigation_and_operational(tm, false, false);
    let mut lines = vec![
        ctx.header(hl + 1, "Executive Summary", None, false),
        "> This section contains an executive summary of the threats and their mitigation status.\n"
            .to_string(),
    ];

    if unmit_no_op.is_empty() {
        lines.push("**No unmitigated threats without operational countermeasures were identified**".into());
        return lines.join("\n");
    }

    lines.push(format!(
        "There are **{}** unmitigated threats without proposed operational controls.<br/>",
        unmit_no_op.len()
    ));
    lines.push("<div markdown=\"1\">".into());
    lines.push(PRINT_TABLE.into());
    lines.push("<tr><th>Threat ID</th><th>CVSS</th><th>Always valid?</th></tr>".into());
    for threat in unmit_no_op {
        let Some(data) = g.threat(threat) else {
            continue;
        };
        let obj = g.object(threat);
        let cvss_td = format!(
            "<td style=\"background-color: {}; \" > <span markdown=\"block\" style=\"font-weight:bold; color:white;\"><strong>{}</strong></span> </td>",
            data.cvss.smart_score_color(),
            data.cvss.smart_score_desc()
        );
        let proposal = if threat_from_proposal(g, threat) {
            "<br/><b>PROPOSAL (TBC) </b>"
        } else {
            ""
        };
        lines.push(format!(
            "<tr markdown=\"block\"><td><a href=\"#{}\">{}.<br/>{}</a>{proposal}{}</td>{cvss_td}<td  style=\"text-align: center \">{}</td></tr>",
            obj.anchor(),
            parent_model_id(g, threat),
            obj.id,
            ticket_cell(g, threat),
            yes_no(data.conditional.is_none())
        ));
    }
    lines.push("</table>".into());
    lines.push("</div>".into());
    lines.join("\n")
}

pub fn threats_summary(g: &ThreatModelGraph, tm: Index, ctx: &mut RenderContext, hl: usize) -> String {
    let unmit_no_op = g.threats_by_mitigation_and_operational(tm, false, false);
    let mitigated = g.threats_by_mitigation(tm, true);
    let unmitigated = g.threats_by_mitigation(tm, false);
    let all_count = g.all_threats(tm).len();

    let mut lines = vec![ctx.header(hl + 1, "Threats Summary", None, false)];
    if mitigated.is_empty() && unmitigated.is_empty() {
        lines.push("**No threat identified or listed **".into());
        return lines.join("\n");
    }

    lines.push(format!(
        "There are a total of **{all_count}** identified threats of which **{}** are not fully mitigated by default, and  **{}** are unmitigated without proposed operational controls.<br/>",
        unmitigated.len(),
        unmit_no_op.len()
    ));
    lines.push("<div markdown=\"1\">".into());
    lines.push(PRINT_TABLE.into());
    lines.push(
        "<tr><th>Threat ID</th><th>CVSS</th><th>Valid when (condition)</th><th>Fully mitigated</th><th>Has Operational <br/> countermeasures</th></tr>"
            .into(),
    );
    for threat in unmitigated.into_iter().chain(mitigated) {
        let Some(data) = g.threat(threat) else {
            continue;
        };
        let obj = g.object(threat);
        let cvss_td = format!(
            "<td style=\"background-color: {}; \" ><span markdown=\"block\" style=\"font-weight:bold; color:white;\"><strong>{}</strong></span></td>",
            data.cvss.smart_score_color(),
            data.cvss.smart_score_desc()
        );
        let proposal = if threat_from_proposal(g, threat) {
            "<br/><b>FROM PROPOSAL / TBC</b>"
        } else {
            ""
        };
        lines.push(format!(
            "<tr markdown=\"block\"><td><a href=\"#{}\">{}.<br/>{}</a>{proposal}{}</td>{cvss_td}<td>{}</td><td style=\"text-align: center \">{}</td><td style=\"text-align: center \">{}</td></tr>",
            obj.anchor(),
            parent_model_id(g, threat),
            obj.id,
            ticket_cell(g, threat),
            data.conditional.as_deref().unwrap_or("Always valid"),
            true_or_false_mark(data.fully_mitigated),
            yes_no(g.threat_operational(threat))
        ));
    }
    lines.push("</table></div>".into());
    lines.join("\n")
}

/// One countermeasure entry; `entry` is either an owned countermeasure or a reference to one.
///
/// Returns `None` for references whose target cannot be resolved.
pub fn render_countermeasure(g: &ThreatModelGraph, threat: Index, entry: Index) -> Option<String> {
    let is_reference = g[entry].is_reference();
    let target = if is_reference { g.resolve(entry)? } else { entry };
    let data = g.countermeasure(target)?;
    let obj = g.object(target);

    let mut lines = vec![if is_reference {
        format!(
            "<strong>Reference to <code>{}</code> {}</strong><br/>",
            obj.id,
            obj.title()
        )
    } else {
        format!("<strong> <code>{}</code> {}</strong><br/>", obj.id, obj.title())
    }];
    if let Some(versions) = &data.applies_to_versions {
        lines.push(format!(
            "<dt>Applies To Versions</dt><dd markdown=\"block\">{}</dd>",
            escape(versions)
        ));
    }
    lines.push(format!("<dd markdown=\"block\">{}</dd>", obj.description));
    if let Some(kind) = &data.mitigation_type {
        lines.push(format!(
            "<dd markdown=\"block\"><strong>Mitigation type:</strong>{kind}</dd>"
        ));
    }

    let threat_mitigated = g.threat(threat).is_some_and(|t| t.fully_mitigated);
    let not_chosen = if threat_mitigated && !data.in_place {
        " (not chosen as threat is mitigated by other countermeasures)"
    } else {
        ""
    };
    lines.push(format!(
        "<dd markdown=\"block\"><strong>Countermeasure in place?</strong> {}{not_chosen}</dd>",
        true_or_false_mark(data.in_place)
    ));

    let operational = if data.operational {
        format!(
            " <strong>Is operational?</strong>{} (operated by {})",
            true_or_false_mark(true),
            data.operator
        )
    } else {
        String::new()
    };
    lines.push(format!("{operational}</dd>"));
    Some(lines.join("\n"))
}

pub fn render_threat(g: &ThreatModelGraph, threat: Index, ctx: &mut RenderContext, hl: usize) -> String {
    let obj = g.object(threat);
    let Some(data) = g.threat(threat) else {
        return String::new();
    };

    let mut lines = vec![
        format!("<div markdown=\"1\" class='{}'>", css_class(g, threat)),
        format!("<a id=\"{}\"></a>", obj.id),
        ctx.header(
            hl + 2,
            &format!("{} (<code>{}</code>)", obj.title(), obj.id),
            Some(obj.anchor()),
            false,
        ),
    ];
    if let Some(proposal) = proposal_text(g, threat) {
        lines.push(format!("From proposal: {proposal}"));
    }
    lines.push("<div style=\"text-align: center;\">".into());
    lines.push(format!("<img src=\"img/threatTree/{}.svg\"/>", obj.id));
    lines.push("</div>".into());

    lines.push("<dl markdown=\"block\">".into());
    if let Some(versions) = &data.applies_to_versions {
        lines.push("<dt>Applies To Versions</dt>".into());
        lines.push(format!("<dd markdown=\"block\">{}</dd>", escape(versions)));
    }
    let assets = g.resolve_all(&g.references(threat, ReferenceRole::Asset));
    if !assets.is_empty() {
        lines.push("<dt>Assets (IDs) involved in this threat:</dt>".into());
        for asset in assets {
            let a = g.object(asset);
            lines.push(format!(
                "<dd markdown=\"block\"> - <code><a href=\"#{}\">{}</a></code> - {}</dd>",
                a.anchor(),
                a.id,
                a.title()
            ));
        }
    }
    let attackers = g.resolve_all(&g.references(threat, ReferenceRole::Attacker));
    if !attackers.is_empty() {
        lines.push("<dt>Threat actors:</dt>".into());
        for attacker in attackers {
            let a = g.object(attacker);
            lines.push(format!(
                "<dd markdown=\"block\"> - <code><a href=\"#{}\">{}</a></code></dd>",
                a.anchor(),
                a.id
            ));
        }
    }
    let status = if data.fully_mitigated {
        "Mitigated"
    } else {
        "Not fully mitigated"
    };
    lines.push(format!("<dt>Threat Status:</dt><dd markdown=\"block\">{status}</dd>"));
    if let Some(condition) = &data.conditional {
        lines.push(format!(
            "<dt>Threat condition:</dt><dd markdown=\"block\">{condition}</dd>"
        ));
    }
    lines.push(format!(
        "<dt>Threat Description</dt><dd markdown=\"block\">{}</dd>",
        data.attack
    ));
    lines.push(format!(
        "<dt>Impact</dt><dd markdown=\"block\">{}</dd>",
        g.impact_desc(threat)
    ));
    if let Some(attack_type) = &data.attack_type {
        lines.push("<dt>Attack type</dt>".into());
        lines.push(format!("<dd markdown=\"block\">{attack_type}</dd>"));
    }
    if !data.cvss.is_todo() {
        lines.push("<dt>CVSS</dt>".into());
        lines.push(format!(
            "<dd>\n<strong>{}:</strong> {} <br/>\n<strong>Vector:</strong><code>{}</code>\n</dd>",
            data.cvss.smart_score_type(),
            data.cvss.smart_score_desc(),
            data.cvss.clean_vector()
        ));
    }
    if let Some(compliance) = &data.compliance {
        lines.push(format!("Compliance:\n{}", nested_markdown_list(compliance, -1)));
    }
    lines.push("</dl>".into());

    if let Some(link) = data.ticket_link.as_deref().filter(|l| !l.is_empty()) {
        let safe = escape(link);
        lines.push(format!(
            "<dt><strong>Ticket link:</strong><a href=\"{safe}\"> {safe}  </a> </dt><dd markdown=\"block\"></dd>"
        ));
    }

    let countermeasures: Vec<String> = g
        .countermeasures(threat)
        .into_iter()
        .filter_map(|cm| render_countermeasure(g, threat, cm))
        .collect();
    if countermeasures.is_empty() {
        lines.push("<i>No countermeasure listed</i>".into());
    } else {
        lines.push(ctx.header(
            hl + 3,
            &format!("Counter-measures for {} ", obj.id),
            None,
            true,
        ));
        lines.push("<dl markdown=\"block\">".into());
        lines.extend(countermeasures);
        lines.push("</dl>".into());
    }
    lines.push("</div>".into());
    lines.join("\n")
}

pub fn render_security_objective(g: &ThreatModelGraph, so: Index, ctx: &mut RenderContext, hl: usize) -> String {
    let obj = g.object(so);
    let Some(data) = g.security_objective(so) else {
        return String::new();
    };
    let mut lines = vec![ctx.header(
        hl + 3,
        &format!("{} (<code>{}</code>)", obj.title(), obj.id),
        Some(obj.anchor()),
        false,
    )];
    if let Some(proposal) = proposal_text(g, so) {
        lines.push(format!("From proposal: {proposal}<br/>"));
    }
    if !data.in_scope {
        lines.push("(Not in scope)<br/>".into());
    }
    if let Some(icon) = &data.icon {
        lines.push(format!("<img src=\"{icon}\"/><br/>"));
    }
    lines.push(obj.description.clone());
    lines.push(format!("**Priority:** {}\n", data.priority));

    let contributes = g.resolve_all(&g.references(so, ReferenceRole::ContributesTo));
    if !contributes.is_empty() {
        lines.push("**Contributes to:**\n".into());
        for target in contributes {
            lines.push(format!("- {}\n", g.contributed_to_md_text(target)));
        }
    }
    if g.sec_obj_tree_image(so) {
        lines.push("**Attack tree:**\n".into());
        lines.push(format!("<img src=\"img/secObjectives/{}.svg\"/>", obj.id));
        lines.push("<img src=\"img/legend_SecObjTree.svg\" width=\"400\"/>".into());
    }
    lines.push("<hr/>".into());
    lines.join("\n")
}

/// Objectives grouped under bold group labels, in document order.
pub fn security_objectives_tree(g: &ThreatModelGraph, objectives: &[Index]) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut current: Option<&str> = None;
    for &so in objectives {
        let Some(data) = g.security_objective(so) else {
            continue;
        };
        if current != Some(data.group.as_str()) {
            if current.is_some() {
                out.push(String::new());
            }
            current = Some(data.group.as_str());
            out.push(format!("**{}:**\n", data.group));
        }
        let obj = g.object(so);
        out.push(format!("- <a href=\"#{}\">{}</a>\n", obj.anchor(), obj.title()));
    }
    out.join("\n")
}

pub fn render_attacker(g: &ThreatModelGraph, attacker: Index, ctx: &mut RenderContext, hl: usize) -> String {
    let obj = g.object(attacker);
    let Some(data) = g.attacker(attacker) else {
        return String::new();
    };
    let mut lines = vec![
        format!("<a id=\"{}\"></a>", obj.id),
        ctx.header(
            hl + 4,
            &format!("{} (<code>{}</code>)", obj.title(), obj.id),
            Some(obj.anchor()),
            true,
        ),
        "<dl markdown=\"block\">".to_string(),
        format!("<dt>Description:</dt><dd markdown=\"block\">{}</dd>", obj.description),
    ];
    if let Some(reference) = &data.reference {
        lines.push(format!("<dt>Reference:</dt><dd>{}</dd>", escape(reference)));
    }
    lines.push(format!(
        "<dt>In Scope as threat actor:</dt><dd>{}</dd>",
        yes_no(data.in_scope)
    ));
    lines.push("</dl>".into());
    if let Some(icon) = &data.icon {
        lines.push(format!("<img src=\"{icon}\"/>"));
    }
    lines.push("<hr/>".into());
    lines.join("\n")
}

pub fn render_asset(g: &ThreatModelGraph, asset: Index, ctx: &mut RenderContext, hl: usize) -> String {
    let obj = g.object(asset);
    let Some(data) = g.asset(asset) else {
        return String::new();
    };
    let scope = if data.in_scope {
        "in scope"
    } else {
        "not in scope"
    };
    let title = format!(
        "{} ({} {scope} - ID: <code>{}</code>)",
        obj.title(),
        data.asset_type.as_deref().unwrap_or_default(),
        obj.id
    );

    let mut lines = vec![format!(
        "<hr/>\n<div markdown=\"1\" class='{}'>",
        css_class(g, asset)
    )];
    if let Some(proposal) = proposal_text(g, asset) {
        lines.push(format!("From proposal: {proposal}"));
    }
    lines.push(format!("<a id=\"{}\"></a>", obj.hierarchical_id));
    lines.push(ctx.header(hl + 4, &title, Some(obj.anchor()), true));
    lines.push("<dl markdown=\"block\">".into());
    if let Some(icon) = &data.icon {
        lines.push(format!("<img src=\"{icon}\"/><br/>"));
    }
    lines.push(obj.description.clone());
    if let Some(versions) = &data.applies_to_versions {
        lines.push("<dt>Applies To Versions</dt>".into());
        lines.push(format!("<dd markdown=\"block\">{}</dd>", escape(versions)));
    }
    if data.properties.is_some() {
        lines.push("<dt markdown=\"block\">Other properties</dt>".into());
        lines.push(format!("<dd markdown=\"block\">{}</dd>", data.properties_html()));
    }
    if let Some(authentication) = &data.authentication {
        lines.push("<dt>Authentication</dt>".into());
        lines.push(format!("<dd markdown=\"block\">{authentication}</dd>"));
    }
    if let Some(specified) = data
        .specifies
        .as_deref()
        .and_then(|id| g.resolve_id(asset, id))
    {
        let s = g.object(specified);
        lines.push("<dt>Specifies, inherit analysis and attribute from:</dt>".into());
        lines.push(format!(
            "<dd markdown=\"block\"> {}  (<a href=\"#{}\">{}</a>) </dd>",
            s.title(),
            s.anchor(),
            s.id
        ));
    }
    lines.push("</dl>\n</div>".into());
    lines.join("\n")
}

/// Summary table, in-scope assets first.
pub fn render_asset_table(g: &ThreatModelGraph, assets: &[Index]) -> String {
    let mut sorted: Vec<Index> = assets.to_vec();
    sorted.sort_by_key(|&a| !g.asset(a).is_some_and(|d| d.in_scope));

    let mut lines = vec![
        "<table markdown=\"block\">".to_string(),
        "<tr><th>Title(ID)</th><th>Type</th><th>In Scope</th></tr>".to_string(),
    ];
    for asset in sorted {
        let Some(data) = g.asset(asset) else {
            continue;
        };
        let obj = g.object(asset);
        let check = if data.in_scope {
            "&#x2714;&#xFE0F;"
        } else {
            "&#x274C;"
        };
        lines.push(format!(
            "<tr markdown=\"block\"><td markdown=\"block\">{}<br/><code><strong markdown=\"block\">{}</strong></code></td><td>{}</td><td>{check}</td></tr>",
            obj.title(),
            obj.id,
            data.asset_type.as_deref().unwrap_or_default()
        ));
    }
    lines.push("</table>".into());
    lines.join("\n")
}

/// Full section for one threat model.
///
/// Numbering is switched off around the root title and its table of contents.
/// When both a table of contents and summaries are requested, every heading
/// after the table of contents moves up one level.
pub fn render_tm_report_part(
    g: &ThreatModelGraph,
    tm: Index,
    ctx: &mut RenderContext,
    opts: &SectionOptions<'_>,
) -> String {
    let Some(data) = g.threat_model(tm) else {
        return String::new();
    };
    let obj = g.object(tm);
    let is_root = g.is_root(tm);
    let model_title = obj.title();
    let mut hl = opts.header_level;
    let mut lines: Vec<String> = Vec::new();

    let numbering_was_enabled = ctx.numbering_enabled();
    if numbering_was_enabled && is_root {
        ctx.disable_numbering();
    }

    lines.push(format!("<div markdown=\"block\" class='{}'>", css_class(g, tm)));
    if let Some(proposal) = proposal_text(g, tm) {
        lines.push(format!("From proposal: {proposal}\n"));
    }

    let title = match opts.main_title.filter(|_| is_root) {
        Some(main_title) => main_title.to_string(),
        None if is_root => format!("{model_title} Threat Model"),
        None => format!("{model_title} Threat Model Section"),
    };
    lines.push(ctx.header(hl, &title, Some(obj.anchor()), is_root));

    if let Some(version) = &data.version {
        lines.push(format!("Version: {version}\n"));
    }
    if let Some(status) = &data.status {
        lines.push(format!("Status: {status}\n"));
    }
    if opts.toc {
        lines.push(format!("Last update: {}\n", ctx.last_update()));
    }
    if let Some(authors) = &data.authors {
        lines.push(format!("Authors: {authors}\n"));
    }
    if let Some(versions) = &data.versions_filter_str {
        lines.push(format!("Versions in scope: {versions}\n"));
    }
    if opts.toc {
        lines.push(PAGEBREAK.into());
        lines.push(ctx.header(hl + 1, "Table of contents", None, true));
        lines.push(format!("<div markdown=\"1\">\n\n{TOC_PLACEHOLDER}\n\n</div>"));
        lines.push(PAGEBREAK.into());
    }

    if numbering_was_enabled && is_root {
        ctx.enable_numbering();
    }

    if opts.summary {
        if opts.toc {
            hl = hl.saturating_sub(1);
        }
        lines.push(executive_summary(g, tm, ctx, hl));
        lines.push(PAGEBREAK.into());
        lines.push(threats_summary(g, tm, ctx, hl + 1));
    }

    lines.push(ctx.header(hl + 1, &format!("{model_title} - scope of analysis"), None, false));
    let scope = g.scope(tm);
    if let Some(scope) = scope {
        let description = &g.object(scope).description;
        if !description.is_empty() {
            lines.push(ctx.header(hl + 2, &format!("{model_title} Overview"), None, false));
            lines.push(description.clone());
        }
        if let Some(references) = g.scope_data(scope).and_then(|s| s.references.as_ref()) {
            lines.push(ctx.header(hl + 2, "References", None, false));
            lines.extend(references.iter().map(|r| format!("- {r}")));
        }
    }

    let objectives = g.security_objectives(tm);
    if !objectives.is_empty() {
        lines.push(ctx.header(hl + 2, &format!("{model_title} security objectives"), None, false));
        lines.push(security_objectives_tree(g, &objectives));
        if is_root {
            lines.push("**Diagram:**\n<img src=\"img/secObjectives.svg\"/>".into());
        }
        lines.push("**Details:**".into());
        let mut by_title = objectives.clone();
        by_title.sort_by_key(|&so| g.object(so).title());
        for so in by_title {
            lines.push(render_security_objective(g, so, ctx, hl));
        }
    }

    let parent_model = g.parent(tm).and_then(|p| g.model_of(p));
    if let Some(parent) = parent_model.filter(|_| opts.ancestor_data) {
        lines.push(ctx.header(
            hl + 2,
            "Security Objectives inherited from other threat models",
            None,
            false,
        ));
        let inherited = g.security_objectives(parent);
        if inherited.is_empty() {
            lines.push("No Security Objective inherited".into());
        } else {
            for so in inherited {
                lines.push(render_security_objective(g, so, ctx, hl));
            }
        }
    }

    let descendants = g.descendants_tm(tm);
    if !descendants.is_empty() {
        lines.push(ctx.header(hl + 2, "Linked threat Models", None, false));
        for linked in descendants {
            let l = g.object(linked);
            lines.push(format!("- **{}** (ID: {})", l.title(), l.hierarchical_id));
        }
    }

    if let Some(diagram) = scope
        .and_then(|s| g.scope_data(s))
        .and_then(|s| s.diagram.as_ref())
        .filter(|d| !d.is_empty())
    {
        lines.push(ctx.header(hl + 2, "Diagrams", None, false));
        lines.push(diagram.clone());
    }

    let attackers = g.attackers(tm);
    if !attackers.is_empty() {
        lines.push(PAGEBREAK.into());
        lines.push(ctx.header(hl + 2, &format!("{model_title} Threat Actors"), None, false));
        lines.push("> Actors, agents, users and attackers may be used as synonymous.\n".into());
        for attacker in attackers {
            lines.push(render_attacker(g, attacker, ctx, hl));
        }
    }
    if let Some(parent) = parent_model.filter(|_| opts.ancestor_data) {
        let inherited = g.all_attackers_up(parent);
        if !inherited.is_empty() {
            lines.push(ctx.header(hl + 2, "Actors inherited from other threat models", None, false));
            for attacker in inherited {
                lines.push(render_attacker(g, attacker, ctx, hl));
            }
        }
    }

    let assumptions = g.assumptions(tm);
    if !assumptions.is_empty() {
        lines.push(ctx.header(hl + 2, "Assumptions", None, false));
        for assumption in assumptions {
            let a = g.object(assumption);
            lines.push(format!(
                "<dl markdown=\"block\"><dt>{}</dt><dd>{} </dd></dl>",
                a.id, a.description
            ));
        }
    }

    let assets = g.assets(tm);
    if !assets.is_empty() {
        lines.push(ctx.header(hl + 2, "Assets", None, false));
        lines.push(ctx.header(hl + 3, "Summary Table", None, false));
        lines.push(render_asset_table(g, &assets));
        lines.push(ctx.header(hl + 3, "Details", None, false));
        for asset in assets {
            lines.push(render_asset(g, asset, ctx, hl));
        }
    }

    if data.analysis.trim().chars().count() > 5 {
        lines.push("<hr/>".into());
        lines.push(ctx.header(hl + 1, &format!("{model_title} Analysis"), None, false));
        lines.push(data.analysis.clone());
    }

    let threats = g.threats(tm);
    if !threats.is_empty() {
        lines.push("<hr/>".into());
        lines.push(ctx.header(hl + 1, &format!("{model_title} Attack tree"), None, false));
        lines.push(format!(
            "<object type=\"image/svg+xml\" style=\"width:100%; height:auto;\" data=\"img/{id}_ATTACKTREE.svg\">\n  <img src=\"img/{id}_ATTACKTREE.svg\" alt=\"{model_title} attack tree\" style=\"width:600; height:auto;\" />\n  </object>",
            id = obj.id
        ));
        lines.push("<img src=\"img/legend_AttackTree.svg\" width=\"600\"/>".into());
        lines.push(PAGEBREAK.into());
        lines.push("<hr/>".into());
        lines.push(ctx.header(hl + 1, &format!("{model_title} Threats"), None, false));
        lines.push(
            "\n> **Note** This section contains the threat and mitigations identified during the analysis phase."
                .into(),
        );
        let last = threats.len() - 1;
        for (i, threat) in threats.into_iter().enumerate() {
            // the first two threats are not separated by a rule
            if i > 1 {
                lines.push("<hr/>".into());
            }
            lines.push(render_threat(g, threat, ctx, hl));
            if i != last {
                lines.push(PAGEBREAK.into());
            }
        }
    }

    lines.push(PAGEBREAK.into());
    if let Some(history) = &data.history {
        lines.push("**Release history**".into());
        lines.push(history.clone());
    }
    lines.push("</div>".into());
    lines.join("\n")
}
