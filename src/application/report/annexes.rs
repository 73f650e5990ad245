//! Annex sections appended after the model sections.

use generational_arena::Index;
use serde_json::Value;

use crate::application::report::context::RenderContext;
use crate::application::report::markdown::{escape, PRINT_TABLE};
use crate::domain::{ThreatModelGraph, UNDEFINED_OPERATOR};

/// Operational countermeasures of the subtree, one numbered row each, ordered by id.
pub fn operational_hardening(
    g: &ThreatModelGraph,
    tm: Index,
    ctx: &mut RenderContext,
    hl: usize,
) -> String {
    let mut countermeasures: Vec<Index> = g.operational_guide(tm).into_values().flatten().collect();
    countermeasures.sort_by(|a, b| g.object(*a).id.cmp(&g.object(*b).id));

    let mut lines = vec![ctx.header(hl, "Operational Security Hardening Guide", None, false)];
    lines.push(format!(
        "{PRINT_TABLE}\n  <thead><tr><th>Seq</th><th>Countermeasure Details</th></tr></thead>\n  <tbody markdown=\"block\">"
    ));
    for (i, cm) in countermeasures.into_iter().enumerate() {
        let Some(data) = g.countermeasure(cm) else {
            continue;
        };
        let obj = g.object(cm);
        let threat = g.parent(cm);
        let (anchor, title, id) = threat
            .map(|t| {
                let o = g.object(t);
                (o.anchor().to_string(), o.title(), o.id.clone())
            })
            .unwrap_or_default();
        let condition = threat
            .and_then(|t| g.threat(t))
            .and_then(|t| t.conditional.as_deref())
            .map(|c| format!("**Valid when:** {c}<br/>"))
            .unwrap_or_default();
        let operator = if data.operator.is_empty() || data.operator == UNDEFINED_OPERATOR {
            String::new()
        } else {
            format!("**Operated by:** {}<br/>", data.operator)
        };
        lines.push(format!(
            "<tr markdown=\"block\"><td>{}</td><td markdown=\"block\">**Title (ID):** {} (`{}`)<br/>\n**Mitigates:** <a href=\"#{anchor}\">{title}</a> (`{id}`)<br/><br/>\n**Description:**\n{condition}{}\n<br/>{operator}</td></tr>",
            i + 1,
            obj.title(),
            obj.id,
            obj.description
        ));
    }
    lines.push("</tbody></table>".into());
    lines.join("\n")
}

fn key_table(g: &ThreatModelGraph, assets: &[Index]) -> String {
    let mut lines = vec![
        PRINT_TABLE.to_string(),
        "  <tr><th>Title (ID)</th><th>Description</th><th>Properties</th></tr>".to_string(),
    ];
    for &asset in assets {
        let Some(data) = g.asset(asset) else {
            continue;
        };
        let obj = g.object(asset);
        let kind = data
            .properties
            .as_ref()
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| data.asset_type.clone())
            .unwrap_or_default();
        lines.push(format!(
            "  <tr><td><strong><a href=\"#{}\">{}</a></strong></td><td><b>{kind}</b><br/>{}</td><td>{}</td></tr>",
            obj.hierarchical_id,
            obj.title(),
            obj.description,
            data.properties_html()
        ));
    }
    lines.push("</table>".into());
    lines.join("\n")
}

/// Keys, certificates and credentials of the subtree.
pub fn keys_summary(
    g: &ThreatModelGraph,
    tm: Index,
    ctx: &mut RenderContext,
    hl: usize,
) -> String {
    let mut lines = vec![ctx.header(hl, "Keys classification ", None, false)];

    let key = Value::String("key".into());
    let app_keys = g.assets_by_props(
        tm,
        &[("applicationRelated", Value::Bool(true)), ("type", key.clone())],
    );
    if !app_keys.is_empty() {
        lines.push(ctx.header(hl + 1, "Application-specific keys", None, false));
        lines.push(
            "Keys issued to processes to communicate in a secure manner, not linked to a specific business logic"
                .into(),
        );
        lines.push(key_table(g, &app_keys));
    }

    let infra_keys = g.assets_by_props(tm, &[("infrastructureRelated", Value::Bool(true)), ("type", key)]);
    let certificates = g.assets_by_props(tm, &[("type", Value::String("certificate".into()))]);
    if !infra_keys.is_empty() || !certificates.is_empty() {
        lines.push(ctx.header(hl + 1, "Infrastructure Keys and PKI assets", None, false));
        lines.push(key_table(g, &infra_keys));
        lines.push(key_table(g, &certificates));
    }

    let credentials: Vec<Index> = ["credential", "credentials", "secret"]
        .iter()
        .flat_map(|kind| g.assets_by_props(tm, &[("type", Value::String((*kind).into()))]))
        .collect();
    if !credentials.is_empty() {
        lines.push(ctx.header(hl + 1, "Credentials", None, false));
        lines.push(key_table(g, &credentials));
    }
    lines.join("\n")
}

/// Threats flagged `pentestTestable`, with an empty verdict column.
pub fn testing_guide(
    g: &ThreatModelGraph,
    tm: Index,
    ctx: &mut RenderContext,
    hl: usize,
) -> String {
    let mut lines = vec![ctx.header(hl, "Testing guide", None, false)];
    lines.push("\nThis guide lists all testable attacks described in the threat model\n".into());
    lines.push(PRINT_TABLE.into());
    lines.push("<tr><th>Seq</th><th>Attack to test</th><th>Pass/Fail/NA</th></tr>".into());
    for (i, threat) in g.testable_threats(tm).into_iter().enumerate() {
        let Some(data) = g.threat(threat) else {
            continue;
        };
        let obj = g.object(threat);
        let condition = data
            .conditional
            .as_deref()
            .map(|c| format!("<br/>**Valid when:** {c}"))
            .unwrap_or_default();
        lines.push(format!(
            "<tr markdown=\"block\"><td>{}</td><td markdown=\"block\"><a href=\"#{}\">{}</a><br/>**Attack description:** {}{condition}</td><td></td></tr>",
            i + 1,
            obj.anchor(),
            obj.title(),
            data.attack
        ));
    }
    lines.push("</table>".into());
    lines.join("\n")
}

/// Control id a compliance reference points at: its first whitespace-separated token.
fn control_id(reference: &str) -> &str {
    reference.split(' ').next().unwrap_or_default()
}

/// Threats of the subtree per referenced ISO27001 control, without duplicates.
fn threats_for_control(g: &ThreatModelGraph, tm: Index, control: &str) -> Vec<Index> {
    g.all_threats(tm)
        .into_iter()
        .filter(|&t| {
            let Some(Value::Array(items)) = g.threat(t).and_then(|d| d.compliance.as_ref()) else {
                return false;
            };
            items
                .iter()
                .filter_map(|item| item.get("ISO27001").and_then(Value::as_array))
                .flatten()
                .filter_map(|r| r.get("ref").and_then(Value::as_str))
                .any(|r| control_id(r) == control)
        })
        .collect()
}

/// One row per `ISO27001Ref` control of `tm`, sorted by control id.
pub fn iso27001_summary(g: &ThreatModelGraph, tm: Index, ctx: &mut RenderContext, hl: usize) -> String {
    let mut out = ctx.header(hl, "ISO27001 Summary", None, false);
    out.push_str("\n\n");
    out.push_str(
        "<table>\n  <thead>\n    <tr>\n      <th>Control ID</th>\n      <th>Description</th>\n      <th>Threats</th>\n    </tr>\n  </thead>\n  <tbody>\n",
    );

    let mut controls = g
        .threat_model(tm)
        .map(|d| d.iso27001_ref.clone())
        .unwrap_or_default();
    controls.sort_by(|a, b| a.id.cmp(&b.id));
    controls.dedup_by(|a, b| a.id == b.id);

    for control in controls {
        let threats = threats_for_control(g, tm, &control.id);
        let cell = if threats.is_empty() {
            "None".to_string()
        } else {
            let rows: String = threats
                .into_iter()
                .filter_map(|t| g.threat(t).map(|d| (g.object(t), d)))
                .map(|(obj, d)| {
                    let status = if d.fully_mitigated {
                        "<span style=\"color:green;\">Mitigated</span>"
                    } else {
                        "<span style=\"color:red;\">Not fully mitigated</span>"
                    };
                    let score = format!(
                        "<span style=\"color:{};\">{}</span>",
                        d.cvss.smart_score_color(),
                        d.cvss.smart_score_desc()
                    );
                    format!(
                        "<tr><td><a href=\"#{id}\"><code>{id}</code></a></td><td>{status}</td><td>{score}</td></tr>",
                        id = obj.id
                    )
                })
                .collect();
            format!("<table><tbody>{rows}</tbody></table>")
        };
        out.push_str("    <tr>\n");
        out.push_str(&format!("      <td>{}</td>\n", control.id));
        out.push_str(&format!("      <td>{}</td>\n", escape(&control.description)));
        out.push_str(&format!("      <td>{cell}</td>\n"));
        out.push_str("    </tr>\n");
    }
    out.push_str("  </tbody>\n</table>\n\n");
    out
}
