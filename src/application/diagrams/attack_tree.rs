//! Per-model and whole-hierarchy attack tree diagrams.

use generational_arena::Index;

use crate::application::diagrams::text::{wrap_text, wrap_text_at};
use crate::application::diagrams::{CUSTOM_RED, DIAGRAM_HEAD, DIAGRAM_TAIL, MODEL_FILL};
use crate::domain::{ThreatModelGraph, VULNERABLE_COLORS};

const TITLE_COLUMNS: usize = 27;

/// Threat node plus one node and edge per described countermeasure.
pub fn threat_cluster(g: &ThreatModelGraph, threat: Index) -> String {
    let Some(data) = g.threat(threat) else {
        return String::new();
    };
    let obj = g.object(threat);
    let root_id = &g.object(g.arena().root_of(threat)).id;
    let colors = g
        .threat_status(threat)
        .map(|s| s.colors())
        .unwrap_or(VULNERABLE_COLORS);

    let mut out = format!(
        "\"{id}\" [ fillcolor=\"{fill}\", style=filled, shape=polygon, color=\"{border}\", penwidth=2,\n    URL=\"../{root_id}.html#{id}\",  target=\"_top\", \n    label= \n    <<table border=\"0\" cellborder=\"0\" cellspacing=\"0\">\n     <tr><td align=\"left\"><b>{title}</b> \n     </td>  <td BGCOLOR=\"{score_color}\">{score}</td></tr>\n     <tr><td align=\"center\" COLSPAN=\"2\">{attack}</td></tr>   \n   </table>>\n];\n",
        id = obj.id,
        fill = colors.fill,
        border = colors.border,
        title = wrap_text(&obj.title()),
        score_color = data.cvss.smart_score_color(),
        score = data.cvss.smart_score_desc(),
        attack = wrap_text(&data.attack),
    );

    let countermeasures = g.resolve_all(&g.countermeasures(threat));
    for (i, cm) in countermeasures.into_iter().enumerate() {
        let Some(cm_data) = g.countermeasure(cm) else {
            continue;
        };
        let cm_obj = g.object(cm);
        if cm_obj.description.is_empty() {
            continue;
        }
        let colors = cm_data.status_colors();
        let (line_style, line_color, line_text) = if cm_data.in_place {
            ("solid", "green", "mitigates")
        } else {
            ("dashed", CUSTOM_RED, "")
        };
        out.push_str(&format!(
            "\n\n\"{id}_countermeasure{i}\" [\n    fillcolor=\"{fill}\", style=filled, shape=polygon, penwidth=2,\n    color=\"{border}\", \n    label=\n    <<table border=\"0\" cellborder=\"0\" cellspacing=\"0\">\n      <tr><td align=\"left\">\n        <b>{title}</b><br/><br/> \n        {description}\n      </td></tr>\n    </table>>\n]\n\n\"{id}_countermeasure{i}\" -> \"{id}\" [label = \" {line_text}\", style=\"{line_style}\", color=\"{line_color}\", penwidth=2]\n",
            id = obj.id,
            fill = colors.fill,
            border = colors.border,
            title = wrap_text(&cm_obj.title()),
            description = wrap_text(&cm_obj.description),
        ));
    }
    out
}

/// Threats of a single model pointing at the model node.
pub fn model_attack_tree(g: &ThreatModelGraph, tm: Index) -> String {
    let obj = g.object(tm);
    let mut out = String::from(DIAGRAM_HEAD);
    out.push_str(&format!(
        "\n\"{id}\" [fillcolor=\"{MODEL_FILL}\", style=filled, shape=ellipse, color=\"{CUSTOM_RED}\",\n label=\n <<table border=\"0\" cellborder=\"0\" cellspacing=\"0\">\n   <tr><td align=\"left\">\n     <b>{title}</b>\n   </td></tr>\n </table>>]\n",
        id = obj.id,
        title = wrap_text_at(&obj.title(), TITLE_COLUMNS),
    ));

    for threat in g.threats(tm) {
        let Some(data) = g.threat(threat) else {
            continue;
        };
        out.push_str(&threat_cluster(g, threat));
        let (line_style, line_color, line_text) = if data.fully_mitigated {
            ("dashed", "green", "")
        } else {
            ("solid", CUSTOM_RED, "impacts")
        };
        out.push_str(&format!(
            "\"{}\" -> \"{}\" [label=\"{line_text} \", color=\"{line_color}\", style=\"{line_style}\", penwidth=2]\n",
            g.object(threat).id,
            obj.id
        ));
    }
    out.push_str(DIAGRAM_TAIL);
    out
}

/// One diagram across the whole hierarchy below `tm`.
pub fn complete_attack_tree(g: &ThreatModelGraph, tm: Index) -> String {
    let mut out = String::from(DIAGRAM_HEAD);
    push_model_recursive(g, tm, &mut out);
    out.push_str(DIAGRAM_TAIL);
    out
}

fn push_model_recursive(g: &ThreatModelGraph, tm: Index, out: &mut String) {
    let obj = g.object(tm);
    out.push_str(&format!(
        "\n\"{id}\" [fillcolor=\"{MODEL_FILL}\", style=filled, shape=ellipse, color=\"{CUSTOM_RED}\",\n label=\n <<table border=\"0\" cellborder=\"0\" cellspacing=\"0\">\n   <tr><td align=\"center\">\n     <b>{id}</b><br/>{description}\n   </td></tr>\n </table>>]\n",
        id = obj.id,
        description = wrap_text(&obj.description),
    ));
    for threat in g.threats(tm) {
        out.push_str(&threat_cluster(g, threat));
        out.push_str(&format!(
            "\"{}\" -> \"{}\" [label=\" impacts\"]\n",
            g.object(threat).id,
            obj.id
        ));
    }
    for child in g.child_models(tm) {
        push_model_recursive(g, child, out);
        out.push_str(&format!(
            "\"{}\" -> \"{}\" [label=\" in scope for \"]\n",
            g.object(child).id,
            obj.id
        ));
    }
}
