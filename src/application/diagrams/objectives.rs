//! Security objective diagrams: one impact tree per objective and a grouped overview.

use std::sync::LazyLock;

use generational_arena::Index;
use regex::Regex;

use crate::application::diagrams::attack_tree::threat_cluster;
use crate::application::diagrams::text::wrap_text;
use crate::application::diagrams::{DIAGRAM_HEAD, DIAGRAM_TAIL, MODEL_FILL, OBJECTIVE_BORDER};
use crate::domain::{ReferenceRole, ThreatModelGraph};

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));
static CLUSTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("Invalid regex"));

/// Threats of the whole hierarchy impacting `so`, each with its countermeasures.
pub fn objective_tree(g: &ThreatModelGraph, so: Index) -> String {
    let obj = g.object(so);
    let mut out = String::from(DIAGRAM_HEAD);
    out.push_str(&format!(
        "\n\"{id}\" [fillcolor=\"{MODEL_FILL}\", style=filled, shape=ellipse, color=\"{OBJECTIVE_BORDER}\", width=\"505\",\n label=\n <<table border=\"0\" cellborder=\"0\" cellspacing=\"0\">\n   <tr><td align=\"center\">\n     <b>{id}</b><br/>{title}\n   </td></tr>\n </table>>]\n",
        id = obj.id,
        title = wrap_text(&obj.title()),
    ));
    for threat in g.threats_impacting(so) {
        out.push_str(&threat_cluster(g, threat));
        out.push_str(&format!(
            "\"{}\" -> \"{}\" [label=\" impacts\"]\n",
            g.object(threat).id,
            obj.id
        ));
    }
    out.push_str(DIAGRAM_TAIL);
    out
}

fn cluster_id(group: &str) -> String {
    let raw = if group.is_empty() {
        "Ungrouped".to_string()
    } else {
        WHITESPACE_RE.replace_all(group, "_").into_owned()
    };
    CLUSTER_RE.replace_all(&raw, "_").into_owned()
}

/// Objectives of `tm` clustered by group, with their `contributesTo` edges.
pub fn objectives_overview(g: &ThreatModelGraph, tm: Index) -> String {
    let mut lines: Vec<String> = vec![
        "@startuml".into(),
        "digraph G {".into(),
        " rankdir=\"BT\";".into(),
        " ranksep=2;".into(),
        "  node [fontname=\"Arial\" fontsize=\"14\" color=LightGray style=filled shape=\"box\"];".into(),
        String::new(),
    ];

    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    let mut edges: Vec<(String, String)> = Vec::new();
    for so in g.security_objectives(tm) {
        let Some(data) = g.security_objective(so) else {
            continue;
        };
        let id = g.object(so).id.clone();
        match groups.iter_mut().find(|(name, _)| *name == data.group) {
            Some((_, members)) => members.push(id.clone()),
            None => groups.push((data.group.clone(), vec![id.clone()])),
        }
        for target in g.resolve_all(&g.references(so, ReferenceRole::ContributesTo)) {
            edges.push((id.clone(), g.object(target).id.clone()));
        }
    }

    for (group, members) in &groups {
        let nodes = members
            .iter()
            .map(|m| format!("\"{m}\";"))
            .collect::<Vec<_>>()
            .join(" ");
        lines.push(format!(
            "subgraph cluster_{} {{  label = \"{}\";  {nodes} }}",
            cluster_id(group),
            group.replace('"', "\\\"")
        ));
    }
    for (child, parent) in edges {
        lines.push(format!("\"{child}\" -> \"{parent}\" [label = \"contributes to\"]"));
    }

    lines.push(String::new());
    lines.push("## (threat -> secObj edges omitted)".into());
    lines.push(String::new());
    lines.push("}".into());
    lines.push("@enduml".into());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("General", "General")]
    #[case("Data protection", "Data_protection")]
    #[case("Keys & secrets", "Keys___secrets")]
    #[case("", "Ungrouped")]
    fn given_group_name_when_building_cluster_id_then_sanitized(#[case] group: &str, #[case] expected: &str) {
        assert_eq!(cluster_id(group), expected);
    }
}
