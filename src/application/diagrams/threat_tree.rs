//! Per-threat attack chain: countermeasures mitigate the threat, the threat exploits objectives.

use generational_arena::Index;

use crate::application::diagrams::attack_tree::threat_cluster;
use crate::application::diagrams::text::wrap_text;
use crate::application::diagrams::{CUSTOM_RED, DIAGRAM_TAIL, OBJECTIVE_BORDER, MODEL_FILL};
use crate::domain::{ReferenceRole, ThreatModelGraph};

pub fn threat_tree(g: &ThreatModelGraph, threat: Index) -> String {
    let obj = g.object(threat);
    let mut out = format!(
        "@startuml\ndigraph G {{\nrankdir=\"BT\";\nnode [shape=plaintext, fontname=\"Arial\" fontsize=\"12\"];\nlabel=\"{} - {}\";\n",
        obj.id,
        wrap_text(&obj.title())
    );
    out.push_str(&threat_cluster(g, threat));

    for so in g.resolve_all(&g.references(threat, ReferenceRole::ImpactedSecObj)) {
        let so_obj = g.object(so);
        out.push_str(&format!(
            "\n\"{id}\" [fillcolor=\"{MODEL_FILL}\", style=filled, shape=ellipse, color=\"{OBJECTIVE_BORDER}\",\n label=<<b>{id}</b><br/>{title}>]\n\"{threat}\" -> \"{id}\" [label=\" exploits\", color=\"{CUSTOM_RED}\", penwidth=2]\n",
            id = so_obj.id,
            title = wrap_text(&so_obj.title()),
            threat = obj.id,
        ));
    }
    out.push_str(DIAGRAM_TAIL);
    out
}
