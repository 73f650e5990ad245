//! PlantUML/graphviz diagram sources derived from the model graph.

pub mod attack_tree;
pub mod objectives;
pub mod text;
pub mod threat_tree;

use std::path::PathBuf;

use tracing::debug;

use crate::domain::ThreatModelGraph;

pub const CUSTOM_RED: &str = "#B85450";
pub const MODEL_FILL: &str = "#bae9ff";
pub const OBJECTIVE_BORDER: &str = "#2bbcff";

pub const DIAGRAM_HEAD: &str = "@startuml\ndigraph G {\n  rankdir=\"RL\";\n  node [shape=plaintext, fontname=\"Arial\" fontsize=\"12\", align=\"left\"];\n";
pub const DIAGRAM_TAIL: &str = "\n}\n@enduml\n";

/// One diagram source, `path` relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramFile {
    pub path: PathBuf,
    pub source: String,
}

impl DiagramFile {
    fn new(path: impl Into<PathBuf>, source: String) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// All diagram sources for the hierarchy below the graph root.
pub fn generate_all(g: &ThreatModelGraph) -> Vec<DiagramFile> {
    let root = g.root();
    let img = PathBuf::from("img");
    let mut files = Vec::new();

    for tm in std::iter::once(root).chain(g.descendants_tm(root)) {
        let id = &g.object(tm).id;
        files.push(DiagramFile::new(
            img.join(format!("{id}_ATTACKTREE.puml")),
            attack_tree::model_attack_tree(g, tm),
        ));
        for threat in g.threats(tm) {
            files.push(DiagramFile::new(
                img.join("threatTree").join(format!("{}.puml", g.object(threat).id)),
                threat_tree::threat_tree(g, threat),
            ));
        }
        for so in g.security_objectives(tm) {
            files.push(DiagramFile::new(
                img.join("secObjectives").join(format!("{}.puml", g.object(so).id)),
                objectives::objective_tree(g, so),
            ));
        }
    }

    files.push(DiagramFile::new(
        img.join(format!("COMPLETE_{}_ATTACKTREE.puml", g.object(root).id)),
        attack_tree::complete_attack_tree(g, root),
    ));
    files.push(DiagramFile::new(
        img.join("secObjectives.puml"),
        objectives::objectives_overview(g, root),
    ));

    debug!("generate_all: {} diagram sources", files.len());
    files
}
