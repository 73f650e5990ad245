//! Typed model nodes stored in the arena.

use std::fmt;
use std::path::PathBuf;

use serde_json::Value;

use crate::domain::cvss::Cvss;
use crate::domain::object::{ModelObject, RawMap};

/// Sentinel operator for countermeasures nobody declared responsibility for.
pub const UNDEFINED_OPERATOR: &str = "UNDEFINED";

/// Fill/border pair used by diagram nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusColors {
    pub fill: &'static str,
    pub border: &'static str,
}

pub const MITIGATED_COLORS: StatusColors = StatusColors {
    fill: "#D5E8D4",
    border: "#82B366",
};
pub const INSECURE_BY_DEFAULT_COLORS: StatusColors = StatusColors {
    fill: "#FFF2CC",
    border: "#D6B656",
};
pub const VULNERABLE_COLORS: StatusColors = StatusColors {
    fill: "#F8CECC",
    border: "#B85450",
};

/// A payload in the model arena.
#[derive(Debug, Clone)]
pub struct ModelNode {
    pub object: ModelObject,
    pub kind: NodeKind,
}

impl ModelNode {
    pub fn id(&self) -> &str {
        &self.object.id
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, NodeKind::Reference(_))
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    ThreatModel(ThreatModelData),
    Threat(ThreatData),
    Countermeasure(CountermeasureData),
    SecurityObjective(SecurityObjectiveData),
    Asset(AssetData),
    Attacker(AttackerData),
    Assumption,
    Scope(ScopeData),
    Reference(ReferenceData),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::ThreatModel(_) => "ThreatModel",
            NodeKind::Threat(_) => "Threat",
            NodeKind::Countermeasure(_) => "Countermeasure",
            NodeKind::SecurityObjective(_) => "SecurityObjective",
            NodeKind::Asset(_) => "Asset",
            NodeKind::Attacker(_) => "Attacker",
            NodeKind::Assumption => "Assumption",
            NodeKind::Scope(_) => "Scope",
            NodeKind::Reference(_) => "Reference",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThreatModelData {
    /// Document the model was loaded from
    pub file: PathBuf,
    pub schema_version: u32,
    pub analysis: String,
    pub version: Option<String>,
    pub status: Option<String>,
    pub authors: Option<String>,
    pub history: Option<String>,
    /// `ISO27001Ref` controls declared on the model
    pub iso27001_ref: Vec<IsoControl>,
    /// Comma-joined version filter the model was built with, if any
    pub versions_filter_str: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoControl {
    pub id: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct ThreatData {
    pub attack: String,
    pub threat_type: String,
    pub impact_desc: Option<String>,
    pub fully_mitigated: bool,
    /// Always `None` for public builds
    pub ticket_link: Option<String>,
    pub cvss: Cvss,
    pub conditional: Option<String>,
    pub pentest_testable: bool,
    pub compliance: Option<Value>,
    pub applies_to_versions: Option<String>,
    pub attack_type: Option<String>,
}

impl ThreatData {
    /// Derived description; a raw `description` is rejected at construction.
    pub fn description(&self) -> String {
        format!(
            "**Attack:** {}<br/> **Impact:** {}",
            self.attack,
            self.impact_desc.as_deref().unwrap_or_default()
        )
    }
}

#[derive(Debug, Clone)]
pub struct CountermeasureData {
    pub in_place: bool,
    pub public: bool,
    pub operational: bool,
    pub operator: String,
    pub mitigation_type: Option<String>,
    pub applies_to_versions: Option<String>,
}

impl CountermeasureData {
    /// Only a non-empty value replaces the current operator.
    pub fn set_operator(&mut self, operator: &str) {
        if !operator.is_empty() {
            self.operator = operator.to_string();
        }
    }

    pub fn status_colors(&self) -> StatusColors {
        if self.in_place {
            MITIGATED_COLORS
        } else {
            INSECURE_BY_DEFAULT_COLORS
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecurityObjectiveData {
    pub group: String,
    pub priority: String,
    pub in_scope: bool,
    pub icon: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AssetData {
    pub asset_type: Option<String>,
    pub in_scope: bool,
    pub properties: Option<RawMap>,
    pub applies_to_versions: Option<String>,
    pub authentication: Option<String>,
    pub specifies: Option<String>,
    pub icon: Option<String>,
}

impl AssetData {
    /// `<ul>` listing of the asset's properties, empty when none are declared.
    pub fn properties_html(&self) -> String {
        let Some(properties) = &self.properties else {
            return String::new();
        };
        let items: String = properties
            .iter()
            .map(|(key, value)| {
                let shown = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                format!("<li style='margin: 0px 0;'><b>{key}:</b> &nbsp;{shown}</li>")
            })
            .collect();
        format!("<ul>{items}</ul>")
    }
}

#[derive(Debug, Clone)]
pub struct AttackerData {
    pub in_scope: bool,
    pub reference: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ScopeData {
    pub references: Option<Vec<String>>,
    pub diagram: Option<String>,
}

/// What a reference stands for in its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceRole {
    Countermeasure,
    ImpactedSecObj,
    Attacker,
    Asset,
    ContributesTo,
}

#[derive(Debug, Clone)]
pub struct ReferenceData {
    /// Value of `REFID`
    pub target: String,
    pub role: ReferenceRole,
}

/// Mitigation state of a threat as shown in diagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreatStatus {
    Mitigated,
    NotSecureByDefault,
    Vulnerable,
}

impl ThreatStatus {
    pub fn from_flags(fully_mitigated: bool, operational: bool) -> Self {
        match (fully_mitigated, operational) {
            (true, false) => ThreatStatus::Mitigated,
            (true, true) => ThreatStatus::NotSecureByDefault,
            (false, _) => ThreatStatus::Vulnerable,
        }
    }

    pub fn colors(&self) -> StatusColors {
        match self {
            ThreatStatus::Mitigated => MITIGATED_COLORS,
            ThreatStatus::NotSecureByDefault => INSECURE_BY_DEFAULT_COLORS,
            ThreatStatus::Vulnerable => VULNERABLE_COLORS,
        }
    }
}

impl fmt::Display for ThreatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreatStatus::Mitigated => f.write_str("Mitigated"),
            ThreatStatus::NotSecureByDefault => f.write_str("Not Secure by Default"),
            ThreatStatus::Vulnerable => f.write_str("Vulnerable"),
        }
    }
}
