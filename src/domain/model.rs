//! The built model graph and the queries renderers and diagram generators run against it.

use std::collections::BTreeMap;
use std::ops;

use generational_arena::Index;
use serde_json::Value;
use tracing::instrument;

use crate::domain::arena::TreeArena;
use crate::domain::entities::{
    AssetData, AttackerData, CountermeasureData, ModelNode, NodeKind, ReferenceData, ReferenceRole,
    ScopeData, SecurityObjectiveData, ThreatData, ThreatModelData, ThreatStatus,
};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::filter::Visibility;
use crate::domain::object::ModelObject;

/// Fully linked and filtered model hierarchy.
///
/// Nodes are immutable once construction finishes; all derived facts
/// (operational state, resolved references, status) are computed on demand.
#[derive(Debug)]
pub struct ThreatModelGraph {
    arena: TreeArena<ModelNode>,
    root: Index,
    visibility: Visibility,
}

impl ops::Index<Index> for ThreatModelGraph {
    type Output = ModelNode;

    fn index(&self, idx: Index) -> &Self::Output {
        &self.arena[idx].data
    }
}

impl ThreatModelGraph {
    pub(crate) fn new(arena: TreeArena<ModelNode>, root: Index, visibility: Visibility) -> Self {
        Self {
            arena,
            root,
            visibility,
        }
    }

    pub fn root(&self) -> Index {
        self.root
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn arena(&self) -> &TreeArena<ModelNode> {
        &self.arena
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn object(&self, idx: Index) -> &ModelObject {
        &self[idx].object
    }

    pub fn parent(&self, idx: Index) -> Option<Index> {
        self.arena.parent(idx)
    }

    pub fn is_root(&self, idx: Index) -> bool {
        self.arena.parent(idx).is_none()
    }

    // ------------------------------------------------------------------
    // typed views
    // ------------------------------------------------------------------

    pub fn threat_model(&self, idx: Index) -> Option<&ThreatModelData> {
        match &self[idx].kind {
            NodeKind::ThreatModel(d) => Some(d),
            _ => None,
        }
    }

    pub fn threat(&self, idx: Index) -> Option<&ThreatData> {
        match &self[idx].kind {
            NodeKind::Threat(d) => Some(d),
            _ => None,
        }
    }

    pub fn countermeasure(&self, idx: Index) -> Option<&CountermeasureData> {
        match &self[idx].kind {
            NodeKind::Countermeasure(d) => Some(d),
            _ => None,
        }
    }

    pub fn security_objective(&self, idx: Index) -> Option<&SecurityObjectiveData> {
        match &self[idx].kind {
            NodeKind::SecurityObjective(d) => Some(d),
            _ => None,
        }
    }

    pub fn asset(&self, idx: Index) -> Option<&AssetData> {
        match &self[idx].kind {
            NodeKind::Asset(d) => Some(d),
            _ => None,
        }
    }

    pub fn attacker(&self, idx: Index) -> Option<&AttackerData> {
        match &self[idx].kind {
            NodeKind::Attacker(d) => Some(d),
            _ => None,
        }
    }

    pub fn scope_data(&self, idx: Index) -> Option<&ScopeData> {
        match &self[idx].kind {
            NodeKind::Scope(d) => Some(d),
            _ => None,
        }
    }

    pub fn reference(&self, idx: Index) -> Option<&ReferenceData> {
        match &self[idx].kind {
            NodeKind::Reference(d) => Some(d),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // structure
    // ------------------------------------------------------------------

    fn children_where<P>(&self, idx: Index, pred: P) -> Vec<Index>
    where
        P: Fn(&NodeKind) -> bool,
    {
        self.arena
            .children(idx)
            .iter()
            .copied()
            .filter(|&c| pred(&self[c].kind))
            .collect()
    }

    pub fn scope(&self, tm: Index) -> Option<Index> {
        self.children_where(tm, |k| matches!(k, NodeKind::Scope(_)))
            .first()
            .copied()
    }

    pub fn threats(&self, tm: Index) -> Vec<Index> {
        self.children_where(tm, |k| matches!(k, NodeKind::Threat(_)))
    }

    pub fn security_objectives(&self, tm: Index) -> Vec<Index> {
        self.children_where(tm, |k| matches!(k, NodeKind::SecurityObjective(_)))
    }

    pub fn assets(&self, tm: Index) -> Vec<Index> {
        self.children_where(tm, |k| matches!(k, NodeKind::Asset(_)))
    }

    pub fn attackers(&self, tm: Index) -> Vec<Index> {
        self.children_where(tm, |k| matches!(k, NodeKind::Attacker(_)))
    }

    pub fn assumptions(&self, tm: Index) -> Vec<Index> {
        self.children_where(tm, |k| matches!(k, NodeKind::Assumption))
    }

    pub fn child_models(&self, tm: Index) -> Vec<Index> {
        self.children_where(tm, |k| matches!(k, NodeKind::ThreatModel(_)))
    }

    /// Every nested model below `tm`, depth first in document order.
    pub fn descendants_tm(&self, tm: Index) -> Vec<Index> {
        self.arena
            .collect_down(tm, |n| matches!(n.kind, NodeKind::ThreatModel(_)))
    }

    /// The model with `id`, searched from the root down.
    pub fn model_by_id(&self, id: &str) -> DomainResult<Index> {
        let root = self.root();
        std::iter::once(root)
            .chain(self.descendants_tm(root))
            .find(|&tm| self.object(tm).id == id)
            .ok_or_else(|| DomainError::UnknownId(id.to_string()))
    }

    /// Nearest enclosing threat model (the node itself if it is one).
    pub fn model_of(&self, idx: Index) -> Option<Index> {
        if self.threat_model(idx).is_some() {
            return Some(idx);
        }
        self.arena
            .ancestors(idx)
            .find(|(_, n)| matches!(n.data.kind, NodeKind::ThreatModel(_)))
            .map(|(i, _)| i)
    }

    /// Owned countermeasures and countermeasure references of a threat, in document order.
    pub fn countermeasures(&self, threat: Index) -> Vec<Index> {
        self.children_where(threat, |k| match k {
            NodeKind::Countermeasure(_) => true,
            NodeKind::Reference(r) => r.role == ReferenceRole::Countermeasure,
            _ => false,
        })
    }

    pub fn references(&self, owner: Index, role: ReferenceRole) -> Vec<Index> {
        self.children_where(owner, |k| matches!(k, NodeKind::Reference(r) if r.role == role))
    }

    // ------------------------------------------------------------------
    // resolution
    // ------------------------------------------------------------------

    /// Looks `id` up below the global root of the whole hierarchy.
    #[instrument(level = "trace", skip(self))]
    pub fn resolve_id(&self, from: Index, id: &str) -> Option<Index> {
        if id.is_empty() {
            return None;
        }
        let root = self.arena.root_of(from);
        if self.object(root).id == id {
            return Some(root);
        }
        self.arena
            .find_descendant(root, &|n: &ModelNode| !n.is_reference() && n.object.id == id)
    }

    /// Target of a reference node; `None` for unresolvable targets or non-reference nodes.
    pub fn resolve(&self, reference: Index) -> Option<Index> {
        let target = &self.reference(reference)?.target;
        self.resolve_id(reference, target)
    }

    /// Reference targets, silently skipping unresolved ones; other nodes map to themselves.
    pub fn resolve_all(&self, items: &[Index]) -> Vec<Index> {
        items
            .iter()
            .filter_map(|&i| {
                if self[i].is_reference() {
                    self.resolve(i)
                } else {
                    Some(i)
                }
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // derived threat facts
    // ------------------------------------------------------------------

    /// Operational countermeasures of a threat, references resolved.
    pub fn operational_countermeasures(&self, threat: Index) -> Vec<Index> {
        self.resolve_all(&self.countermeasures(threat))
            .into_iter()
            .filter(|&cm| self.countermeasure(cm).is_some_and(|c| c.operational))
            .collect()
    }

    pub fn threat_operational(&self, threat: Index) -> bool {
        !self.operational_countermeasures(threat).is_empty()
    }

    pub fn threat_status(&self, threat: Index) -> Option<ThreatStatus> {
        let data = self.threat(threat)?;
        Some(ThreatStatus::from_flags(
            data.fully_mitigated,
            self.threat_operational(threat),
        ))
    }

    /// `impactDesc` followed by one linked line per resolvable impacted objective.
    pub fn impact_desc(&self, threat: Index) -> String {
        let mut out = String::new();
        if let Some(desc) = self.threat(threat).and_then(|t| t.impact_desc.as_deref()) {
            out.push_str(desc);
            out.push_str("<br/> ");
        }
        for so in self.resolve_all(&self.references(threat, ReferenceRole::ImpactedSecObj)) {
            out.push_str(&self.linked_impact_md_text(so));
            out.push_str("<br/> ");
        }
        out
    }

    pub fn linked_impact_md_text(&self, so: Index) -> String {
        let obj = self.object(so);
        format!(
            "Compromised <code><a href=\"#{}\">{}</a></code>: {}",
            obj.anchor(),
            obj.id,
            obj.title()
        )
    }

    pub fn contributed_to_md_text(&self, so: Index) -> String {
        let obj = self.object(so);
        format!(
            "Contributes to <code><a href=\"#{}\">{}</a></code> *({})*",
            obj.anchor(),
            obj.id,
            obj.title()
        )
    }

    /// Threats of `tm` and of every nested model.
    pub fn all_threats(&self, tm: Index) -> Vec<Index> {
        let mut threats = self.threats(tm);
        for child in self.descendants_tm(tm) {
            threats.extend(self.threats(child));
        }
        threats
    }

    /// Subtree threats with the given mitigation flag, highest smart score first.
    pub fn threats_by_mitigation(&self, tm: Index, fully_mitigated: bool) -> Vec<Index> {
        let threats = self
            .all_threats(tm)
            .into_iter()
            .filter(|&t| self.threat(t).is_some_and(|d| d.fully_mitigated == fully_mitigated))
            .collect();
        self.sorted_by_score(threats)
    }

    pub fn threats_by_mitigation_and_operational(
        &self,
        tm: Index,
        fully_mitigated: bool,
        operational: bool,
    ) -> Vec<Index> {
        let threats = self
            .threats_by_mitigation(tm, fully_mitigated)
            .into_iter()
            .filter(|&t| self.threat_operational(t) == operational)
            .collect();
        self.sorted_by_score(threats)
    }

    fn sorted_by_score(&self, mut threats: Vec<Index>) -> Vec<Index> {
        let score = |t: Index| {
            self.threat(t)
                .map(|d| d.cvss.smart_score_val())
                .unwrap_or(0.0)
        };
        // stable: equal scores keep document order
        threats.sort_by(|a, b| score(*b).total_cmp(&score(*a)));
        threats
    }

    /// True when any threat anywhere in the hierarchy lists `so` as impacted.
    pub fn sec_obj_tree_image(&self, so: Index) -> bool {
        let root = self.arena.root_of(so);
        self.all_threats(root).into_iter().any(|t| {
            self.references(t, ReferenceRole::ImpactedSecObj)
                .into_iter()
                .any(|r| self.resolve(r) == Some(so))
        })
    }

    /// Threats in the hierarchy impacting `so`.
    pub fn threats_impacting(&self, so: Index) -> Vec<Index> {
        let root = self.arena.root_of(so);
        self.all_threats(root)
            .into_iter()
            .filter(|&t| {
                self.references(t, ReferenceRole::ImpactedSecObj)
                    .into_iter()
                    .any(|r| self.resolve(r) == Some(so))
            })
            .collect()
    }

    /// Attackers of `tm` and all its ancestors, outermost first.
    pub fn all_attackers_up(&self, tm: Index) -> Vec<Index> {
        let mut chain: Vec<Index> = self
            .arena
            .ancestors(tm)
            .filter(|(_, n)| matches!(n.data.kind, NodeKind::ThreatModel(_)))
            .map(|(i, _)| i)
            .collect();
        chain.reverse();
        chain.push(tm);
        chain.into_iter().flat_map(|m| self.attackers(m)).collect()
    }

    // ------------------------------------------------------------------
    // annex queries
    // ------------------------------------------------------------------

    /// Attribute lookup used by property-based asset selection.
    pub fn asset_property(&self, asset: Index, key: &str) -> Option<Value> {
        let data = self.asset(asset)?;
        match key {
            "type" => data.asset_type.clone().map(Value::String),
            "inScope" => Some(Value::Bool(data.in_scope)),
            "ID" => Some(Value::String(self.object(asset).id.clone())),
            other => self.object(asset).extra(other).cloned(),
        }
    }

    /// Assets in the subtree whose attributes equal every given pair.
    pub fn assets_by_props(&self, tm: Index, props: &[(&str, Value)]) -> Vec<Index> {
        self.arena
            .collect_down(tm, |n| matches!(n.kind, NodeKind::Asset(_)))
            .into_iter()
            .filter(|&a| {
                props
                    .iter()
                    .all(|(k, v)| self.asset_property(a, k).as_ref() == Some(v))
            })
            .collect()
    }

    /// Operational, owned countermeasures of the subtree grouped by operator.
    pub fn operational_guide(&self, tm: Index) -> BTreeMap<String, Vec<Index>> {
        let mut guide: BTreeMap<String, Vec<Index>> = BTreeMap::new();
        for threat in self.all_threats(tm) {
            if !self.threat_operational(threat) {
                continue;
            }
            for cm in self.countermeasures(threat) {
                if let Some(data) = self.countermeasure(cm).filter(|c| c.operational) {
                    guide.entry(data.operator.clone()).or_default().push(cm);
                }
            }
        }
        guide
    }

    /// Threats of the subtree flagged `pentestTestable`.
    pub fn testable_threats(&self, tm: Index) -> Vec<Index> {
        self.all_threats(tm)
            .into_iter()
            .filter(|&t| self.threat(t).is_some_and(|d| d.pentest_testable))
            .collect()
    }

    /// Soft consistency findings over the subtree's threats; never fatal.
    pub fn consistency_warnings(&self, tm: Index) -> Vec<String> {
        let mut warnings = Vec::new();
        for threat in self.all_threats(tm) {
            let Some(data) = self.threat(threat) else {
                continue;
            };
            let id = &self.object(threat).id;
            let cms: Vec<&CountermeasureData> = self
                .resolve_all(&self.countermeasures(threat))
                .into_iter()
                .filter_map(|cm| self.countermeasure(cm))
                .collect();
            let has_in_place = cms.iter().any(|c| c.in_place);
            let public = matches!(self.object(threat).extra("public"), Some(Value::Bool(true)));

            if data.fully_mitigated && !has_in_place {
                warnings.push(format!(
                    "Threat '{id}' is fully mitigated but has no 'inPlace' countermeasures."
                ));
            }
            if !data.fully_mitigated && has_in_place {
                warnings.push(format!(
                    "Threat '{id}' is not fully mitigated but has 'inPlace' countermeasures."
                ));
            }
            if public && !data.fully_mitigated {
                warnings.push(format!("Threat '{id}' is public but not fully mitigated."));
            }
            if public && data.fully_mitigated && !cms.iter().any(|c| c.in_place && c.public) {
                warnings.push(format!(
                    "Threat '{id}' is fully mitigated and public but has no 'inPlace' and public countermeasures."
                ));
            }
        }
        warnings
    }
}
