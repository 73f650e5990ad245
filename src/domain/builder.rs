//! Builds a filtered, linked `ThreatModelGraph` from parsed model documents.

use std::path::{Path, PathBuf};

use generational_arena::Index;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::arena::TreeArena;
use crate::domain::cvss::Cvss;
use crate::domain::entities::{
    AssetData, AttackerData, CountermeasureData, IsoControl, ModelNode, NodeKind, ReferenceData,
    ReferenceRole, ScopeData, SecurityObjectiveData, ThreatData, ThreatModelData,
    UNDEFINED_OPERATOR,
};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::filter::{should_exclude, Visibility};
use crate::domain::model::ThreatModelGraph;
use crate::domain::object::{scalar_to_string, string_list, ModelObject, RawMap};

/// Source of nested model documents.
pub trait DocumentProvider {
    /// Locates and parses child model `child_id` declared in `parent_file`.
    /// `Ok(None)` means no candidate document exists.
    fn load_child(&self, parent_file: &Path, child_id: &str)
        -> DomainResult<Option<(PathBuf, Value)>>;
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub visibility: Visibility,
    /// Version filter inherited by the root model
    pub versions_filter: Option<Vec<String>>,
}

const MODEL_KEYS: &[&str] = &[
    "scope",
    "threats",
    "children",
    "schemaVersion",
    "analysis",
    "version",
    "status",
    "authors",
    "history",
    "ISO27001Ref",
];
const SCOPE_KEYS: &[&str] = &[
    "securityObjectives",
    "assets",
    "attackers",
    "assumptions",
    "references",
    "diagram",
];
const SEC_OBJ_KEYS: &[&str] = &["group", "priority", "inScope", "icon", "contributesTo"];
const ASSET_KEYS: &[&str] = &[
    "type",
    "inScope",
    "properties",
    "appliesToVersions",
    "authentication",
    "specifies",
    "icon",
];
const ATTACKER_KEYS: &[&str] = &["inScope", "reference", "icon"];
const THREAT_KEYS: &[&str] = &[
    "attack",
    "threatType",
    "impactDesc",
    "impactedSecObj",
    "impacts",
    "attackers",
    "assets",
    "CVSS",
    "cvss",
    "fullyMitigated",
    "ticketLink",
    "countermeasures",
    "conditional",
    "pentestTestable",
    "compliance",
    "appliesToVersions",
    "attackType",
];
const COUNTERMEASURE_KEYS: &[&str] = &[
    "inPlace",
    "public",
    "operational",
    "operator",
    "mitigationType",
    "appliesToVersions",
];

/// Parent-before-child construction of the whole model hierarchy.
pub struct ModelBuilder<'a> {
    provider: &'a dyn DocumentProvider,
    options: BuildOptions,
    arena: TreeArena<ModelNode>,
    /// Documents currently being built, outermost first
    loading: Vec<PathBuf>,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(provider: &'a dyn DocumentProvider, options: BuildOptions) -> Self {
        Self {
            provider,
            options,
            arena: TreeArena::new(),
            loading: Vec::new(),
        }
    }

    pub fn build(mut self, file: &Path, doc: &Value) -> DomainResult<ThreatModelGraph> {
        debug!("build: root={}", file.display());
        self.loading.push(file.to_path_buf());
        let root = self.build_model(file, doc, None)?;
        self.loading.pop();
        debug!("build: {} nodes", self.arena.len());
        Ok(ThreatModelGraph::new(
            self.arena,
            root,
            self.options.visibility,
        ))
    }

    fn object_for(&self, raw: &RawMap, parent: Option<Index>, known: &[&str]) -> ModelObject {
        match parent {
            Some(p) => {
                let parent_obj = &self.arena[p].data.object;
                ModelObject::from_raw(raw, Some(parent_obj), parent_obj.versions_filter.clone(), known)
            }
            None => ModelObject::from_raw(raw, None, self.options.versions_filter.clone(), known),
        }
    }

    fn insert(&mut self, object: ModelObject, kind: NodeKind, parent: Index) -> Index {
        self.arena.insert_node(ModelNode { object, kind }, Some(parent))
    }

    fn build_model(&mut self, file: &Path, doc: &Value, parent: Option<Index>) -> DomainResult<Index> {
        let raw = doc.as_object().ok_or_else(|| DomainError::DocumentLoad {
            path: file.to_path_buf(),
            message: "top level must be a mapping".to_string(),
        })?;

        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let id = raw
            .get("ID")
            .filter(|v| !v.is_null())
            .map(scalar_to_string)
            .ok_or_else(|| DomainError::MissingField {
                field: "ID".to_string(),
                id: stem.clone(),
                file: file.to_path_buf(),
            })?;
        if id != stem {
            warn!("ID '{}' does not match file name {}", id, file.display());
        }

        let scope = match raw.get("scope") {
            Some(Value::Object(scope)) => scope,
            _ => {
                return Err(DomainError::MissingScope {
                    id,
                    file: file.to_path_buf(),
                })
            }
        };

        let mut object = self.object_for(raw, parent, MODEL_KEYS);
        if object.title.is_none() {
            object.title = Some(id.replace('_', " "));
        }
        let data = ThreatModelData {
            file: file.to_path_buf(),
            schema_version: raw
                .get("schemaVersion")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(1),
            analysis: opt_string(raw, "analysis").unwrap_or_default(),
            version: opt_string(raw, "version"),
            status: opt_string(raw, "status"),
            authors: opt_string(raw, "authors"),
            history: opt_string(raw, "history"),
            iso27001_ref: list(raw, "ISO27001Ref")
                .iter()
                .filter_map(Value::as_object)
                .map(|c| IsoControl {
                    id: opt_string(c, "ID").unwrap_or_default(),
                    description: opt_string(c, "description").unwrap_or_default(),
                })
                .collect(),
            versions_filter_str: self.options.versions_filter.as_ref().map(|v| v.join(",")),
        };
        debug!("build_model: id={} file={}", id, file.display());
        let tm = self.arena.insert_node(
            ModelNode {
                object,
                kind: NodeKind::ThreatModel(data),
            },
            parent,
        );

        self.build_scope(tm, scope, file)?;

        let tm_filter = self.arena[tm].data.object.versions_filter.clone();
        for threat in list(raw, "threats") {
            let Some(threat_raw) = threat.as_object() else {
                return Err(DomainError::InvalidField {
                    field: "threats".to_string(),
                    id: id.clone(),
                    message: "entries must be mappings".to_string(),
                });
            };
            if should_exclude(threat_raw, self.options.visibility, tm_filter.as_deref()) {
                debug!("build_model: excluded threat {:?}", threat_raw.get("ID"));
                continue;
            }
            self.build_threat(tm, threat_raw, file)?;
        }

        for child in list(raw, "children") {
            let child_id = child
                .as_object()
                .and_then(|c| c.get("REFID").or_else(|| c.get("ID")))
                .map(scalar_to_string)
                .filter(|c| !c.is_empty())
                .ok_or_else(|| DomainError::MalformedReference {
                    owner: id.clone(),
                    file: file.to_path_buf(),
                })?;
            self.build_child(tm, file, &child_id)?;
        }

        Ok(tm)
    }

    fn build_child(&mut self, tm: Index, file: &Path, child_id: &str) -> DomainResult<()> {
        let Some((child_file, child_doc)) = self.provider.load_child(file, child_id)? else {
            warn!("child model '{}' of {} not found, skipping", child_id, file.display());
            return Ok(());
        };
        if self.loading.contains(&child_file) {
            warn!("child model {} is already being loaded, skipping cycle", child_file.display());
            return Ok(());
        }
        self.loading.push(child_file.clone());
        let result = self.build_model(&child_file, &child_doc, Some(tm));
        self.loading.pop();
        result.map(|_| ())
    }

    fn build_scope(&mut self, tm: Index, scope: &RawMap, file: &Path) -> DomainResult<()> {
        let tm_id = self.arena[tm].data.object.id.clone();

        let mut object = self.object_for(scope, Some(tm), SCOPE_KEYS);
        object.id = String::new();
        let data = ScopeData {
            references: scope.get("references").and_then(|r| match r {
                Value::Array(items) => Some(items.iter().map(scalar_to_string).collect()),
                _ => None,
            }),
            diagram: opt_string(scope, "diagram"),
        };
        self.insert(object, NodeKind::Scope(data), tm);

        for so in list(scope, "securityObjectives") {
            let so_raw = mapping(so, "securityObjectives", &tm_id)?;
            self.build_security_objective(tm, so_raw, file)?;
        }

        let tm_filter = self.arena[tm].data.object.versions_filter.clone();
        for asset in list(scope, "assets") {
            let asset_raw = mapping(asset, "assets", &tm_id)?;
            if should_exclude(asset_raw, self.options.visibility, tm_filter.as_deref()) {
                debug!("build_scope: excluded asset {:?}", asset_raw.get("ID"));
                continue;
            }
            self.build_asset(tm, asset_raw, file)?;
        }

        let attackers = list(scope, "attackers");
        if attackers.is_empty() {
            debug!("build_scope: {} has no attackers defined", tm_id);
        }
        for attacker in attackers {
            let raw = mapping(attacker, "attackers", &tm_id)?;
            let object = self.object_for(raw, Some(tm), ATTACKER_KEYS);
            let data = AttackerData {
                in_scope: bool_field(raw, "inScope", true, &object.id)?,
                reference: opt_string(raw, "reference"),
                icon: opt_string(raw, "icon"),
            };
            self.insert(object, NodeKind::Attacker(data), tm);
        }

        for assumption in list(scope, "assumptions") {
            let raw = mapping(assumption, "assumptions", &tm_id)?;
            let object = self.object_for(raw, Some(tm), &[]);
            self.insert(object, NodeKind::Assumption, tm);
        }
        Ok(())
    }

    fn build_security_objective(&mut self, tm: Index, raw: &RawMap, file: &Path) -> DomainResult<()> {
        let object = self.object_for(raw, Some(tm), SEC_OBJ_KEYS);
        if object.id.is_empty() {
            return Err(DomainError::MissingField {
                field: "ID".to_string(),
                id: self.arena[tm].data.object.id.clone(),
                file: file.to_path_buf(),
            });
        }
        let data = SecurityObjectiveData {
            group: opt_string(raw, "group").unwrap_or_else(|| "General".to_string()),
            priority: opt_string(raw, "priority").unwrap_or_else(|| "High".to_string()),
            in_scope: bool_field(raw, "inScope", true, &object.id)?,
            icon: opt_string(raw, "icon"),
        };
        let so = self.insert(object, NodeKind::SecurityObjective(data), tm);
        self.build_references(so, raw, &["contributesTo"], ReferenceRole::ContributesTo, file)
    }

    fn build_asset(&mut self, tm: Index, raw: &RawMap, file: &Path) -> DomainResult<()> {
        let object = self.object_for(raw, Some(tm), ASSET_KEYS);
        let asset_type = opt_string(raw, "type");
        if asset_type.is_none() && object.id.is_empty() {
            return Err(DomainError::MissingField {
                field: "type or ID".to_string(),
                id: self.arena[tm].data.object.id.clone(),
                file: file.to_path_buf(),
            });
        }
        let data = AssetData {
            asset_type,
            in_scope: bool_field(raw, "inScope", true, &object.id)?,
            properties: raw.get("properties").and_then(Value::as_object).cloned(),
            applies_to_versions: opt_string(raw, "appliesToVersions"),
            authentication: opt_string(raw, "authentication"),
            specifies: opt_string(raw, "specifies"),
            icon: opt_string(raw, "icon"),
        };
        self.insert(object, NodeKind::Asset(data), tm);
        Ok(())
    }

    fn build_threat(&mut self, tm: Index, raw: &RawMap, file: &Path) -> DomainResult<()> {
        let mut object = self.object_for(raw, Some(tm), THREAT_KEYS);
        if object.id.is_empty() {
            return Err(DomainError::MissingField {
                field: "ID".to_string(),
                id: self.arena[tm].data.object.id.clone(),
                file: file.to_path_buf(),
            });
        }
        let id = object.id.clone();

        if raw.contains_key("description") {
            return Err(DomainError::ForbiddenField {
                field: "description".to_string(),
                id,
                message: "threat descriptions are derived from attack and impactDesc".to_string(),
            });
        }
        let threat_type = opt_string(raw, "threatType")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| missing("threatType", &id, file))?;
        if object.title.is_none() {
            return Err(missing("title", &id, file));
        }
        let attack = raw
            .get("attack")
            .filter(|v| !v.is_null())
            .map(scalar_to_string)
            .ok_or_else(|| missing("attack", &id, file))?;

        let vector = raw
            .get("CVSS")
            .or_else(|| raw.get("cvss"))
            .and_then(Value::as_object)
            .and_then(|c| opt_string(c, "vector"))
            .unwrap_or_default();
        let cvss = Cvss::from_vector(&vector)?;

        let data = ThreatData {
            attack,
            threat_type,
            impact_desc: opt_string(raw, "impactDesc"),
            fully_mitigated: bool_field(raw, "fullyMitigated", false, &id)?,
            ticket_link: if self.options.visibility.is_public() {
                None
            } else {
                opt_string(raw, "ticketLink")
            },
            cvss,
            conditional: opt_string(raw, "conditional").filter(|c| !c.is_empty()),
            pentest_testable: bool_field(raw, "pentestTestable", false, &id)?,
            compliance: raw.get("compliance").filter(|c| !c.is_null()).cloned(),
            applies_to_versions: opt_string(raw, "appliesToVersions"),
            attack_type: opt_string(raw, "attackType"),
        };
        object.description = data.description();
        let threat = self.insert(object, NodeKind::Threat(data), tm);

        self.build_countermeasures(threat, raw, file)?;
        self.build_references(
            threat,
            raw,
            &["impactedSecObj", "impacts"],
            ReferenceRole::ImpactedSecObj,
            file,
        )?;
        self.build_references(threat, raw, &["attackers"], ReferenceRole::Attacker, file)?;
        self.build_references(threat, raw, &["assets"], ReferenceRole::Asset, file)
    }

    fn build_countermeasures(&mut self, threat: Index, raw: &RawMap, file: &Path) -> DomainResult<()> {
        let owner = self.arena[threat].data.object.id.clone();
        let threat_filter = self.arena[threat].data.object.versions_filter.clone();

        for item in list(raw, "countermeasures") {
            let cm_raw = item
                .as_object()
                .ok_or_else(|| DomainError::MissingCountermeasureKey {
                    owner: owner.clone(),
                    file: file.to_path_buf(),
                })?;
            if should_exclude(cm_raw, self.options.visibility, threat_filter.as_deref()) {
                debug!("build_countermeasures: excluded {:?} in {}", cm_raw.get("ID"), owner);
                continue;
            }

            if cm_raw.contains_key("ID") {
                self.build_countermeasure(threat, cm_raw, file)?;
            } else if let Some(target) = cm_raw.get("REFID").map(scalar_to_string) {
                if target.is_empty() {
                    return Err(DomainError::MalformedReference {
                        owner: owner.clone(),
                        file: file.to_path_buf(),
                    });
                }
                self.insert_reference(threat, cm_raw, target, ReferenceRole::Countermeasure);
            } else {
                return Err(DomainError::MissingCountermeasureKey {
                    owner: owner.clone(),
                    file: file.to_path_buf(),
                });
            }
        }
        Ok(())
    }

    fn build_countermeasure(&mut self, threat: Index, raw: &RawMap, file: &Path) -> DomainResult<()> {
        let object = self.object_for(raw, Some(threat), COUNTERMEASURE_KEYS);
        let id = object.id.clone();
        for field in ["inPlace", "public", "description", "title"] {
            if raw.get(field).map_or(true, Value::is_null) {
                return Err(missing(field, &id, file));
            }
        }

        let mut data = CountermeasureData {
            in_place: bool_field(raw, "inPlace", false, &id)?,
            public: bool_field(raw, "public", false, &id)?,
            operational: bool_field(raw, "operational", false, &id)?,
            operator: UNDEFINED_OPERATOR.to_string(),
            mitigation_type: opt_string(raw, "mitigationType"),
            applies_to_versions: opt_string(raw, "appliesToVersions"),
        };
        if let Some(operator) = opt_string(raw, "operator") {
            data.set_operator(&operator);
        }
        self.insert(object, NodeKind::Countermeasure(data), threat);
        Ok(())
    }

    /// Adds one reference child per entry of the first present key in `keys`.
    fn build_references(
        &mut self,
        owner: Index,
        raw: &RawMap,
        keys: &[&str],
        role: ReferenceRole,
        file: &Path,
    ) -> DomainResult<()> {
        let Some(entries) = keys.iter().find_map(|k| raw.get(*k)) else {
            return Ok(());
        };
        let entries = match entries {
            Value::Null => return Ok(()),
            Value::Array(items) => items,
            _ => {
                return Err(DomainError::MalformedReference {
                    owner: self.arena[owner].data.object.id.clone(),
                    file: file.to_path_buf(),
                })
            }
        };

        for entry in entries {
            let entry_raw = entry.as_object();
            // assets were historically referenced by `ID`
            let target = entry_raw
                .and_then(|e| {
                    e.get("REFID")
                        .or_else(|| (role == ReferenceRole::Asset).then(|| e.get("ID")).flatten())
                })
                .map(scalar_to_string)
                .filter(|t| !t.is_empty());
            match (entry_raw, target) {
                (Some(entry_raw), Some(target)) => {
                    self.insert_reference(owner, entry_raw, target, role);
                }
                _ => {
                    return Err(DomainError::MalformedReference {
                        owner: self.arena[owner].data.object.id.clone(),
                        file: file.to_path_buf(),
                    })
                }
            }
        }
        Ok(())
    }

    fn insert_reference(&mut self, owner: Index, raw: &RawMap, target: String, role: ReferenceRole) {
        let mut object = self.object_for(raw, Some(owner), &["REFID"]);
        // references carry no identity of their own
        object.id = String::new();
        self.insert(object, NodeKind::Reference(ReferenceData { target, role }), owner);
    }
}

fn missing(field: &str, id: &str, file: &Path) -> DomainError {
    DomainError::MissingField {
        field: field.to_string(),
        id: id.to_string(),
        file: file.to_path_buf(),
    }
}

/// Items of a list attribute; absent or null yields none.
fn list<'r>(raw: &'r RawMap, key: &str) -> &'r [Value] {
    match raw.get(key) {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

fn opt_string(raw: &RawMap, key: &str) -> Option<String> {
    raw.get(key).filter(|v| !v.is_null()).map(scalar_to_string)
}

fn mapping<'r>(value: &'r Value, field: &str, id: &str) -> DomainResult<&'r RawMap> {
    value.as_object().ok_or_else(|| DomainError::InvalidField {
        field: field.to_string(),
        id: id.to_string(),
        message: format!("expected a mapping, found {value}"),
    })
}

fn bool_field(raw: &RawMap, key: &str, default: bool, id: &str) -> DomainResult<bool> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(DomainError::InvalidField {
            field: key.to_string(),
            id: id.to_string(),
            message: format!("expected a boolean, found {other}"),
        }),
    }
}

/// Version list accepted by the `--versions` flag and the `versions_filter` setting.
pub fn parse_versions_filter(value: &str) -> Option<Vec<String>> {
    string_list(&Value::String(value.to_string())).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct NoChildren;

    impl DocumentProvider for NoChildren {
        fn load_child(&self, _: &Path, _: &str) -> DomainResult<Option<(PathBuf, Value)>> {
            Ok(None)
        }
    }

    fn build(doc: Value, options: BuildOptions) -> DomainResult<ThreatModelGraph> {
        ModelBuilder::new(&NoChildren, options).build(Path::new("Root.yaml"), &doc)
    }

    fn threat(id: &str) -> Value {
        json!({"ID": id, "title": id, "attack": "", "threatType": "Spoofing"})
    }

    #[test]
    fn given_model_without_scope_when_building_then_missing_scope() {
        let result = build(json!({"ID": "Root"}), BuildOptions::default());
        assert!(matches!(result, Err(DomainError::MissingScope { .. })));
    }

    #[test]
    fn given_threat_with_description_when_building_then_forbidden() {
        let mut t = threat("T1");
        t["description"] = json!("raw");
        let doc = json!({"ID": "Root", "scope": {}, "threats": [t]});

        let result = build(doc, BuildOptions::default());

        assert!(matches!(result, Err(DomainError::ForbiddenField { .. })));
    }

    #[test]
    fn given_attack_and_impact_when_building_then_description_derived() {
        let mut t = threat("T1");
        t["attack"] = json!("Replays tokens");
        t["impactDesc"] = json!("Session takeover");
        let doc = json!({"ID": "Root", "scope": {}, "threats": [t]});

        let graph = build(doc, BuildOptions::default()).unwrap();

        let t = graph.threats(graph.root())[0];
        assert_eq!(
            graph.object(t).description,
            "**Attack:** Replays tokens<br/> **Impact:** Session takeover"
        );
    }

    #[test]
    fn given_empty_attack_when_building_then_accepted() {
        let doc = json!({"ID": "Root", "scope": {}, "threats": [threat("T1")]});
        let graph = build(doc, BuildOptions::default()).unwrap();
        let t = graph.threats(graph.root())[0];
        assert_eq!(graph.threat(t).unwrap().attack, "");
    }

    #[test]
    fn given_missing_attack_when_building_then_error_names_threat() {
        let doc = json!({"ID": "Root", "scope": {},
            "threats": [{"ID": "T1", "title": "t", "threatType": "x"}]});
        let err = build(doc, BuildOptions::default()).unwrap_err();
        assert!(err.to_string().contains("attack required for T1"));
    }

    #[test]
    fn given_countermeasure_without_key_when_building_then_error() {
        let mut t = threat("T1");
        t["countermeasures"] = json!([{"title": "x"}]);
        let doc = json!({"ID": "Root", "scope": {}, "threats": [t]});

        let result = build(doc, BuildOptions::default());

        assert!(matches!(result, Err(DomainError::MissingCountermeasureKey { .. })));
    }

    #[test]
    fn given_reference_without_refid_when_building_then_malformed() {
        let mut t = threat("T1");
        t["impactedSecObj"] = json!([{"ID": "SO1"}]);
        let doc = json!({"ID": "Root", "scope": {}, "threats": [t]});

        let result = build(doc, BuildOptions::default());

        assert!(matches!(result, Err(DomainError::MalformedReference { .. })));
    }

    #[test]
    fn given_ticket_link_when_public_then_dropped() {
        let mut t = threat("T1");
        t["ticketLink"] = json!("https://tickets/1");
        let doc = json!({"ID": "Root", "scope": {}, "threats": [t]});
        let options = BuildOptions {
            visibility: Visibility::Public,
            versions_filter: None,
        };

        let graph = build(doc, options).unwrap();

        let t = graph.threats(graph.root())[0];
        assert_eq!(graph.threat(t).unwrap().ticket_link, None);
    }

    #[test]
    fn given_no_title_when_building_model_then_id_with_spaces() {
        let graph = build(json!({"ID": "My_Root", "scope": {}}), BuildOptions::default()).unwrap();
        assert_eq!(graph.object(graph.root()).title(), "My Root");
    }

    #[test]
    fn given_versions_string_when_parsing_then_split_on_commas() {
        assert_eq!(
            parse_versions_filter("1.0, 2.0"),
            Some(vec!["1.0".to_string(), "2.0".to_string()])
        );
        assert_eq!(parse_versions_filter(""), None);
    }
}
