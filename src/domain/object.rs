//! Common payload of every model node: identity, hierarchy-derived ids and the raw attributes.

use serde_json::{Map, Value};

/// Raw attribute snapshot as parsed from a model document.
pub type RawMap = Map<String, Value>;

const TITLE_FALLBACK_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct ModelObject {
    /// Value of the raw `ID` field, empty for nodes without one (scope, references)
    pub id: String,
    /// Dot-joined ids from the model root down to this node
    pub hierarchical_id: String,
    pub title: Option<String>,
    pub description: String,
    /// Effective version filter: own value, else inherited from the nearest ancestor
    pub versions_filter: Option<Vec<String>>,
    /// Attribute snapshot the node was built from
    pub origin: RawMap,
    /// Attributes not owned by a typed field
    pub extras: RawMap,
}

impl ModelObject {
    /// Builds the common part of a node from its raw attributes.
    ///
    /// `known` lists the keys owned by typed fields of the concrete node kind;
    /// everything else lands in `extras`.
    pub fn from_raw(
        raw: &RawMap,
        parent: Option<&ModelObject>,
        inherited_filter: Option<Vec<String>>,
        known: &[&str],
    ) -> Self {
        let id = raw.get("ID").map(scalar_to_string).unwrap_or_default();
        let hierarchical_id = match parent {
            Some(p) => format!("{}.{}", p.hierarchical_id, id),
            None => id.clone(),
        };
        let versions_filter = raw
            .get("versionsFilter")
            .and_then(string_list)
            .filter(|v| !v.is_empty())
            .or(inherited_filter);

        let extras = raw
            .iter()
            .filter(|(k, _)| !COMMON_KEYS.contains(&k.as_str()) && !known.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Self {
            id,
            hierarchical_id,
            title: raw.get("title").map(scalar_to_string).filter(|t| !t.is_empty()),
            description: raw.get("description").map(scalar_to_string).unwrap_or_default(),
            versions_filter,
            origin: raw.clone(),
            extras,
        }
    }

    /// Hierarchical id without its leading root segment; the root keeps its whole id.
    pub fn anchor(&self) -> &str {
        match self.hierarchical_id.split_once('.') {
            Some((_, rest)) => rest,
            None => &self.hierarchical_id,
        }
    }

    pub fn title(&self) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        if self.description.is_empty() {
            return "No title".to_string();
        }
        let head: String = self.description.chars().take(TITLE_FALLBACK_CHARS).collect();
        format!("{head}[...]")
    }

    /// Looks up a dynamic attribute by name.
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extras.get(key)
    }

    pub fn extra_str(&self, key: &str) -> Option<String> {
        self.extras.get(key).map(scalar_to_string)
    }
}

const COMMON_KEYS: [&str; 4] = ["ID", "title", "description", "versionsFilter"];

/// Renders a scalar (or list of scalars) the way it appears in report text.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(scalar_to_string)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

/// Accepts a single string (comma-separated) or a list of scalars.
pub fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        Value::Array(items) => Some(items.iter().map(scalar_to_string).collect()),
        Value::Number(_) => Some(vec![scalar_to_string(value)]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: Value) -> RawMap {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn given_parent_when_building_then_hierarchical_id_is_dot_joined() {
        let root = ModelObject::from_raw(&raw(json!({"ID": "Root"})), None, None, &[]);
        let child = ModelObject::from_raw(&raw(json!({"ID": "Sub"})), Some(&root), None, &[]);
        let leaf = ModelObject::from_raw(&raw(json!({"ID": "T1"})), Some(&child), None, &[]);

        assert_eq!(leaf.hierarchical_id, "Root.Sub.T1");
        assert_eq!(leaf.anchor(), "Sub.T1");
        assert_eq!(root.anchor(), "Root");
    }

    #[test]
    fn given_no_title_when_title_then_falls_back_to_description_head() {
        let long = "x".repeat(80);
        let obj = ModelObject::from_raw(&raw(json!({"ID": "A", "description": long})), None, None, &[]);
        assert_eq!(obj.title(), format!("{}[...]", "x".repeat(50)));

        let bare = ModelObject::from_raw(&raw(json!({"ID": "B"})), None, None, &[]);
        assert_eq!(bare.title(), "No title");
    }

    #[test]
    fn given_unknown_keys_when_building_then_kept_as_extras() {
        let obj = ModelObject::from_raw(
            &raw(json!({"ID": "A", "inPlace": true, "custom": "v"})),
            None,
            None,
            &["inPlace"],
        );
        assert_eq!(obj.extra_str("custom").as_deref(), Some("v"));
        assert!(obj.extra("inPlace").is_none());
    }

    #[test]
    fn given_own_filter_when_building_then_overrides_inherited() {
        let inherited = Some(vec!["1.0".to_string()]);
        let own = ModelObject::from_raw(
            &raw(json!({"ID": "A", "versionsFilter": "2.0, 3.0"})),
            None,
            inherited.clone(),
            &[],
        );
        let none = ModelObject::from_raw(&raw(json!({"ID": "B"})), None, inherited, &[]);

        assert_eq!(own.versions_filter, Some(vec!["2.0".into(), "3.0".into()]));
        assert_eq!(none.versions_filter, Some(vec!["1.0".into()]));
    }
}
