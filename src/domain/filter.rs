//! Visibility and version inclusion rules applied while the model is built.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::object::{string_list, RawMap};

/// Audience a report is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Internal report: everything is included
    #[default]
    Full,
    /// External report: `public: false` items and ticket links are dropped
    Public,
}

impl Visibility {
    pub fn is_public(&self) -> bool {
        matches!(self, Visibility::Public)
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Full => f.write_str("full"),
            Visibility::Public => f.write_str("public"),
        }
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Visibility::Full),
            "public" => Ok(Visibility::Public),
            other => Err(format!("unknown visibility '{other}' (expected full|public)")),
        }
    }
}

/// True when the item must not be instantiated into the graph.
pub fn should_exclude(raw: &RawMap, visibility: Visibility, versions_filter: Option<&[String]>) -> bool {
    excluded_as_private(raw, visibility) || excluded_by_version(raw, versions_filter)
}

/// Only an explicit `public: false` hides an item, and only in public mode.
pub fn excluded_as_private(raw: &RawMap, visibility: Visibility) -> bool {
    visibility.is_public() && matches!(raw.get("public"), Some(Value::Bool(false)))
}

/// Items tagged with `appliesToVersions` survive only if the effective filter names one of them.
/// Without a filter there is no restriction.
pub fn excluded_by_version(raw: &RawMap, versions_filter: Option<&[String]>) -> bool {
    let Some(filter) = versions_filter else {
        return false;
    };
    let Some(applies) = raw.get("appliesToVersions").and_then(string_list) else {
        return false;
    };
    !filter.iter().any(|version| applies.contains(version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn raw(v: Value) -> RawMap {
        v.as_object().cloned().unwrap_or_default()
    }

    #[rstest]
    #[case(json!({"public": false}), Visibility::Public, true)]
    #[case(json!({"public": false}), Visibility::Full, false)]
    #[case(json!({"public": true}), Visibility::Public, false)]
    #[case(json!({}), Visibility::Public, false)]
    fn given_public_flag_when_filtering_then_only_explicit_false_hidden_in_public(
        #[case] item: Value,
        #[case] visibility: Visibility,
        #[case] expected: bool,
    ) {
        assert_eq!(should_exclude(&raw(item), visibility, None), expected);
    }

    #[rstest]
    #[case(json!({"appliesToVersions": ["1.0", "2.0"]}), Some(vec!["2.0"]), false)]
    #[case(json!({"appliesToVersions": ["1.0"]}), Some(vec!["2.0"]), true)]
    #[case(json!({"appliesToVersions": "1.0"}), Some(vec!["1.0"]), false)]
    #[case(json!({"appliesToVersions": ["1.0"]}), None, false)]
    #[case(json!({}), Some(vec!["1.0"]), false)]
    fn given_version_tags_when_filtering_then_membership_decides(
        #[case] item: Value,
        #[case] filter: Option<Vec<&str>>,
        #[case] expected: bool,
    ) {
        let filter: Option<Vec<String>> = filter.map(|f| f.into_iter().map(String::from).collect());
        assert_eq!(
            should_exclude(&raw(item), Visibility::Full, filter.as_deref()),
            expected
        );
    }

    #[test]
    fn given_private_item_when_version_matches_then_still_hidden_in_public() {
        let item = raw(json!({"public": false, "appliesToVersions": ["1.0"]}));
        let filter = vec!["1.0".to_string()];
        assert!(should_exclude(&item, Visibility::Public, Some(&filter)));
    }

    #[test]
    fn given_visibility_strings_when_parsing_then_round_trips() {
        assert_eq!("PUBLIC".parse::<Visibility>(), Ok(Visibility::Public));
        assert_eq!(Visibility::Full.to_string(), "full");
        assert!("internal".parse::<Visibility>().is_err());
    }
}
