//! Navigation results

use serde::Serialize;

/// Where a path landed in the tree
///
/// On a partial walk `json_pointer` addresses the deepest node that was
/// reached, `exists` is false and `missing_parents` lists every step that
/// was not consumed, in path order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLocation {
    /// RFC 6901 pointer of the deepest resolved node
    pub json_pointer: String,
    /// Whether every step was satisfied
    pub exists: bool,
    /// Unconsumed step descriptors
    pub missing_parents: Vec<String>,
    /// Human readable trail of the resolved part
    pub breadcrumbs: Vec<String>,
    /// Set when entry resolution could not pick a single entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<NavigationAdvisory>,
}

impl ResolvedLocation {
    /// True when the walk stopped before the last step
    pub fn is_partial(&self) -> bool {
        !self.exists
    }
}

/// Condition met while resolving the starting entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NavigationAdvisory {
    /// Several entries carry the requested resource type or reference
    #[serde(rename_all = "camelCase")]
    AmbiguousEntry {
        /// Requested resource type or reference
        resource_type: String,
        /// Matching entry positions
        candidates: Vec<usize>,
    },
    /// No entry matches
    #[serde(rename_all = "camelCase")]
    EntryNotFound {
        /// Requested resource type or reference
        resource_type: String,
    },
    /// A caller-supplied entry index is outside the entry list
    #[serde(rename_all = "camelCase")]
    EntryIndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of entries
        entry_count: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialized_shape() {
        let location = ResolvedLocation {
            json_pointer: "/entry/0/resource".into(),
            exists: false,
            missing_parents: vec!["name".into()],
            breadcrumbs: vec!["Bundle".into(), "entry[0]".into(), "Patient".into()],
            advisory: Some(NavigationAdvisory::AmbiguousEntry {
                resource_type: "Patient".into(),
                candidates: vec![0, 1],
            }),
        };
        assert_eq!(
            serde_json::to_value(&location).unwrap(),
            json!({
                "jsonPointer": "/entry/0/resource",
                "exists": false,
                "missingParents": ["name"],
                "breadcrumbs": ["Bundle", "entry[0]", "Patient"],
                "advisory": {"kind": "ambiguousEntry", "resourceType": "Patient", "candidates": [0, 1]}
            })
        );
        assert!(location.is_partial());
    }
}
