//! Read-only index over the entries of a bundle
//!
//! Built exactly once per validation run and shared by every navigation in
//! that run. Lookups return candidate lists in document order so that the
//! resolver can apply either resolution policy without rescanning.

use rustc_hash::FxHashMap;
use serde_json::Value;
use smallvec::SmallVec;

/// Candidate entry positions, in document order
pub type Candidates = SmallVec<[usize; 4]>;

/// What the index knows about one bundle entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    /// `entry[i].fullUrl`
    pub full_url: Option<String>,
    /// `entry[i].resource.resourceType`
    pub resource_type: Option<String>,
    /// `entry[i].resource.id`
    pub resource_id: Option<String>,
}

impl EntryRecord {
    fn from_json(entry: &Value) -> Self {
        let resource = entry.get("resource");
        let text = |v: Option<&Value>, key: &str| {
            v.and_then(|v| v.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        EntryRecord {
            full_url: text(Some(entry), "fullUrl"),
            resource_type: text(resource, "resourceType"),
            resource_id: text(resource, "id"),
        }
    }

    /// `ResourceType/id` key, when both parts are present
    pub fn relative_key(&self) -> Option<String> {
        match (&self.resource_type, &self.resource_id) {
            (Some(rt), Some(id)) => Some(format!("{rt}/{id}")),
            _ => None,
        }
    }
}

/// Mapping from resource type / reference key to entry positions
#[derive(Debug, Clone, Default)]
pub struct EntryIndexMap {
    root_resource_type: Option<String>,
    entries: Vec<EntryRecord>,
    by_type: FxHashMap<String, Candidates>,
    by_full_url: FxHashMap<String, Candidates>,
    by_relative_key: FxHashMap<String, Candidates>,
}

impl EntryIndexMap {
    /// Index a parsed JSON document
    ///
    /// Non-bundle documents produce an index with no entries; the root
    /// resource type is still recorded.
    pub fn build(tree: &Value) -> Self {
        let root_resource_type = tree
            .get("resourceType")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut index = EntryIndexMap {
            root_resource_type,
            ..Default::default()
        };
        if !index.is_bundle() {
            return index;
        }

        let entries = tree.get("entry").and_then(Value::as_array);
        for (idx, entry) in entries.into_iter().flatten().enumerate() {
            let record = EntryRecord::from_json(entry);
            if let Some(rt) = &record.resource_type {
                index.by_type.entry(rt.clone()).or_default().push(idx);
            }
            if let Some(url) = &record.full_url {
                index.by_full_url.entry(url.clone()).or_default().push(idx);
            }
            if let Some(key) = record.relative_key() {
                index.by_relative_key.entry(key).or_default().push(idx);
            }
            index.entries.push(record);
        }

        log::debug!(
            "indexed {} bundle entries across {} resource types",
            index.entries.len(),
            index.by_type.len()
        );
        index
    }

    /// True when the root document is a Bundle
    pub fn is_bundle(&self) -> bool {
        self.root_resource_type.as_deref() == Some("Bundle")
    }

    /// `resourceType` of the root document
    pub fn root_resource_type(&self) -> Option<&str> {
        self.root_resource_type.as_deref()
    }

    /// Number of entries (zero for non-bundle documents)
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Record for entry `index`
    pub fn entry(&self, index: usize) -> Option<&EntryRecord> {
        self.entries.get(index)
    }

    /// Resource type of entry `index`
    pub fn resource_type_of(&self, index: usize) -> Option<&str> {
        self.entries.get(index)?.resource_type.as_deref()
    }

    /// Entries whose resource has the given type
    pub fn by_resource_type(&self, resource_type: &str) -> &[usize] {
        self.by_type
            .get(resource_type)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    /// Entries whose `fullUrl` equals `url` verbatim
    pub fn by_full_url(&self, url: &str) -> &[usize] {
        self.by_full_url.get(url).map(|c| c.as_slice()).unwrap_or(&[])
    }

    /// Entries whose resource is `resource_type` with id `id`
    pub fn by_type_and_id(&self, resource_type: &str, id: &str) -> &[usize] {
        self.by_relative_key
            .get(&format!("{resource_type}/{id}"))
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    /// Distinct resource types present, sorted
    pub fn resource_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.by_type.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_index_creation() {
        let bundle_json = json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "entry": [
                {
                    "fullUrl": "http://example.org/Patient/1",
                    "resource": {"resourceType": "Patient", "id": "1"}
                },
                {
                    "fullUrl": "urn:uuid:6f1c2b7e-2d5b-4a8e-9a57-0c2f1a4b9d11",
                    "resource": {"resourceType": "Observation", "id": "obs"}
                },
                {
                    "resource": {"resourceType": "Patient", "id": "2"}
                }
            ]
        });

        let index = EntryIndexMap::build(&bundle_json);

        assert!(index.is_bundle());
        assert_eq!(index.entry_count(), 3);
        assert_eq!(index.by_resource_type("Patient"), &[0, 2]);
        assert_eq!(index.by_full_url("http://example.org/Patient/1"), &[0]);
        assert_eq!(index.by_type_and_id("Observation", "obs"), &[1]);
        assert_eq!(index.resource_type_of(1), Some("Observation"));
        assert_eq!(index.resource_types(), vec!["Observation", "Patient"]);
        assert!(index.by_resource_type("Encounter").is_empty());
    }

    #[test]
    fn test_non_bundle_has_no_entries() {
        let index = EntryIndexMap::build(&json!({"resourceType": "Patient", "id": "p"}));
        assert!(!index.is_bundle());
        assert_eq!(index.root_resource_type(), Some("Patient"));
        assert_eq!(index.entry_count(), 0);
    }

    #[test]
    fn test_entries_without_resource_are_kept_in_position() {
        let index = EntryIndexMap::build(&json!({
            "resourceType": "Bundle",
            "entry": [{"fullUrl": "urn:uuid:x"}, {"resource": {"resourceType": "Patient"}}]
        }));
        assert_eq!(index.entry_count(), 2);
        assert_eq!(index.by_resource_type("Patient"), &[1]);
        assert_eq!(index.resource_type_of(0), None);
    }
}
