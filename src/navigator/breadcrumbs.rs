//! Human readable trails for resolved pointers

use super::pointer::{JsonPointer, PointerSegment};
use serde_json::Value;

/// Render the resolved part of a walk as `["Bundle", "entry[1]", "Observation", "component[0]"]`
///
/// Labels come from the tree: entries are numbered, entry resources are
/// named by their `resourceType` (falling back to `resource_type` when the
/// resource carries none), and array positions are glued to the member
/// that holds the array. Only segments present in `pointer` are rendered.
pub fn build(tree: &Value, pointer: &JsonPointer, resource_type: Option<&str>) -> Vec<String> {
    let segments = pointer.segments();
    let mut crumbs = Vec::with_capacity(segments.len() + 1);

    crumbs.push(resource_label(tree, resource_type));
    let in_bundle = is_bundle(tree);

    let mut i = 0;
    while i < segments.len() {
        match (&segments[i], segments.get(i + 1)) {
            (PointerSegment::Key(entry), Some(PointerSegment::Index(n)))
                if in_bundle && i == 0 && entry == "entry" =>
            {
                crumbs.push(format!("entry[{n}]"));
                i += 2;
                if let Some(PointerSegment::Key(resource)) = segments.get(i) {
                    if resource == "resource" {
                        let body = tree
                            .get("entry")
                            .and_then(|e| e.get(*n))
                            .and_then(|e| e.get("resource"))
                            .unwrap_or(&Value::Null);
                        crumbs.push(resource_label(body, resource_type));
                        i += 1;
                    }
                }
            }
            (PointerSegment::Key(key), Some(PointerSegment::Index(n))) => {
                crumbs.push(format!("{key}[{n}]"));
                i += 2;
            }
            (PointerSegment::Key(key), _) => {
                crumbs.push(key.clone());
                i += 1;
            }
            (PointerSegment::Index(n), _) => {
                crumbs.push(format!("[{n}]"));
                i += 1;
            }
        }
    }
    crumbs
}

fn is_bundle(value: &Value) -> bool {
    value.get("resourceType").and_then(Value::as_str) == Some("Bundle")
}

fn resource_label(value: &Value, fallback: Option<&str>) -> String {
    value
        .get("resourceType")
        .and_then(Value::as_str)
        .or(fallback)
        .unwrap_or("Resource")
        .to_string()
}
