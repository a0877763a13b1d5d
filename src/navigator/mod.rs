//! Fail-safe navigation of compiled paths over a JSON tree
//!
//! The navigator walks a [`PathExpression`] one step at a time. When a step
//! cannot be satisfied the walk stops where it is: the pointer reached so
//! far is reported with `exists = false` and every unconsumed step is listed
//! in `missing_parents`. Navigation never fails and never mutates the tree.

pub mod breadcrumbs;
pub mod location;
pub mod pointer;
pub mod predicate;

pub use location::{NavigationAdvisory, ResolvedLocation};
pub use pointer::{JsonPointer, PointerSegment, escape_token, unescape_token};

use crate::ast::{IndexSelector, PathExpression, Step, describe_steps};
use crate::bundle::{EntryResolver, ResolutionError, ResolutionPolicy};
use serde_json::Value;

/// Navigator over one tree, sharing the run's entry resolver
#[derive(Debug, Clone, Copy)]
pub struct JsonNavigator<'a> {
    tree: &'a Value,
    resolver: &'a EntryResolver,
}

/// Where the walk begins, or why it could not begin
enum Start<'a> {
    At {
        node: &'a Value,
        pointer: JsonPointer,
        consumed: usize,
    },
    Halted {
        pointer: JsonPointer,
        prefix: Vec<String>,
        from: usize,
        advisory: Option<NavigationAdvisory>,
    },
}

impl<'a> JsonNavigator<'a> {
    /// Create a navigator
    pub fn new(tree: &'a Value, resolver: &'a EntryResolver) -> Self {
        Self { tree, resolver }
    }

    /// The tree being navigated
    pub fn tree(&self) -> &'a Value {
        self.tree
    }

    /// Walk `expr`
    ///
    /// `start_entry` is a caller-supplied entry index. It positions paths
    /// that begin with a resource type or with a plain property; an entry
    /// written into the path itself (`Bundle.entry[n].resource`) wins over it.
    pub fn navigate(
        &self,
        expr: &PathExpression,
        start_entry: Option<usize>,
        policy: ResolutionPolicy,
    ) -> ResolvedLocation {
        let steps = &expr.steps[..];
        match self.start(expr, start_entry, policy) {
            Start::At {
                node,
                pointer,
                consumed,
            } => self.walk(expr, node, pointer, consumed),
            Start::Halted {
                pointer,
                mut prefix,
                from,
                advisory,
            } => {
                prefix.extend(describe_steps(&steps[from.min(steps.len())..]));
                self.finish(expr, pointer, prefix, advisory)
            }
        }
    }

    /// Describe a pointer that is already known, e.g. from a grammar finding
    pub fn locate_pointer(&self, pointer: &str, resource_type: Option<&str>) -> Option<ResolvedLocation> {
        let parsed = JsonPointer::parse(pointer)?;
        Some(ResolvedLocation {
            json_pointer: parsed.to_string(),
            exists: self.tree.pointer(pointer).is_some(),
            missing_parents: Vec::new(),
            breadcrumbs: breadcrumbs::build(self.tree, &parsed, resource_type),
            advisory: None,
        })
    }

    fn start(
        &self,
        expr: &PathExpression,
        start_entry: Option<usize>,
        policy: ResolutionPolicy,
    ) -> Start<'a> {
        let is_bundle = self.resolver.index().is_bundle();

        if let Some(n) = expr.entry_hint {
            return self.enter_entry(n, 0, vec![format!("entry[{n}]"), "resource".to_string()]);
        }

        match expr.steps.first() {
            Some(Step::ResourceTypeFilter(name)) if is_bundle && name == "Bundle" => Start::At {
                node: self.tree,
                pointer: JsonPointer::root(),
                consumed: 1,
            },
            Some(Step::ResourceTypeFilter(name)) if is_bundle => {
                match self.resolver.resolve_resource_type(name, policy, start_entry) {
                    Ok(index) => self.enter_entry(index, 1, Vec::new()),
                    Err(err) => {
                        if err.is_ambiguous() {
                            log::warn!("ambiguous entry for '{expr}': {err}");
                        }
                        Start::Halted {
                            pointer: JsonPointer::root(),
                            prefix: Vec::new(),
                            from: 0,
                            advisory: advisory_for(&err),
                        }
                    }
                }
            }
            Some(Step::ResourceTypeFilter(name)) => {
                let own_type = self.tree.get("resourceType").and_then(Value::as_str);
                if own_type == Some(name.as_str()) {
                    Start::At {
                        node: self.tree,
                        pointer: JsonPointer::root(),
                        consumed: 1,
                    }
                } else {
                    Start::Halted {
                        pointer: JsonPointer::root(),
                        prefix: Vec::new(),
                        from: 0,
                        advisory: None,
                    }
                }
            }
            _ => match start_entry {
                Some(index) if is_bundle => self.enter_entry(index, 0, Vec::new()),
                _ => Start::At {
                    node: self.tree,
                    pointer: JsonPointer::root(),
                    consumed: 0,
                },
            },
        }
    }

    /// Position at `entry[index].resource`
    ///
    /// `missing_entry` is what to report when the entry itself does not
    /// exist; the steps from `consumed` onwards follow it.
    fn enter_entry(&self, index: usize, consumed: usize, missing_entry: Vec<String>) -> Start<'a> {
        let entry = self
            .tree
            .get("entry")
            .and_then(Value::as_array)
            .and_then(|entries| entries.get(index));

        let Some(entry) = entry else {
            let advisory = self.resolver.index().is_bundle().then(|| {
                NavigationAdvisory::EntryIndexOutOfRange {
                    index,
                    entry_count: self.resolver.index().entry_count(),
                }
            });
            let prefix = if missing_entry.is_empty() {
                vec![format!("entry[{index}]"), "resource".to_string()]
            } else {
                missing_entry
            };
            return Start::Halted {
                pointer: JsonPointer::root(),
                prefix,
                from: consumed,
                advisory,
            };
        };

        let mut pointer = JsonPointer::root();
        pointer.push_key("entry");
        pointer.push_index(index);
        match entry.get("resource") {
            Some(resource) if resource.is_object() => {
                pointer.push_key("resource");
                Start::At {
                    node: resource,
                    pointer,
                    consumed,
                }
            }
            _ => Start::Halted {
                pointer,
                prefix: vec!["resource".to_string()],
                from: consumed,
                advisory: None,
            },
        }
    }

    fn walk(
        &self,
        expr: &PathExpression,
        mut node: &'a Value,
        mut pointer: JsonPointer,
        consumed: usize,
    ) -> ResolvedLocation {
        let steps = &expr.steps[..];
        let mut i = consumed;

        while i < steps.len() {
            let advanced = match &steps[i] {
                Step::Property(name) => match node.get(name.as_str()) {
                    Some(child) if is_present(child) => {
                        pointer.push_key(name.as_str());
                        node = child;
                        let addressed = matches!(
                            steps.get(i + 1),
                            Some(Step::Index(_)) | Some(Step::Predicate(_))
                        );
                        if let (Value::Array(items), false) = (child, addressed) {
                            if let Some(first) = items.first() {
                                pointer.push_index(0);
                                node = first;
                            }
                        }
                        true
                    }
                    _ => false,
                },
                Step::Index(selector) => {
                    let position = match selector {
                        IndexSelector::Position(n) => *n,
                        IndexSelector::Wildcard => 0,
                    };
                    match node {
                        Value::Array(items) => match items.get(position) {
                            Some(item) if !item.is_null() => {
                                pointer.push_index(position);
                                node = item;
                                true
                            }
                            _ => false,
                        },
                        // A single value is a collection of one
                        Value::Null => false,
                        _ => position == 0,
                    }
                }
                Step::Predicate(p) => match node {
                    Value::Array(items) => match predicate::first_match(p, items) {
                        Some(position) => {
                            pointer.push_index(position);
                            node = &items[position];
                            true
                        }
                        None => false,
                    },
                    Value::Object(_) => predicate::matches(p, node),
                    _ => false,
                },
                Step::ResourceTypeFilter(name) => {
                    node.get("resourceType").and_then(Value::as_str) == Some(name.as_str())
                }
            };

            if !advanced {
                let missing = describe_steps(&steps[i..]);
                log::debug!("'{expr}' halted at '{pointer}' missing {missing:?}");
                return self.finish(expr, pointer, missing, None);
            }
            i += 1;
        }

        self.finish(expr, pointer, Vec::new(), None)
    }

    fn finish(
        &self,
        expr: &PathExpression,
        pointer: JsonPointer,
        missing_parents: Vec<String>,
        advisory: Option<NavigationAdvisory>,
    ) -> ResolvedLocation {
        ResolvedLocation {
            json_pointer: pointer.to_string(),
            exists: missing_parents.is_empty() && advisory.is_none(),
            breadcrumbs: breadcrumbs::build(self.tree, &pointer, expr.resource_type()),
            missing_parents,
            advisory,
        }
    }
}

/// Null and empty arrays count as absent
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

fn advisory_for(err: &ResolutionError) -> Option<NavigationAdvisory> {
    match err {
        ResolutionError::Ambiguous { target, candidates } => Some(NavigationAdvisory::AmbiguousEntry {
            resource_type: target.clone(),
            candidates: candidates.clone(),
        }),
        ResolutionError::NotFound { target } => Some(NavigationAdvisory::EntryNotFound {
            resource_type: target.clone(),
        }),
        ResolutionError::IndexOutOfRange { index, entry_count } => {
            Some(NavigationAdvisory::EntryIndexOutOfRange {
                index: *index,
                entry_count: *entry_count,
            })
        }
        ResolutionError::UnsupportedReference { .. } | ResolutionError::NotABundle => None,
    }
}
