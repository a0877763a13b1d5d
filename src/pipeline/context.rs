//! Per-run state

use crate::bundle::{EntryIndexMap, EntryResolver, ResolutionError, ResolutionPolicy};
use crate::navigator::{JsonNavigator, ResolvedLocation};
use crate::parser::PathCache;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NavigationKey {
    path: String,
    start_entry: Option<usize>,
    policy: ResolutionPolicy,
}

/// State owned by exactly one validation run
///
/// Holds the parsed tree, the entry index built once from it, the run's
/// resolution policy and memoized navigation results. Compiled paths come
/// from a shared [`PathCache`], which only ever holds parse results.
#[derive(Debug)]
pub struct RunContext {
    tree: Value,
    resolver: EntryResolver,
    policy: ResolutionPolicy,
    paths: Arc<PathCache>,
    navigations: DashMap<NavigationKey, Option<ResolvedLocation>>,
}

impl RunContext {
    /// Build the context, indexing the tree's entries once
    pub fn new(tree: Value, policy: ResolutionPolicy, paths: Arc<PathCache>) -> Self {
        let index = EntryIndexMap::build(&tree);
        log::debug!(
            "run context: {} entries, policy {:?}",
            index.entry_count(),
            policy
        );
        Self {
            tree,
            resolver: EntryResolver::new(index),
            policy,
            paths,
            navigations: DashMap::new(),
        }
    }

    /// The input tree
    pub fn tree(&self) -> &Value {
        &self.tree
    }

    /// The run's entry resolver
    pub fn resolver(&self) -> &EntryResolver {
        &self.resolver
    }

    /// The run's entry index
    pub fn index(&self) -> &EntryIndexMap {
        self.resolver.index()
    }

    /// Policy applied when a call does not name one
    pub fn policy(&self) -> ResolutionPolicy {
        self.policy
    }

    /// Navigator over this run's tree
    pub fn navigator(&self) -> JsonNavigator<'_> {
        JsonNavigator::new(&self.tree, &self.resolver)
    }

    /// Navigate a path string under the run's policy
    ///
    /// Returns `None` when the path does not parse.
    pub fn navigate(&self, path: &str, start_entry: Option<usize>) -> Option<ResolvedLocation> {
        self.navigate_with(path, start_entry, self.policy)
    }

    /// Navigate a path string under an explicit policy
    pub fn navigate_with(
        &self,
        path: &str,
        start_entry: Option<usize>,
        policy: ResolutionPolicy,
    ) -> Option<ResolvedLocation> {
        let key = NavigationKey {
            path: path.to_string(),
            start_entry,
            policy,
        };
        if let Some(hit) = self.navigations.get(&key) {
            return hit.value().clone();
        }
        let location = match self.paths.get_or_parse(path) {
            Ok(expr) => Some(self.navigator().navigate(&expr, start_entry, policy)),
            Err(err) => {
                log::debug!("path '{path}' does not parse: {err}");
                None
            }
        };
        self.navigations.insert(key, location.clone());
        location
    }

    /// Describe a pointer that is already known
    pub fn locate_pointer(&self, pointer: &str, resource_type: Option<&str>) -> Option<ResolvedLocation> {
        self.navigator().locate_pointer(pointer, resource_type)
    }

    /// Resolve a reference string to an entry under the run's policy
    pub fn resolve_reference(&self, reference: &str) -> Result<usize, ResolutionError> {
        self.resolver.resolve_reference(reference, self.policy, None)
    }

    /// Number of memoized navigations
    pub fn navigations(&self) -> usize {
        self.navigations.len()
    }

    /// Give the tree back
    pub fn into_tree(self) -> Value {
        self.tree
    }
}
