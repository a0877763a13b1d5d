//! Entry resolution: resource-type tokens and reference strings to entry indexes
//!
//! Two policies are supported and always chosen explicitly by the caller:
//! [`ResolutionPolicy::FirstMatch`] (runtime default) picks the first match
//! in document order, [`ResolutionPolicy::ErrorIfMultiple`] (authoring)
//! refuses to choose between several candidates. An explicit entry index
//! supplied by the caller is authoritative and skips the scan entirely.

use super::entry_index::EntryIndexMap;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Policy used when a resource type or reference has several candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionPolicy {
    /// First matching entry in document order
    #[default]
    FirstMatch,
    /// Exactly one match required; several is a disambiguation failure
    ErrorIfMultiple,
}

impl ResolutionPolicy {
    /// Policy used while validating submitted data
    pub const fn runtime() -> Self {
        ResolutionPolicy::FirstMatch
    }

    /// Policy used while authoring rules, where ambiguity must surface
    pub const fn authoring() -> Self {
        ResolutionPolicy::ErrorIfMultiple
    }
}

/// Why an entry could not be resolved
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResolutionError {
    /// No entry matches
    #[error("No bundle entry matches '{target}'")]
    NotFound {
        /// Resource type or reference that was looked up
        target: String,
    },

    /// Several entries match under [`ResolutionPolicy::ErrorIfMultiple`]
    #[error("'{target}' matches {} bundle entries: {candidates:?}", candidates.len())]
    Ambiguous {
        /// Resource type or reference that was looked up
        target: String,
        /// Matching entry positions, in document order
        candidates: Vec<usize>,
    },

    /// Caller-supplied index outside the entry list
    #[error("Entry index {index} is out of range for a bundle with {entry_count} entries")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of entries in the bundle
        entry_count: usize,
    },

    /// Reference string in none of the supported forms
    #[error("Unsupported reference format '{reference}'")]
    UnsupportedReference {
        /// The reference string
        reference: String,
    },

    /// The document is not a Bundle, so there are no entries to resolve
    #[error("Document is not a Bundle")]
    NotABundle,
}

impl ResolutionError {
    /// True for the disambiguation failure
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, ResolutionError::Ambiguous { .. })
    }
}

/// Recognised reference string forms
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceForm<'a> {
    /// `urn:uuid:<id>`, matched verbatim against `fullUrl`
    UrnUuid(&'a str),
    /// `<ResourceType>/<id>`, optionally followed by `/_history/<vid>`
    Relative {
        /// Resource type part
        resource_type: &'a str,
        /// Logical id part
        id: &'a str,
    },
    /// Absolute URL, compared verbatim against `fullUrl`
    Absolute(&'a str),
}

static RELATIVE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z][A-Za-z]+)/([A-Za-z0-9\-\.]{1,64})(/_history/[A-Za-z0-9\-\.]{1,64})?$")
        .expect("static relative reference pattern")
});

static ABSOLUTE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+\-.]*://[^\s]+$").expect("static absolute url pattern")
});

impl<'a> ReferenceForm<'a> {
    /// Classify a reference string, trying urn:uuid, relative, then absolute
    ///
    /// Any non-empty `urn:uuid:` suffix is accepted so that bundles with
    /// informal fullUrls still resolve; the strict UUID shape is a grammar
    /// concern.
    pub fn classify(reference: &'a str) -> Option<Self> {
        if let Some(rest) = reference.strip_prefix("urn:uuid:") {
            return (!rest.is_empty() && !rest.contains(char::is_whitespace))
                .then_some(ReferenceForm::UrnUuid(reference));
        }
        if let Some(caps) = RELATIVE_REFERENCE.captures(reference) {
            let resource_type = caps.get(1)?.as_str();
            let id = caps.get(2)?.as_str();
            return Some(ReferenceForm::Relative { resource_type, id });
        }
        if ABSOLUTE_URL.is_match(reference) {
            return Some(ReferenceForm::Absolute(reference));
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ResolutionKey {
    ResourceType(String, ResolutionPolicy),
    Reference(String, ResolutionPolicy),
}

/// Resolver over one run's [`EntryIndexMap`]
///
/// Owns the index and memoizes scan results for the lifetime of the run.
#[derive(Debug)]
pub struct EntryResolver {
    index: EntryIndexMap,
    memo: DashMap<ResolutionKey, Result<usize, ResolutionError>>,
}

impl EntryResolver {
    /// Create a resolver around an index built for this run
    pub fn new(index: EntryIndexMap) -> Self {
        Self {
            index,
            memo: DashMap::new(),
        }
    }

    /// The underlying index
    pub fn index(&self) -> &EntryIndexMap {
        &self.index
    }

    /// Number of memoized scans
    pub fn memoized(&self) -> usize {
        self.memo.len()
    }

    /// Resolve a resource-type token to an entry index
    pub fn resolve_resource_type(
        &self,
        resource_type: &str,
        policy: ResolutionPolicy,
        explicit: Option<usize>,
    ) -> Result<usize, ResolutionError> {
        if let Some(index) = explicit {
            return self.check_explicit(index);
        }
        if !self.index.is_bundle() {
            return Err(ResolutionError::NotABundle);
        }
        let key = ResolutionKey::ResourceType(resource_type.to_string(), policy);
        self.memoize(key, || {
            apply_policy(
                resource_type,
                self.index.by_resource_type(resource_type),
                policy,
            )
        })
    }

    /// Resolve a reference string to an entry index
    pub fn resolve_reference(
        &self,
        reference: &str,
        policy: ResolutionPolicy,
        explicit: Option<usize>,
    ) -> Result<usize, ResolutionError> {
        if let Some(index) = explicit {
            return self.check_explicit(index);
        }
        if !self.index.is_bundle() {
            return Err(ResolutionError::NotABundle);
        }
        let key = ResolutionKey::Reference(reference.to_string(), policy);
        self.memoize(key, || {
            let candidates = match ReferenceForm::classify(reference) {
                Some(ReferenceForm::UrnUuid(urn)) => self.index.by_full_url(urn),
                Some(ReferenceForm::Relative { resource_type, id }) => {
                    self.index.by_type_and_id(resource_type, id)
                }
                Some(ReferenceForm::Absolute(url)) => self.index.by_full_url(url),
                None => {
                    return Err(ResolutionError::UnsupportedReference {
                        reference: reference.to_string(),
                    });
                }
            };
            apply_policy(reference, candidates, policy)
        })
    }

    fn check_explicit(&self, index: usize) -> Result<usize, ResolutionError> {
        let entry_count = self.index.entry_count();
        if index < entry_count {
            Ok(index)
        } else {
            Err(ResolutionError::IndexOutOfRange { index, entry_count })
        }
    }

    fn memoize<F>(&self, key: ResolutionKey, scan: F) -> Result<usize, ResolutionError>
    where
        F: FnOnce() -> Result<usize, ResolutionError>,
    {
        if let Some(hit) = self.memo.get(&key) {
            return hit.value().clone();
        }
        let outcome = scan();
        match &outcome {
            Ok(index) => log::debug!("resolved {key:?} to entry {index}"),
            Err(err) => log::debug!("could not resolve {key:?}: {err}"),
        }
        self.memo.insert(key, outcome.clone());
        outcome
    }
}

fn apply_policy(
    target: &str,
    candidates: &[usize],
    policy: ResolutionPolicy,
) -> Result<usize, ResolutionError> {
    match (candidates, policy) {
        ([], _) => Err(ResolutionError::NotFound {
            target: target.to_string(),
        }),
        ([only], _) => Ok(*only),
        ([first, ..], ResolutionPolicy::FirstMatch) => Ok(*first),
        (many, ResolutionPolicy::ErrorIfMultiple) => Err(ResolutionError::Ambiguous {
            target: target.to_string(),
            candidates: many.to_vec(),
        }),
    }
}
