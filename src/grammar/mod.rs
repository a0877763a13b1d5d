// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Schema-free structural checks on the raw JSON tree
//!
//! Fields are classified by name through [`GrammarConfig`], so the checks
//! need no profile or resource definition. Every finding is an
//! error-severity [`ValidationError`] with a dotted `rawPath` and the exact
//! JSON pointer of the offending node.

pub mod codes;
pub mod rules;

pub use codes::StructuralCode;

use crate::diagnostics::ValidationError;
use crate::navigator::{JsonPointer, PointerSegment};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// FHIR data type names that complete a choice element (`value` + `String`)
pub const CHOICE_TYPE_SUFFIXES: &[&str] = &[
    "Base64Binary", "Boolean", "Canonical", "Code", "Date", "DateTime", "Decimal", "Id",
    "Instant", "Integer", "Integer64", "Markdown", "Oid", "PositiveInt", "String", "Time",
    "UnsignedInt", "Uri", "Url", "Uuid", "Address", "Age", "Annotation", "Attachment",
    "CodeableConcept", "CodeableReference", "Coding", "ContactPoint", "Count", "Distance",
    "Duration", "HumanName", "Identifier", "Money", "Period", "Quantity", "Range", "Ratio",
    "RatioRange", "Reference", "SampledData", "Signature", "Timing", "ContactDetail",
    "DataRequirement", "Expression", "ParameterDefinition", "RelatedArtifact",
    "TriggerDefinition", "UsageContext", "Availability", "ExtendedContactDetail", "Dosage",
    "Meta",
];

/// Parent element in which a choice group must have a variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredChoice {
    /// Key of the parent element (`answerOption`)
    pub parent: String,
    /// Choice prefix (`value`)
    pub prefix: String,
}

impl RequiredChoice {
    fn new(parent: &str, prefix: &str) -> Self {
        Self {
            parent: parent.to_string(),
            prefix: prefix.to_string(),
        }
    }
}

/// Field-name tables driving primitive classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GrammarConfig {
    /// Fields holding an `id`
    pub id_fields: Vec<String>,
    /// Fields holding a single-line `string`
    pub string_fields: Vec<String>,
    /// Fields holding a `code`
    pub code_fields: Vec<String>,
    /// Fields holding a `uri`
    pub uri_fields: Vec<String>,
    /// Fields holding an absolute `url`
    pub url_fields: Vec<String>,
    /// Fields holding a `canonical`
    pub canonical_fields: Vec<String>,
    /// Fields whose object values are References
    pub reference_fields: Vec<String>,
    /// Keys holding extension lists
    pub extension_fields: Vec<String>,
    /// Prefixes of choice elements
    pub choice_prefixes: Vec<String>,
    /// Parents where a choice group may not be empty
    pub required_choice_groups: Vec<RequiredChoice>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for GrammarConfig {
    fn default() -> Self {
        Self {
            id_fields: strings(&["id"]),
            string_fields: strings(&[
                "display", "title", "family", "given", "prefix", "suffix", "linkId", "alias",
                "version", "name",
            ]),
            code_fields: strings(&[
                "code", "status", "gender", "language", "use", "mode", "intent", "priority",
                "kind", "method",
            ]),
            uri_fields: strings(&[
                "system", "url", "fullUrl", "implicitRules", "source", "namespace",
            ]),
            url_fields: strings(&["address"]),
            canonical_fields: strings(&[
                "profile", "answerValueSet", "instantiatesCanonical", "derivedFrom",
                "targetProfile", "questionnaire", "valueSet",
            ]),
            reference_fields: strings(&[
                "subject", "patient", "encounter", "performer", "author", "requester",
                "basedOn", "partOf", "focus", "hasMember", "specimen", "organization",
                "managingOrganization", "generalPractitioner",
            ]),
            extension_fields: strings(&["extension", "modifierExtension"]),
            choice_prefixes: strings(&[
                "value", "answer", "effective", "onset", "abatement", "deceased",
                "multipleBirth", "occurrence", "defaultValue", "initial", "fixed", "pattern",
                "medication", "serviced", "born", "age", "timing", "performed",
            ]),
            required_choice_groups: vec![
                RequiredChoice::new("answerOption", "value"),
                RequiredChoice::new("useContext", "value"),
                RequiredChoice::new("enableWhen", "answer"),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Id,
    String,
    Code,
    Uri,
    Url,
    Canonical,
}

/// Grammar validator built from a [`GrammarConfig`]
#[derive(Debug, Clone)]
pub struct GrammarValidator {
    id_fields: FxHashSet<String>,
    string_fields: FxHashSet<String>,
    code_fields: FxHashSet<String>,
    uri_fields: FxHashSet<String>,
    url_fields: FxHashSet<String>,
    canonical_fields: FxHashSet<String>,
    reference_fields: FxHashSet<String>,
    extension_fields: FxHashSet<String>,
    choice_prefixes: Vec<String>,
    required_choice_groups: Vec<RequiredChoice>,
}

impl Default for GrammarValidator {
    fn default() -> Self {
        Self::new(&GrammarConfig::default())
    }
}

fn set(items: &[String]) -> FxHashSet<String> {
    items.iter().cloned().collect()
}

/// Walk state: where we are and which resource encloses it
struct Walk<'v> {
    pointer: JsonPointer,
    resource_types: Vec<&'v str>,
    root_type: Option<&'v str>,
    root_is_bundle: bool,
    errors: Vec<ValidationError>,
}

impl GrammarValidator {
    /// Build the lookup tables
    pub fn new(config: &GrammarConfig) -> Self {
        let mut choice_prefixes = config.choice_prefixes.clone();
        // Longest first so `multipleBirth` is tried before shorter prefixes
        choice_prefixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Self {
            id_fields: set(&config.id_fields),
            string_fields: set(&config.string_fields),
            code_fields: set(&config.code_fields),
            uri_fields: set(&config.uri_fields),
            url_fields: set(&config.url_fields),
            canonical_fields: set(&config.canonical_fields),
            reference_fields: set(&config.reference_fields),
            extension_fields: set(&config.extension_fields),
            choice_prefixes,
            required_choice_groups: config.required_choice_groups.clone(),
        }
    }

    /// Check the whole tree; findings come out in key order, depth first
    pub fn validate(&self, tree: &Value) -> Vec<ValidationError> {
        let root_type = tree.get("resourceType").and_then(Value::as_str);
        let mut walk = Walk {
            pointer: JsonPointer::root(),
            resource_types: Vec::new(),
            root_type,
            root_is_bundle: root_type == Some("Bundle"),
            errors: Vec::new(),
        };
        if let Value::Object(object) = tree {
            self.visit_object(object, None, &mut walk);
        }
        log::debug!("grammar check produced {} error(s)", walk.errors.len());
        walk.errors
    }

    /// Split `valueString` into (`value`, `String`) when it is a choice key
    fn choice_of<'k>(&self, key: &'k str) -> Option<(&'k str, &'k str)> {
        self.choice_prefixes.iter().find_map(|prefix| {
            let suffix = key.strip_prefix(prefix.as_str())?;
            CHOICE_TYPE_SUFFIXES
                .contains(&suffix)
                .then(|| key.split_at(prefix.len()))
        })
    }

    fn classify(&self, key: &str) -> Option<FieldKind> {
        if self.id_fields.contains(key) {
            return Some(FieldKind::Id);
        }
        if let Some((_, suffix)) = self.choice_of(key) {
            return match suffix {
                "String" => Some(FieldKind::String),
                "Code" => Some(FieldKind::Code),
                "Uri" => Some(FieldKind::Uri),
                "Url" => Some(FieldKind::Url),
                "Canonical" => Some(FieldKind::Canonical),
                "Id" => Some(FieldKind::Id),
                _ => None,
            };
        }
        if self.canonical_fields.contains(key) {
            Some(FieldKind::Canonical)
        } else if self.url_fields.contains(key) {
            Some(FieldKind::Url)
        } else if self.uri_fields.contains(key) {
            Some(FieldKind::Uri)
        } else if self.code_fields.contains(key) {
            Some(FieldKind::Code)
        } else if self.string_fields.contains(key) {
            Some(FieldKind::String)
        } else {
            None
        }
    }

    fn visit_object<'v>(&self, object: &'v Map<String, Value>, parent_key: Option<&str>, walk: &mut Walk<'v>) {
        let own_type = object.get("resourceType").and_then(Value::as_str);
        if let Some(own_type) = own_type {
            walk.resource_types.push(own_type);
        }

        self.check_choice_groups(object, parent_key, walk);
        if parent_key.is_some_and(|k| self.extension_fields.contains(k)) {
            self.check_extension(object, walk);
        }
        let is_reference = object.contains_key("reference")
            || (parent_key.is_some_and(|k| self.reference_fields.contains(k))
                && is_reference_shaped(object));
        if is_reference {
            self.check_reference(object, walk);
        }

        for (key, child) in object {
            if key == "resourceType" {
                continue;
            }
            walk.pointer.push_key(key.as_str());
            // `_field` siblings carry id/extension only; their keys are not typed values
            let kind = if key.starts_with('_') || (is_reference && key == "reference") {
                None
            } else if own_type.is_none() && self.id_fields.contains(key.as_str()) {
                // Element ids are plain strings; only resources carry a resource id
                Some(FieldKind::String)
            } else {
                self.classify(key)
            };
            match child {
                Value::Array(items) => {
                    for (i, item) in items.iter().enumerate() {
                        walk.pointer.push_index(i);
                        self.visit_value(key, item, kind, walk);
                        walk.pointer.pop();
                    }
                }
                other => self.visit_value(key, other, kind, walk),
            }
            walk.pointer.pop();
        }

        if own_type.is_some() {
            walk.resource_types.pop();
        }
    }

    fn visit_value<'v>(&self, key: &str, value: &'v Value, kind: Option<FieldKind>, walk: &mut Walk<'v>) {
        match value {
            Value::Object(object) => self.visit_object(object, Some(key), walk),
            Value::String(text) => {
                if let Some(kind) = kind {
                    self.check_primitive(key, text, kind, walk);
                }
            }
            Value::Number(n) if kind == Some(FieldKind::Id) => {
                self.report(
                    walk,
                    StructuralCode::FhirInvalidIdFormat,
                    format!("Field '{key}' must be a string id, found number {n}"),
                    |e| e.with_detail("value", n.to_string()),
                );
            }
            _ => {}
        }
    }

    fn check_primitive(&self, key: &str, text: &str, kind: FieldKind, walk: &mut Walk<'_>) {
        let (ok, code, expectation) = match kind {
            FieldKind::Id => (
                rules::is_valid_id(text),
                StructuralCode::FhirInvalidIdFormat,
                "an id matching [A-Za-z0-9.-]{1,64}",
            ),
            FieldKind::String => (
                rules::is_single_line(text),
                StructuralCode::FhirInvalidStringNewline,
                "a string without line breaks",
            ),
            FieldKind::Code => (
                rules::is_valid_code(text),
                StructuralCode::FhirInvalidCodeLiteral,
                "a code without whitespace or control characters",
            ),
            FieldKind::Uri => (
                rules::is_valid_uri(text),
                StructuralCode::FhirInvalidUri,
                "a valid URI",
            ),
            FieldKind::Url => (
                rules::is_valid_url(text),
                StructuralCode::FhirInvalidUrl,
                "an absolute URL",
            ),
            FieldKind::Canonical => (
                rules::is_valid_canonical(text),
                StructuralCode::FhirInvalidCanonical,
                "an absolute canonical URL with an optional |version",
            ),
        };
        if !ok {
            self.report(
                walk,
                code,
                format!("Field '{key}' must be {expectation}"),
                |e| e.with_detail("value", text),
            );
        }
    }

    fn check_choice_groups(&self, object: &Map<String, Value>, parent_key: Option<&str>, walk: &mut Walk<'_>) {
        let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
        for key in object.keys() {
            if key.starts_with('_') || object.get(key).is_some_and(Value::is_null) {
                continue;
            }
            if let Some((prefix, _)) = self.choice_of(key) {
                match groups.iter_mut().find(|(p, _)| *p == prefix) {
                    Some((_, variants)) => variants.push(key.as_str()),
                    None => groups.push((prefix, vec![key.as_str()])),
                }
            }
        }

        for (prefix, variants) in &groups {
            if variants.len() > 1 {
                self.report(
                    walk,
                    StructuralCode::FhirMultipleValueX,
                    format!("Choice element '{prefix}[x]' has {} variants: {}", variants.len(), variants.join(", ")),
                    |e| {
                        e.with_detail("choice", format!("{prefix}[x]"))
                            .with_detail("variants", variants.clone())
                            .with_detail("count", variants.len())
                    },
                );
            }
        }

        let Some(parent) = parent_key else { return };
        for required in self.required_choice_groups.iter().filter(|r| r.parent == parent) {
            if !groups.iter().any(|(p, _)| *p == required.prefix) {
                self.report(
                    walk,
                    StructuralCode::FhirMultipleValueX,
                    format!("Choice element '{}[x]' in '{parent}' has no variant", required.prefix),
                    |e| {
                        e.with_detail("choice", format!("{}[x]", required.prefix))
                            .with_detail("variants", Vec::<String>::new())
                            .with_detail("count", 0)
                    },
                );
            }
        }
    }

    fn check_extension(&self, object: &Map<String, Value>, walk: &mut Walk<'_>) {
        let url = object.get("url").and_then(Value::as_str).unwrap_or_default();
        if url.is_empty() {
            self.report(
                walk,
                StructuralCode::FhirExtensionMissingUrl,
                "Extension has no url",
                |e| e,
            );
        }
        let has_value = object
            .iter()
            .any(|(k, v)| !v.is_null() && self.choice_of(k).is_some_and(|(p, _)| p == "value"));
        let has_nested = object
            .get("extension")
            .and_then(Value::as_array)
            .is_some_and(|items| !items.is_empty());
        if has_value == has_nested {
            let message = if has_value {
                "Extension has both a value and nested extensions"
            } else {
                "Extension has neither a value nor nested extensions"
            };
            self.report(
                walk,
                StructuralCode::FhirExtensionInvalidShape,
                message,
                |e| e.with_detail("url", url),
            );
        }
    }

    fn check_reference(&self, object: &Map<String, Value>, walk: &mut Walk<'_>) {
        let reference = object.get("reference").filter(|v| !v.is_null());
        let identifier = object.get("identifier").filter(|v| !v.is_null());
        if reference.is_some() == identifier.is_some() {
            let message = if reference.is_some() {
                "Reference has both 'reference' and 'identifier'"
            } else {
                "Reference has neither 'reference' nor 'identifier'"
            };
            self.report(
                walk,
                StructuralCode::FhirReferenceInvalidCombination,
                message,
                |e| e,
            );
        }
        if let Some(reference) = reference {
            let valid = reference.as_str().is_some_and(rules::is_valid_reference);
            if !valid {
                walk.pointer.push_key("reference");
                self.report(
                    walk,
                    StructuralCode::FhirInvalidReferenceFormat,
                    "Reference must be urn:uuid:<uuid>, <ResourceType>/<id> or an absolute URL",
                    |e| e.with_detail("value", reference.clone()),
                );
                walk.pointer.pop();
            }
        }
    }

    fn report<F>(&self, walk: &mut Walk<'_>, code: StructuralCode, message: impl Into<String>, decorate: F)
    where
        F: FnOnce(ValidationError) -> ValidationError,
    {
        let mut error = ValidationError::structural(code, message)
            .with_path(dotted_path(&walk.pointer, walk.root_is_bundle, walk.root_type))
            .with_pointer_hint(walk.pointer.to_string());
        error.resource_type = walk.resource_types.last().map(|t| t.to_string());
        walk.errors.push(decorate(error));
    }
}

/// Keys a Reference may carry; anything else is a backbone element
const REFERENCE_KEYS: [&str; 6] = ["reference", "identifier", "type", "display", "id", "extension"];

fn is_reference_shaped(object: &Map<String, Value>) -> bool {
    object
        .keys()
        .all(|key| REFERENCE_KEYS.contains(&key.strip_prefix('_').unwrap_or(key)))
}

/// Dotted path for a pointer, e.g. `Bundle.entry[1].resource.component[0].valueString`
pub fn dotted_path(pointer: &JsonPointer, root_is_bundle: bool, root_type: Option<&str>) -> String {
    let mut out = String::new();
    if root_is_bundle {
        out.push_str("Bundle");
    } else if let Some(root_type) = root_type {
        out.push_str(root_type);
    }
    for segment in pointer.segments() {
        match segment {
            PointerSegment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            PointerSegment::Index(n) => out.push_str(&format!("[{n}]")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn codes(tree: &Value) -> Vec<String> {
        GrammarValidator::default()
            .validate(tree)
            .into_iter()
            .map(|e| e.error_code)
            .collect()
    }

    #[test]
    fn test_invalid_id_is_the_only_finding() {
        let tree = json!({"resourceType": "Patient", "id": "abc_def!"});
        let errors = GrammarValidator::default().validate(&tree);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_code, "FHIR_INVALID_ID_FORMAT");
        assert_eq!(errors[0].raw_path, "Patient.id");
        assert_eq!(errors[0].pointer_hint.as_deref(), Some("/id"));
        assert_eq!(errors[0].resource_type.as_deref(), Some("Patient"));
    }

    #[test]
    fn test_two_value_variants() {
        let tree = json!({
            "resourceType": "Observation",
            "id": "o1",
            "component": [{"valueString": "a", "valueInteger": 1}]
        });
        let errors = GrammarValidator::default().validate(&tree);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_code, "FHIR_MULTIPLE_VALUE_X");
        assert_eq!(errors[0].raw_path, "Observation.component[0]");
        assert_eq!(errors[0].details["count"], json!(2));
    }

    #[test]
    fn test_required_choice_group_without_variant() {
        let tree = json!({
            "resourceType": "Questionnaire",
            "item": [{"linkId": "q1", "answerOption": [{"valueCoding": {"code": "a"}}, {}]}]
        });
        let errors = GrammarValidator::default().validate(&tree);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].pointer_hint.as_deref(), Some("/item/0/answerOption/1"));
        assert_eq!(errors[0].details["count"], json!(0));
    }

    #[test]
    fn test_empty_uri_is_valid() {
        let tree = json!({"resourceType": "Basic", "id": "b", "implicitRules": "", "meta": {"source": "#local"}});
        assert!(codes(&tree).is_empty());
        let tree = json!({"resourceType": "Coding", "system": ""});
        assert!(codes(&tree).is_empty());
    }

    #[test]
    fn test_newline_and_code_checks() {
        let tree = json!({
            "resourceType": "Observation",
            "status": "final draft",
            "code": {"coding": [{"system": "http://loinc.org", "code": "1234-5", "display": "line\nbreak"}]}
        });
        assert_eq!(
            codes(&tree),
            vec!["FHIR_INVALID_STRING_NEWLINE", "FHIR_INVALID_CODE_LITERAL"]
        );
    }

    #[test]
    fn test_reference_checks() {
        let tree = json!({
            "resourceType": "Observation",
            "subject": {"reference": "not a reference"},
            "performer": [{"reference": "Practitioner/1", "identifier": {"value": "x"}}],
            "encounter": {"display": "visit"}
        });
        assert_eq!(
            codes(&tree),
            vec![
                "FHIR_REFERENCE_INVALID_COMBINATION",
                "FHIR_REFERENCE_INVALID_COMBINATION",
                "FHIR_INVALID_REFERENCE_FORMAT",
            ]
        );
    }

    #[test]
    fn test_backbone_under_reference_name() {
        let tree = json!({
            "resourceType": "Procedure",
            "id": "p1",
            "status": "completed",
            "subject": {"reference": "Patient/1"},
            "performer": [{"function": {"text": "surgeon"}, "actor": {"reference": "Practitioner/1"}}]
        });
        assert_eq!(codes(&tree), Vec::<String>::new());

        let tree = json!({
            "resourceType": "Procedure",
            "performer": [{"actor": {"reference": "Practitioner 1"}}]
        });
        assert_eq!(codes(&tree), vec!["FHIR_INVALID_REFERENCE_FORMAT"]);
    }

    #[test]
    fn test_element_id_is_a_string() {
        let tree = json!({
            "resourceType": "Questionnaire",
            "id": "q1",
            "item": [{"id": "item_1 (first)", "linkId": "1"}, {"id": 7, "linkId": "2"}]
        });
        assert_eq!(codes(&tree), Vec::<String>::new());

        let tree = json!({"resourceType": "Questionnaire", "item": [{"id": "a\nb", "linkId": "1"}]});
        assert_eq!(codes(&tree), vec!["FHIR_INVALID_STRING_NEWLINE"]);
    }

    #[test]
    fn test_extension_shapes() {
        let tree = json!({
            "resourceType": "Patient",
            "extension": [
                {"url": "http://x.org/a", "valueString": "ok"},
                {"valueString": "no url"},
                {"url": "http://x.org/b"},
                {"url": "http://x.org/c", "valueBoolean": true, "extension": [{"url": "d", "valueCode": "x"}]}
            ]
        });
        assert_eq!(
            codes(&tree),
            vec![
                "FHIR_EXTENSION_MISSING_URL",
                "FHIR_EXTENSION_INVALID_SHAPE",
                "FHIR_EXTENSION_INVALID_SHAPE",
            ]
        );
    }

    #[test]
    fn test_url_and_canonical_fields() {
        let tree = json!({
            "resourceType": "Questionnaire",
            "meta": {"profile": ["StructureDefinition/x"]},
            "item": [{"linkId": "1", "answerValueSet": "http://x.org/vs|1.0"}],
            "endpoint": {"address": "relative/only"}
        });
        assert_eq!(codes(&tree), vec!["FHIR_INVALID_URL", "FHIR_INVALID_CANONICAL"]);
    }

    #[test]
    fn test_bundle_paths_and_underscore_keys() {
        let tree = json!({
            "resourceType": "Bundle",
            "entry": [
                {"fullUrl": "urn:uuid:0b7c3e3a-53a4-4d6f-8b8a-2f6a8d3c1e10",
                 "resource": {"resourceType": "Patient", "id": "p!", "_gender": {"id": "two\nlines"}}}
            ]
        });
        let errors = GrammarValidator::default().validate(&tree);
        assert_eq!(errors.len(), 2);
        // Object keys iterate in sorted order, so `_gender` comes before `id`
        assert_eq!(errors[0].raw_path, "Bundle.entry[0].resource._gender.id");
        assert_eq!(errors[0].error_code, "FHIR_INVALID_STRING_NEWLINE");
        assert_eq!(errors[1].raw_path, "Bundle.entry[0].resource.id");
        assert_eq!(errors[0].resource_type.as_deref(), Some("Patient"));
    }

    #[test]
    fn test_validation_does_not_mutate() {
        let tree = json!({"resourceType": "Patient", "id": "abc_def!", "gender": "un known"});
        let before = tree.to_string();
        let _ = GrammarValidator::default().validate(&tree);
        assert_eq!(tree.to_string(), before);
    }
}
