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

//! Lexical checks for primitive values

use crate::bundle::ReferenceForm;
use once_cell::sync::Lazy;
use regex::Regex;

static ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9\-\.]{1,64}$").expect("static id pattern"));

static SCHEME_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+\-.]*:").expect("static scheme pattern"));

static URN_UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^urn:uuid:[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("static urn:uuid pattern")
});

/// RFC 3986 URI-reference characters: unreserved, sub-delims, gen-delims and percent escapes
static URI_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9\-._~!$&'()*+,;=:@/?#\[\]]|%[0-9A-Fa-f]{2})*$")
        .expect("static uri character pattern")
});

/// `[A-Za-z0-9.-]{1,64}`
pub fn is_valid_id(value: &str) -> bool {
    ID_PATTERN.is_match(value)
}

/// No `\n` or `\r`
pub fn is_single_line(value: &str) -> bool {
    !value.contains(['\n', '\r'])
}

/// Non-empty with no whitespace or control characters
pub fn is_valid_code(value: &str) -> bool {
    !value.is_empty() && !value.chars().any(|c| c.is_whitespace() || c.is_control())
}

/// RFC 3986 URI reference, relative or absolute; the empty string is valid
pub fn is_valid_uri(value: &str) -> bool {
    if !URI_CHARS.is_match(value) {
        return false;
    }
    if has_scheme(value) {
        return url::Url::parse(value).is_ok();
    }
    // A relative reference may not have ':' in its first segment
    let first_segment = value.split(['/', '?', '#']).next().unwrap_or_default();
    !first_segment.contains(':')
}

/// Absolute URI
pub fn is_valid_url(value: &str) -> bool {
    has_scheme(value) && is_valid_uri(value)
}

/// Absolute URI with an optional `|version` suffix
pub fn is_valid_canonical(value: &str) -> bool {
    match value.split_once('|') {
        Some((base, version)) => {
            is_valid_url(base)
                && !version.is_empty()
                && !version.contains('|')
                && !version.chars().any(|c| c.is_whitespace() || c.is_control())
        }
        None => is_valid_url(value),
    }
}

/// `urn:uuid:<uuid>`, `<ResourceType>/<id>` or an absolute URL
pub fn is_valid_reference(value: &str) -> bool {
    match ReferenceForm::classify(value) {
        Some(ReferenceForm::UrnUuid(urn)) => URN_UUID.is_match(urn),
        Some(ReferenceForm::Absolute(url)) => is_valid_url(url),
        Some(_) => true,
        None => false,
    }
}

fn has_scheme(value: &str) -> bool {
    SCHEME_PREFIX.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("abc-DEF.123", true)]
    #[case("abc_def!", false)]
    #[case("", false)]
    #[case(&"a".repeat(64), true)]
    #[case(&"a".repeat(65), false)]
    fn test_id(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(is_valid_id(value), expected);
    }

    #[rstest]
    #[case("final", true)]
    #[case("in progress", false)]
    #[case("tab\there", false)]
    #[case("", false)]
    fn test_code(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(is_valid_code(value), expected);
    }

    #[rstest]
    #[case("", true)]
    #[case("relative/path", true)]
    #[case("#frag", true)]
    #[case("http://loinc.org", true)]
    #[case("urn:oid:2.16.840.1.113883.6.1", true)]
    #[case("http://exa mple.org", false)]
    #[case("bad%zz", false)]
    #[case("a:b/c", true)]
    fn test_uri(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(is_valid_uri(value), expected);
    }

    #[test]
    fn test_url_and_canonical() {
        assert!(is_valid_url("https://example.org/fhir"));
        assert!(!is_valid_url("relative/path"));
        assert!(!is_valid_url(""));
        assert!(is_valid_canonical("http://hl7.org/fhir/StructureDefinition/Patient|4.0.1"));
        assert!(is_valid_canonical("http://hl7.org/fhir/ValueSet/x"));
        assert!(!is_valid_canonical("ValueSet/x"));
        assert!(!is_valid_canonical("http://hl7.org/fhir/ValueSet/x|"));
        assert!(!is_valid_canonical("http://a.org/x|1|2"));
    }

    #[test]
    fn test_reference_forms() {
        assert!(is_valid_reference("Patient/123"));
        assert!(is_valid_reference("urn:uuid:0b7c3e3a-53a4-4d6f-8b8a-2f6a8d3c1e10"));
        assert!(is_valid_reference("https://example.org/fhir/Patient/1"));
        assert!(!is_valid_reference("patient-123"));
        assert!(!is_valid_reference("Patient/"));
        assert!(!is_valid_reference("urn:uuid:patient-1"));
    }

    #[test]
    fn test_newline() {
        assert!(is_single_line("one line"));
        assert!(!is_single_line("two\nlines"));
        assert!(!is_single_line("cr\r"));
    }
}
