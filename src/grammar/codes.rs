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

//! Structural error vocabulary

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes raised by the grammar validator, always at error severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StructuralCode {
    /// `id` outside `[A-Za-z0-9.-]{1,64}`
    FhirInvalidIdFormat,
    /// Line break inside a string field
    FhirInvalidStringNewline,
    /// Whitespace or control characters inside a code
    FhirInvalidCodeLiteral,
    /// Zero or several variants of a value choice group
    FhirMultipleValueX,
    /// Reference string in none of the accepted forms
    FhirInvalidReferenceFormat,
    /// Reference with both or neither of `reference` and `identifier`
    FhirReferenceInvalidCombination,
    /// Extension without a `url`
    FhirExtensionMissingUrl,
    /// Extension with both or neither of a value and nested extensions
    FhirExtensionInvalidShape,
    /// Malformed URI
    FhirInvalidUri,
    /// URL that is not absolute
    FhirInvalidUrl,
    /// Canonical that is not absolute or has a bad version suffix
    FhirInvalidCanonical,
}

impl StructuralCode {
    /// Every code, in declaration order
    pub const ALL: [StructuralCode; 11] = [
        StructuralCode::FhirInvalidIdFormat,
        StructuralCode::FhirInvalidStringNewline,
        StructuralCode::FhirInvalidCodeLiteral,
        StructuralCode::FhirMultipleValueX,
        StructuralCode::FhirInvalidReferenceFormat,
        StructuralCode::FhirReferenceInvalidCombination,
        StructuralCode::FhirExtensionMissingUrl,
        StructuralCode::FhirExtensionInvalidShape,
        StructuralCode::FhirInvalidUri,
        StructuralCode::FhirInvalidUrl,
        StructuralCode::FhirInvalidCanonical,
    ];

    /// Wire form of the code
    pub const fn as_str(self) -> &'static str {
        match self {
            StructuralCode::FhirInvalidIdFormat => "FHIR_INVALID_ID_FORMAT",
            StructuralCode::FhirInvalidStringNewline => "FHIR_INVALID_STRING_NEWLINE",
            StructuralCode::FhirInvalidCodeLiteral => "FHIR_INVALID_CODE_LITERAL",
            StructuralCode::FhirMultipleValueX => "FHIR_MULTIPLE_VALUE_X",
            StructuralCode::FhirInvalidReferenceFormat => "FHIR_INVALID_REFERENCE_FORMAT",
            StructuralCode::FhirReferenceInvalidCombination => "FHIR_REFERENCE_INVALID_COMBINATION",
            StructuralCode::FhirExtensionMissingUrl => "FHIR_EXTENSION_MISSING_URL",
            StructuralCode::FhirExtensionInvalidShape => "FHIR_EXTENSION_INVALID_SHAPE",
            StructuralCode::FhirInvalidUri => "FHIR_INVALID_URI",
            StructuralCode::FhirInvalidUrl => "FHIR_INVALID_URL",
            StructuralCode::FhirInvalidCanonical => "FHIR_INVALID_CANONICAL",
        }
    }
}

impl fmt::Display for StructuralCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
