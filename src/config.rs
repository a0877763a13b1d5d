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

//! Validator configuration

use crate::bundle::ResolutionPolicy;
use crate::error::{Result, ValidatorError};
use crate::grammar::GrammarConfig;
use crate::parser::DEFAULT_PATH_CACHE_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings shared by every run of a [`Validator`](crate::Validator)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidatorConfig {
    /// Entry resolution policy for runs that do not choose one
    pub resolution_policy: ResolutionPolicy,
    /// Field-name tables for the grammar validator
    pub grammar: GrammarConfig,
    /// Maximum number of compiled paths kept in the path cache
    pub path_cache_capacity: usize,
    /// Whether errors get pointers and breadcrumbs
    pub enrich_navigation: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            resolution_policy: ResolutionPolicy::runtime(),
            grammar: GrammarConfig::default(),
            path_cache_capacity: DEFAULT_PATH_CACHE_CAPACITY,
            enrich_navigation: true,
        }
    }
}

impl ValidatorConfig {
    /// Configuration for rule authoring, where ambiguity must surface
    pub fn authoring() -> Self {
        Self::default().with_resolution_policy(ResolutionPolicy::authoring())
    }

    /// Set the resolution policy
    pub fn with_resolution_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.resolution_policy = policy;
        self
    }

    /// Set the grammar tables
    pub fn with_grammar(mut self, grammar: GrammarConfig) -> Self {
        self.grammar = grammar;
        self
    }

    /// Set the path cache capacity
    pub fn with_path_cache_capacity(mut self, capacity: usize) -> Self {
        self.path_cache_capacity = capacity;
        self
    }

    /// Enable or disable navigation enrichment
    pub fn with_navigation_enrichment(mut self, enabled: bool) -> Self {
        self.enrich_navigation = enabled;
        self
    }

    /// Read from JSON text; missing fields take their defaults
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ValidatorError::Config {
            message: e.to_string(),
        })
    }

    /// Read from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
