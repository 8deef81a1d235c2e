// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
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

//! Issuance policy configuration.
//!
//! This module defines the TOML schema for decoder options and the ordered
//! list of policy rules:
//!
//! ```toml
//! [request]
//! enforce_pop = true
//! verify_signature = true
//!
//! [logging]
//! level = "info"
//!
//! [[policy]]
//! name = "server-key-usage"
//! default = "key_usage_extension"
//! constraint = "key_usage"
//!
//! [policy.params]
//! keyUsageCritical = "true"
//! keyUsageDigitalSignature = "true"
//! keyUsageKeyCertSign = "false"
//! ```
//!
//! Rules are validated in file order.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constraint::{
    Constraint, ConstraintChain, ConstraintInstance, ConstraintKind, ConstraintParams,
    DefaultPolicyKind, PolicyRule,
};
use crate::decode::RequestParams;
use crate::error::{IssuanceError, Result};
use crate::logging::LoggingConfig;

/// Complete issuance configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssuanceConfig {
    /// Decoder options.
    #[serde(default)]
    pub request: RequestConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Ordered policy rules.
    #[serde(default, rename = "policy")]
    pub policies: Vec<PolicyConfig>,
}

/// `[request]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestConfig {
    /// Reject CRMF messages without proof of possession.
    #[serde(default = "default_true")]
    pub enforce_pop: bool,

    /// Verify PKCS#10 and KEYGEN self-signatures.
    #[serde(default = "default_true")]
    pub verify_signature: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            enforce_pop: true,
            verify_signature: true,
        }
    }
}

/// One `[[policy]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Unique rule name.
    pub name: String,

    /// Default-generation policy the constraint is paired with.
    #[serde(default = "default_policy")]
    pub default: DefaultPolicyKind,

    /// Constraint kind.
    pub constraint: ConstraintKind,

    /// Constraint parameters; `-` or empty means "no check".
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl PolicyConfig {
    /// Build the policy rule, rejecting parameters the constraint does not read.
    pub fn to_rule(&self) -> Result<PolicyRule> {
        let known = Constraint::config_names(self.constraint);
        if let Some(unknown) = self.params.keys().find(|k| !known.contains(&k.as_str())) {
            return Err(IssuanceError::config(format!(
                "policy '{}': constraint {} has no parameter {}",
                self.name, self.constraint, unknown
            )));
        }

        let params: ConstraintParams = self
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let instance = ConstraintInstance::new(self.name.clone(), self.constraint, params)?;
        Ok(PolicyRule::new(self.default, instance))
    }
}

fn default_true() -> bool {
    true
}

fn default_policy() -> DefaultPolicyKind {
    DefaultPolicyKind::NoDefault
}

impl IssuanceConfig {
    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or missing required fields.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| IssuanceError::config(format!("Invalid TOML: {e}")))
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            IssuanceError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "Loaded issuance configuration");
        Self::from_toml(&contents)
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| IssuanceError::config(format!("TOML serialize: {e}")))
    }

    /// Validate the configuration for completeness and consistency.
    ///
    /// # Errors
    ///
    /// Returns one error listing every problem found.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.logging.log_level() {
            errors.push(format!("logging.level: {e}"));
        }

        let mut names = HashSet::new();
        for policy in &self.policies {
            if policy.name.trim().is_empty() {
                errors.push("policy.name must not be empty".to_string());
            } else if !names.insert(policy.name.as_str()) {
                errors.push(format!("policy '{}' is defined more than once", policy.name));
            }
            if let Err(e) = policy.to_rule() {
                errors.push(e.to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(IssuanceError::config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }

    /// Decoder options for [`RequestDecoder::decode`](crate::decode::RequestDecoder::decode).
    pub fn request_params(&self) -> RequestParams {
        RequestParams {
            enforce_pop: self.request.enforce_pop,
            verify_signature: self.request.verify_signature,
            ..Default::default()
        }
    }

    /// Build the constraint chain; inapplicable rules are skipped.
    pub fn build_chain(&self) -> Result<ConstraintChain> {
        let rules = self
            .policies
            .iter()
            .map(PolicyConfig::to_rule)
            .collect::<Result<Vec<_>>>()?;
        Ok(ConstraintChain::new(rules))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[request]
enforce_pop = false

[[policy]]
name = "ku"
default = "key_usage_extension"
constraint = "key_usage"

[policy.params]
keyUsageCritical = "true"
keyUsageDigitalSignature = "true"

[[policy]]
name = "validity"
default = "subject_name"
constraint = "validity"
"#;

    #[test]
    fn test_parse_sample() {
        let config = IssuanceConfig::from_toml(SAMPLE).unwrap();
        assert!(!config.request.enforce_pop);
        assert!(config.request.verify_signature);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.policies.len(), 2);
        assert_eq!(config.policies[0].constraint, ConstraintKind::KeyUsage);
        assert_eq!(
            config.policies[0].params.get("keyUsageCritical").map(String::as_str),
            Some("true")
        );

        let params = config.request_params();
        assert!(!params.enforce_pop);
        assert!(params.verify_signature);
    }

    #[test]
    fn test_build_chain_skips_inapplicable() {
        let config = IssuanceConfig::from_toml(SAMPLE).unwrap();
        assert!(config.validate().is_ok());

        let chain = config.build_chain().unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.skipped().len(), 1);
    }

    #[test]
    fn test_default_policy_is_no_default() {
        let config = IssuanceConfig::from_toml(
            "[[policy]]\nname = \"v\"\nconstraint = \"validity\"\n",
        )
        .unwrap();
        assert_eq!(config.policies[0].default, DefaultPolicyKind::NoDefault);
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let toml = r#"
[logging]
level = "chatty"

[[policy]]
name = "bc"
constraint = "basic_constraints"
[policy.params]
basicConstraintsMinPathLen = "5"
basicConstraintsMaxPathLen = "1"

[[policy]]
name = "bc"
constraint = "key_usage"
[policy.params]
keyUsageBogus = "true"
"#;
        let config = IssuanceConfig::from_toml(toml).unwrap();
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("logging.level"));
        assert!(message.contains("basicConstraintsMinPathLen"));
        assert!(message.contains("defined more than once"));
        assert!(message.contains("keyUsageBogus"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(IssuanceConfig::from_toml("[request]\nenforce_popp = true\n").is_err());
        assert!(IssuanceConfig::from_toml(
            "[[policy]]\nname = \"x\"\nconstraint = \"no_such_constraint\"\n"
        )
        .is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = IssuanceConfig::from_toml(SAMPLE).unwrap();
        let text = config.to_toml().unwrap();
        assert_eq!(IssuanceConfig::from_toml(&text).unwrap(), config);
    }
}
