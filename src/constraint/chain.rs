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

//! Ordered constraint chain.
//!
//! Rules whose constraint does not apply to their default policy are
//! dropped once, when the chain is built. Validation runs the remaining
//! constraints in order and stops at the first rejection.

use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, info, warn};

use super::{ConstraintInstance, DefaultPolicyKind, ValidationContext};
use crate::error::Result;
use crate::identity::AuthenticatedIdentity;
use crate::repository::CertificateRepository;
use crate::template::CertificateTemplate;

/// A constraint paired with its default-generation policy.
#[derive(Debug, Clone)]
pub struct PolicyRule {
    /// Default-generation policy of the rule.
    pub default: DefaultPolicyKind,
    /// Constraint of the rule.
    pub constraint: ConstraintInstance,
}

impl PolicyRule {
    /// Pair a constraint with a default policy.
    pub fn new(default: DefaultPolicyKind, constraint: ConstraintInstance) -> Self {
        Self {
            default,
            constraint,
        }
    }

    /// Returns true if the constraint applies to the rule's default.
    pub fn is_applicable(&self) -> bool {
        self.constraint.is_applicable(self.default)
    }
}

/// Constraints consulted, in order, before a template may be issued.
#[derive(Clone, Default)]
pub struct ConstraintChain {
    rules: Vec<PolicyRule>,
    skipped: Vec<PolicyRule>,
    repository: Option<Arc<dyn CertificateRepository>>,
}

impl std::fmt::Debug for ConstraintChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintChain")
            .field("rules", &self.rules)
            .field("skipped", &self.skipped)
            .field("repository", &self.repository.is_some())
            .finish()
    }
}

impl ConstraintChain {
    /// Build a chain, dropping inapplicable rules.
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        let (rules, skipped): (Vec<_>, Vec<_>) =
            rules.into_iter().partition(PolicyRule::is_applicable);

        for rule in &skipped {
            warn!(
                constraint = rule.constraint.name(),
                kind = %rule.constraint.kind(),
                default = ?rule.default,
                "Constraint is not applicable to its default policy, skipping"
            );
        }
        info!(
            active = rules.len(),
            skipped = skipped.len(),
            "Built constraint chain"
        );

        Self {
            rules,
            skipped,
            repository: None,
        }
    }

    /// Attach the issued-certificate repository used by uniqueness checks.
    pub fn with_repository(mut self, repository: Arc<dyn CertificateRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Active rules, in validation order.
    pub fn iter(&self) -> impl Iterator<Item = &PolicyRule> {
        self.rules.iter()
    }

    /// Rules dropped as inapplicable.
    pub fn skipped(&self) -> &[PolicyRule] {
        &self.skipped
    }

    /// Number of active rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if no rule is active.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Validate a template against every active rule at the current time.
    ///
    /// May block while the repository is queried.
    pub fn validate(
        &self,
        template: &CertificateTemplate,
        identity: Option<&AuthenticatedIdentity>,
    ) -> Result<()> {
        self.validate_at(template, identity, SystemTime::now())
    }

    /// Validate a template with an explicit reference time.
    pub fn validate_at(
        &self,
        template: &CertificateTemplate,
        identity: Option<&AuthenticatedIdentity>,
        now: SystemTime,
    ) -> Result<()> {
        let ctx = ValidationContext {
            template,
            identity,
            repository: self.repository.as_deref(),
            now,
        };

        for rule in &self.rules {
            let name = rule.constraint.name();
            if let Err(e) = rule.constraint.validate(&ctx) {
                info!(constraint = name, error = %e, "Template rejected");
                return Err(e);
            }
            debug!(constraint = name, "Constraint passed");
        }

        info!(
            subject = %template.subject_string(),
            constraints = self.rules.len(),
            "Template accepted"
        );
        Ok(())
    }
}
