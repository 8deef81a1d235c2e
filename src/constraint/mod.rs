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

//! Issuance constraints.
//!
//! A constraint is a configurable, read-only check that may reject a
//! certificate template. Constraints are a closed set ([`ConstraintKind`]);
//! each kind has a typed configuration built from the string-keyed
//! [`ConstraintParams`] and re-built on every parameter edit.
//!
//! Every constraint is paired with a default-generation policy
//! ([`DefaultPolicyKind`]). [`is_applicable`] is the compatibility table
//! between the two; an incompatible pairing is skipped when the chain is
//! built.
//!
//! | Kind | Compatible defaults (besides `no_default`) |
//! |------|---------------------------------------------|
//! | `no_constraint` | all |
//! | `extension` | `user_extension`, `generic_extension` |
//! | `basic_constraints` | `user_extension`, `basic_constraints_extension` |
//! | `key_usage` | `user_extension`, `key_usage_extension` |
//! | `ns_cert_type` | `user_extension`, `ns_cert_type_extension` |
//! | `extended_key_usage` | `user_extension`, `extended_key_usage_extension` |
//! | `signing_algorithm` | `user_signing_algorithm`, `signing_algorithm` |
//! | `subject_name`, `unique_subject_name` | `user_subject_name`, `subject_name`, `auth_token_subject_name` |
//! | `validity` | `user_validity`, `validity` |
//! | `key` | `user_key` |

pub mod basic_constraints;
pub mod chain;
pub mod extended_key_usage;
pub mod extension;
pub mod key;
pub mod key_usage;
pub mod ns_cert_type;
pub mod params;
pub mod signing_algorithm;
pub mod subject_name;
pub mod unique_subject;
pub mod validity;

pub use basic_constraints::BasicConstraintsConstraint;
pub use chain::{ConstraintChain, PolicyRule};
pub use extended_key_usage::ExtendedKeyUsageConstraint;
pub use extension::ExtensionConstraint;
pub use key::KeyConstraint;
pub use key_usage::KeyUsageConstraint;
pub use ns_cert_type::NsCertTypeConstraint;
pub use params::ConstraintParams;
pub use signing_algorithm::SigningAlgorithmConstraint;
pub use subject_name::SubjectNameConstraint;
pub use unique_subject::UniqueSubjectNameConstraint;
pub use validity::ValidityConstraint;

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IssuanceError, Result};
use crate::identity::AuthenticatedIdentity;
use crate::repository::CertificateRepository;
use crate::template::CertificateTemplate;

/// Every constraint variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Accepts everything.
    NoConstraint,
    /// Presence and criticality of an arbitrary extension.
    Extension,
    /// Basic Constraints extension.
    BasicConstraints,
    /// Key Usage extension bits.
    KeyUsage,
    /// Netscape certificate type bits.
    NsCertType,
    /// Extended Key Usage allow-list.
    ExtendedKeyUsage,
    /// Signing algorithm allow-list.
    SigningAlgorithm,
    /// Subject pattern and attribute lengths.
    SubjectName,
    /// Subject uniqueness against issued certificates.
    UniqueSubjectName,
    /// Validity window.
    Validity,
    /// Public key type and size.
    Key,
}

impl ConstraintKind {
    /// Every kind, in declaration order.
    pub const ALL: [ConstraintKind; 11] = [
        Self::NoConstraint,
        Self::Extension,
        Self::BasicConstraints,
        Self::KeyUsage,
        Self::NsCertType,
        Self::ExtendedKeyUsage,
        Self::SigningAlgorithm,
        Self::SubjectName,
        Self::UniqueSubjectName,
        Self::Validity,
        Self::Key,
    ];

    /// Configuration key of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoConstraint => "no_constraint",
            Self::Extension => "extension",
            Self::BasicConstraints => "basic_constraints",
            Self::KeyUsage => "key_usage",
            Self::NsCertType => "ns_cert_type",
            Self::ExtendedKeyUsage => "extended_key_usage",
            Self::SigningAlgorithm => "signing_algorithm",
            Self::SubjectName => "subject_name",
            Self::UniqueSubjectName => "unique_subject_name",
            Self::Validity => "validity",
            Self::Key => "key",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Default-generation policy paired with a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum DefaultPolicyKind {
    NoDefault,
    UserExtension,
    UserSubjectName,
    UserValidity,
    UserKey,
    UserSigningAlgorithm,
    BasicConstraintsExtension,
    KeyUsageExtension,
    ExtendedKeyUsageExtension,
    NsCertTypeExtension,
    GenericExtension,
    SubjectName,
    AuthTokenSubjectName,
    Validity,
    SigningAlgorithm,
}

/// Applicability table: may `kind` be paired with `default`?
pub fn is_applicable(kind: ConstraintKind, default: DefaultPolicyKind) -> bool {
    use ConstraintKind as C;
    use DefaultPolicyKind as D;

    if kind == C::NoConstraint || default == D::NoDefault {
        return true;
    }

    matches!(
        (kind, default),
        (C::Extension, D::UserExtension | D::GenericExtension)
            | (C::BasicConstraints, D::UserExtension | D::BasicConstraintsExtension)
            | (C::KeyUsage, D::UserExtension | D::KeyUsageExtension)
            | (C::NsCertType, D::UserExtension | D::NsCertTypeExtension)
            | (C::ExtendedKeyUsage, D::UserExtension | D::ExtendedKeyUsageExtension)
            | (C::SigningAlgorithm, D::UserSigningAlgorithm | D::SigningAlgorithm)
            | (
                C::SubjectName | C::UniqueSubjectName,
                D::UserSubjectName | D::SubjectName | D::AuthTokenSubjectName
            )
            | (C::Validity, D::UserValidity | D::Validity)
            | (C::Key, D::UserKey)
    )
}

/// Everything a constraint may read while validating.
pub struct ValidationContext<'a> {
    /// Template under validation.
    pub template: &'a CertificateTemplate,
    /// Identity that authenticated the request, if any.
    pub identity: Option<&'a AuthenticatedIdentity>,
    /// Issued-certificate lookup, if configured.
    pub repository: Option<&'a dyn CertificateRepository>,
    /// Reference time for validity checks.
    pub now: SystemTime,
}

impl<'a> ValidationContext<'a> {
    /// Context with no identity, no repository and the current time.
    pub fn new(template: &'a CertificateTemplate) -> Self {
        Self {
            template,
            identity: None,
            repository: None,
            now: SystemTime::now(),
        }
    }
}

/// Behaviour shared by every constraint variant.
pub trait PolicyConstraint: Sized {
    /// Parameter names read by this constraint, in display order.
    const CONFIG_NAMES: &'static [&'static str];

    /// Build the typed configuration, checking every invariant.
    fn from_params(params: &ConstraintParams) -> Result<Self>;

    /// Check the template; `Err` is a rejection.
    fn validate(&self, ctx: &ValidationContext<'_>) -> Result<()>;

    /// English description of what the constraint enforces.
    fn describe(&self) -> String;
}

/// Typed configuration of one constraint, by kind.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum Constraint {
    NoConstraint,
    Extension(ExtensionConstraint),
    BasicConstraints(BasicConstraintsConstraint),
    KeyUsage(KeyUsageConstraint),
    NsCertType(NsCertTypeConstraint),
    ExtendedKeyUsage(ExtendedKeyUsageConstraint),
    SigningAlgorithm(SigningAlgorithmConstraint),
    SubjectName(SubjectNameConstraint),
    UniqueSubjectName(UniqueSubjectNameConstraint),
    Validity(ValidityConstraint),
    Key(KeyConstraint),
}

impl Constraint {
    /// Build the typed configuration for `kind`.
    pub fn build(kind: ConstraintKind, params: &ConstraintParams) -> Result<Self> {
        Ok(match kind {
            ConstraintKind::NoConstraint => Self::NoConstraint,
            ConstraintKind::Extension => Self::Extension(ExtensionConstraint::from_params(params)?),
            ConstraintKind::BasicConstraints => {
                Self::BasicConstraints(BasicConstraintsConstraint::from_params(params)?)
            }
            ConstraintKind::KeyUsage => Self::KeyUsage(KeyUsageConstraint::from_params(params)?),
            ConstraintKind::NsCertType => {
                Self::NsCertType(NsCertTypeConstraint::from_params(params)?)
            }
            ConstraintKind::ExtendedKeyUsage => {
                Self::ExtendedKeyUsage(ExtendedKeyUsageConstraint::from_params(params)?)
            }
            ConstraintKind::SigningAlgorithm => {
                Self::SigningAlgorithm(SigningAlgorithmConstraint::from_params(params)?)
            }
            ConstraintKind::SubjectName => {
                Self::SubjectName(SubjectNameConstraint::from_params(params)?)
            }
            ConstraintKind::UniqueSubjectName => {
                Self::UniqueSubjectName(UniqueSubjectNameConstraint::from_params(params)?)
            }
            ConstraintKind::Validity => Self::Validity(ValidityConstraint::from_params(params)?),
            ConstraintKind::Key => Self::Key(KeyConstraint::from_params(params)?),
        })
    }

    /// Kind of this constraint.
    pub fn kind(&self) -> ConstraintKind {
        match self {
            Self::NoConstraint => ConstraintKind::NoConstraint,
            Self::Extension(_) => ConstraintKind::Extension,
            Self::BasicConstraints(_) => ConstraintKind::BasicConstraints,
            Self::KeyUsage(_) => ConstraintKind::KeyUsage,
            Self::NsCertType(_) => ConstraintKind::NsCertType,
            Self::ExtendedKeyUsage(_) => ConstraintKind::ExtendedKeyUsage,
            Self::SigningAlgorithm(_) => ConstraintKind::SigningAlgorithm,
            Self::SubjectName(_) => ConstraintKind::SubjectName,
            Self::UniqueSubjectName(_) => ConstraintKind::UniqueSubjectName,
            Self::Validity(_) => ConstraintKind::Validity,
            Self::Key(_) => ConstraintKind::Key,
        }
    }

    /// Parameter names read by `kind`.
    pub fn config_names(kind: ConstraintKind) -> &'static [&'static str] {
        match kind {
            ConstraintKind::NoConstraint => &[],
            ConstraintKind::Extension => ExtensionConstraint::CONFIG_NAMES,
            ConstraintKind::BasicConstraints => BasicConstraintsConstraint::CONFIG_NAMES,
            ConstraintKind::KeyUsage => KeyUsageConstraint::CONFIG_NAMES,
            ConstraintKind::NsCertType => NsCertTypeConstraint::CONFIG_NAMES,
            ConstraintKind::ExtendedKeyUsage => ExtendedKeyUsageConstraint::CONFIG_NAMES,
            ConstraintKind::SigningAlgorithm => SigningAlgorithmConstraint::CONFIG_NAMES,
            ConstraintKind::SubjectName => SubjectNameConstraint::CONFIG_NAMES,
            ConstraintKind::UniqueSubjectName => UniqueSubjectNameConstraint::CONFIG_NAMES,
            ConstraintKind::Validity => ValidityConstraint::CONFIG_NAMES,
            ConstraintKind::Key => KeyConstraint::CONFIG_NAMES,
        }
    }

    /// Check the template.
    pub fn validate(&self, ctx: &ValidationContext<'_>) -> Result<()> {
        match self {
            Self::NoConstraint => Ok(()),
            Self::Extension(c) => c.validate(ctx),
            Self::BasicConstraints(c) => c.validate(ctx),
            Self::KeyUsage(c) => c.validate(ctx),
            Self::NsCertType(c) => c.validate(ctx),
            Self::ExtendedKeyUsage(c) => c.validate(ctx),
            Self::SigningAlgorithm(c) => c.validate(ctx),
            Self::SubjectName(c) => c.validate(ctx),
            Self::UniqueSubjectName(c) => c.validate(ctx),
            Self::Validity(c) => c.validate(ctx),
            Self::Key(c) => c.validate(ctx),
        }
    }

    /// English description.
    pub fn describe(&self) -> String {
        match self {
            Self::NoConstraint => "No constraint".to_string(),
            Self::Extension(c) => c.describe(),
            Self::BasicConstraints(c) => c.describe(),
            Self::KeyUsage(c) => c.describe(),
            Self::NsCertType(c) => c.describe(),
            Self::ExtendedKeyUsage(c) => c.describe(),
            Self::SigningAlgorithm(c) => c.describe(),
            Self::SubjectName(c) => c.describe(),
            Self::UniqueSubjectName(c) => c.describe(),
            Self::Validity(c) => c.describe(),
            Self::Key(c) => c.describe(),
        }
    }
}

/// A named constraint with its raw parameters and typed configuration.
#[derive(Debug, Clone)]
pub struct ConstraintInstance {
    name: String,
    params: ConstraintParams,
    constraint: Constraint,
}

impl ConstraintInstance {
    /// Build an instance, failing on any invalid parameter.
    pub fn new(
        name: impl Into<String>,
        kind: ConstraintKind,
        params: ConstraintParams,
    ) -> Result<Self> {
        let name = name.into();
        let constraint =
            Constraint::build(kind, &params).map_err(|e| with_constraint_name(&name, e))?;
        Ok(Self {
            name,
            params,
            constraint,
        })
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Constraint kind.
    pub fn kind(&self) -> ConstraintKind {
        self.constraint.kind()
    }

    /// Typed configuration.
    pub fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    /// Raw parameters.
    pub fn params(&self) -> &ConstraintParams {
        &self.params
    }

    /// Parameter names read by this instance.
    pub fn config_names(&self) -> &'static [&'static str] {
        Constraint::config_names(self.kind())
    }

    /// Raw value of a parameter.
    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.params.raw(name)
    }

    /// Change one parameter.
    ///
    /// The typed configuration is rebuilt from the edited parameters; if any
    /// invariant fails the edit is refused and the instance is unchanged.
    pub fn set_param(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        if !self.config_names().contains(&name) {
            return Err(IssuanceError::config(format!(
                "constraint '{}' has no parameter {}",
                self.name, name
            )));
        }

        let mut params = self.params.clone();
        params.set(name, value);
        let constraint = Constraint::build(self.kind(), &params)
            .map_err(|e| with_constraint_name(&self.name, e))?;

        debug!(constraint = %self.name, param = name, "Updated constraint parameter");
        self.params = params;
        self.constraint = constraint;
        Ok(())
    }

    /// Applicability against a default-generation policy.
    pub fn is_applicable(&self, default: DefaultPolicyKind) -> bool {
        is_applicable(self.kind(), default)
    }

    /// Human-readable description; English for every locale.
    pub fn describe(&self, _locale: &str) -> String {
        self.constraint.describe()
    }

    /// Check the template.
    pub fn validate(&self, ctx: &ValidationContext<'_>) -> Result<()> {
        self.constraint.validate(ctx)
    }
}

fn with_constraint_name(name: &str, err: IssuanceError) -> IssuanceError {
    match err {
        IssuanceError::Config(msg) => {
            IssuanceError::config(format!("constraint '{}': {}", name, msg))
        }
        other => other,
    }
}

/// Render an optional configured value for descriptions.
pub(crate) fn describe_opt<T: fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}
