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

//! Basic Constraints extension constraint.
//!
//! Path length bounds:
//!
//! - a negative or unset bound is not checked;
//! - an absent `pathLenConstraint` on a CA means unlimited, which satisfies
//!   any minimum and exceeds any maximum;
//! - an end-entity without `pathLenConstraint` is not subject to the bounds.
//!
//! `basicConstraintsMinPathLen <= basicConstraintsMaxPathLen` is enforced
//! whenever the configuration is built or edited.

use super::extension::require_extension;
use super::{describe_opt, ConstraintParams, PolicyConstraint, ValidationContext};
use crate::error::{IssuanceError, Result};
use crate::oids;
use crate::template::ExtensionPayload;

/// Basic Constraints configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasicConstraintsConstraint {
    /// Required criticality.
    pub critical: Option<bool>,
    /// Required cA flag.
    pub is_ca: Option<bool>,
    /// Minimum path length.
    pub min_path_len: Option<i64>,
    /// Maximum path length.
    pub max_path_len: Option<i64>,
}

impl PolicyConstraint for BasicConstraintsConstraint {
    const CONFIG_NAMES: &'static [&'static str] = &[
        "basicConstraintsCritical",
        "basicConstraintsIsCA",
        "basicConstraintsMinPathLen",
        "basicConstraintsMaxPathLen",
    ];

    fn from_params(params: &ConstraintParams) -> Result<Self> {
        let bound = |name| -> Result<Option<i64>> { Ok(params.int(name)?.filter(|v| *v >= 0)) };

        let constraint = Self {
            critical: params.bool("basicConstraintsCritical")?,
            is_ca: params.bool("basicConstraintsIsCA")?,
            min_path_len: bound("basicConstraintsMinPathLen")?,
            max_path_len: bound("basicConstraintsMaxPathLen")?,
        };

        if let (Some(min), Some(max)) = (constraint.min_path_len, constraint.max_path_len) {
            if min > max {
                return Err(IssuanceError::config(format!(
                    "basicConstraintsMinPathLen ({}) exceeds basicConstraintsMaxPathLen ({})",
                    min, max
                )));
            }
        }

        Ok(constraint)
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Result<()> {
        let ext = require_extension(ctx.template, oids::BASIC_CONSTRAINTS, self.critical)?;
        let ExtensionPayload::BasicConstraints { ca, path_len } = ext.payload else {
            return Err(IssuanceError::extension_decode(
                "Basic Constraints payload is not decoded",
            ));
        };

        if let Some(expected) = self.is_ca {
            if ca != expected {
                return Err(IssuanceError::CaFlagMismatch { expected });
            }
        }

        if path_len.is_none() && !ca {
            return Ok(());
        }

        let actual = path_len.map(i64::from);
        let shown = || actual.map_or_else(|| "unlimited".to_string(), |v| v.to_string());

        if let (Some(minimum), Some(value)) = (self.min_path_len, actual) {
            if value < minimum {
                return Err(IssuanceError::PathLengthBelowMinimum {
                    actual: shown(),
                    minimum,
                });
            }
        }

        if let Some(maximum) = self.max_path_len {
            if actual.map_or(true, |value| value > maximum) {
                return Err(IssuanceError::PathLengthAboveMaximum {
                    actual: shown(),
                    maximum,
                });
            }
        }

        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "Basic Constraints: critical {}, cA {}, path length between {} and {}",
            describe_opt(&self.critical),
            describe_opt(&self.is_ca),
            describe_opt(&self.min_path_len),
            describe_opt(&self.max_path_len)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::test_support::template_with;
    use crate::template::CertificateTemplate;

    fn ca_template(path_len: Option<u8>) -> CertificateTemplate {
        template_with(
            oids::BASIC_CONSTRAINTS,
            true,
            ExtensionPayload::BasicConstraints { ca: true, path_len },
        )
    }

    fn bounds(min: &str, max: &str) -> BasicConstraintsConstraint {
        BasicConstraintsConstraint::from_params(
            &ConstraintParams::new()
                .with("basicConstraintsMinPathLen", min)
                .with("basicConstraintsMaxPathLen", max),
        )
        .unwrap()
    }

    #[test]
    fn test_path_length_bounds() {
        let c = bounds("2", "5");
        let check = |len| c.validate(&ValidationContext::new(&ca_template(Some(len))));

        assert!(matches!(
            check(1),
            Err(IssuanceError::PathLengthBelowMinimum { minimum: 2, .. })
        ));
        assert!(check(2).is_ok());
        assert!(check(3).is_ok());
        assert!(check(5).is_ok());
        assert!(matches!(
            check(6),
            Err(IssuanceError::PathLengthAboveMaximum { maximum: 5, .. })
        ));
    }

    #[test]
    fn test_unlimited_path_length() {
        let template = ca_template(None);
        let ctx = ValidationContext::new(&template);

        assert!(bounds("3", "-1").validate(&ctx).is_ok());
        let err = bounds("-", "4").validate(&ctx).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Basic constraints path length unlimited exceeds maximum 4"
        );
    }

    #[test]
    fn test_end_entity_without_path_length() {
        let template = template_with(
            oids::BASIC_CONSTRAINTS,
            false,
            ExtensionPayload::BasicConstraints {
                ca: false,
                path_len: None,
            },
        );
        assert!(bounds("1", "2")
            .validate(&ValidationContext::new(&template))
            .is_ok());
    }

    #[test]
    fn test_ca_flag_and_criticality() {
        let template = ca_template(Some(0));
        let ctx = ValidationContext::new(&template);

        let c = BasicConstraintsConstraint::from_params(
            &ConstraintParams::new().with("basicConstraintsIsCA", "false"),
        )
        .unwrap();
        assert!(matches!(
            c.validate(&ctx),
            Err(IssuanceError::CaFlagMismatch { expected: false })
        ));

        let c = BasicConstraintsConstraint::from_params(
            &ConstraintParams::new().with("basicConstraintsCritical", "false"),
        )
        .unwrap();
        assert!(matches!(
            c.validate(&ctx),
            Err(IssuanceError::CriticalityMismatch { .. })
        ));
    }

    #[test]
    fn test_min_greater_than_max_rejected() {
        let result = BasicConstraintsConstraint::from_params(
            &ConstraintParams::new()
                .with("basicConstraintsMinPathLen", "4")
                .with("basicConstraintsMaxPathLen", "3"),
        );
        assert!(matches!(result, Err(IssuanceError::Config(_))));
    }
}
