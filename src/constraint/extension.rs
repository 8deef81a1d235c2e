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

//! Presence and criticality of an arbitrary extension.

use const_oid::ObjectIdentifier;

use super::{describe_opt, ConstraintParams, PolicyConstraint, ValidationContext};
use crate::error::{IssuanceError, Result};
use crate::template::{CertificateTemplate, TemplateExtension};

/// Locate `oid` in the template and check its criticality.
///
/// Shared by every extension constraint.
pub(crate) fn require_extension<'t>(
    template: &'t CertificateTemplate,
    oid: ObjectIdentifier,
    critical: Option<bool>,
) -> Result<&'t TemplateExtension> {
    let ext = template
        .extensions
        .get(&oid)
        .ok_or(IssuanceError::ExtensionNotFound { oid })?;

    if let Some(expected) = critical {
        if ext.critical != expected {
            return Err(IssuanceError::CriticalityMismatch { oid, expected });
        }
    }

    Ok(ext)
}

/// Generic extension constraint (`extOID`, `extCritical`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionConstraint {
    /// Required extension.
    pub oid: ObjectIdentifier,
    /// Required criticality, if any.
    pub critical: Option<bool>,
}

impl PolicyConstraint for ExtensionConstraint {
    const CONFIG_NAMES: &'static [&'static str] = &["extCritical", "extOID"];

    fn from_params(params: &ConstraintParams) -> Result<Self> {
        let oid = params
            .oid("extOID")?
            .ok_or_else(|| IssuanceError::config("extOID is required"))?;
        Ok(Self {
            oid,
            critical: params.bool("extCritical")?,
        })
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Result<()> {
        require_extension(ctx.template, self.oid, self.critical).map(|_| ())
    }

    fn describe(&self) -> String {
        format!(
            "Extension {} must be present; critical: {}",
            self.oid,
            describe_opt(&self.critical)
        )
    }
}
