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

//! Extended Key Usage allow-list constraint.

use const_oid::ObjectIdentifier;

use super::extension::require_extension;
use super::{describe_opt, ConstraintParams, PolicyConstraint, ValidationContext};
use crate::error::{IssuanceError, Result};
use crate::oids;
use crate::template::ExtensionPayload;

/// Extended Key Usage configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedKeyUsageConstraint {
    /// Required criticality.
    pub critical: Option<bool>,
    /// Permitted purposes; `None` permits any.
    pub allowed: Option<Vec<ObjectIdentifier>>,
}

impl PolicyConstraint for ExtendedKeyUsageConstraint {
    const CONFIG_NAMES: &'static [&'static str] = &["exKeyUsageCritical", "exKeyUsageOIDs"];

    fn from_params(params: &ConstraintParams) -> Result<Self> {
        Ok(Self {
            critical: params.bool("exKeyUsageCritical")?,
            allowed: params.oid_list("exKeyUsageOIDs")?,
        })
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Result<()> {
        let ext = require_extension(ctx.template, oids::EXTENDED_KEY_USAGE, self.critical)?;
        let ExtensionPayload::ExtendedKeyUsage(purposes) = &ext.payload else {
            return Err(IssuanceError::extension_decode(
                "Extended Key Usage payload is not decoded",
            ));
        };

        let Some(allowed) = &self.allowed else {
            return Ok(());
        };
        match purposes.iter().find(|oid| !allowed.contains(oid)) {
            Some(oid) => Err(IssuanceError::OidNotAllowed { oid: *oid }),
            None => Ok(()),
        }
    }

    fn describe(&self) -> String {
        let allowed = self.allowed.as_ref().map(|oids| {
            oids.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",")
        });
        format!(
            "Extended Key Usage: critical {}, allowed {}",
            describe_opt(&self.critical),
            describe_opt(&allowed)
        )
    }
}
