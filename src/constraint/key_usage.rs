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

//! Key Usage extension constraint.

use super::extension::require_extension;
use super::{describe_opt, ConstraintParams, PolicyConstraint, ValidationContext};
use crate::error::{IssuanceError, Result};
use crate::oids;
use crate::template::{BitArray, ExtensionPayload};

/// A named position in a bit-field extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    /// Bit name, as reported in rejections.
    pub name: &'static str,
    /// Configuration parameter holding the expected value.
    pub param: &'static str,
    /// Position in the BIT STRING.
    pub position: usize,
}

/// Key Usage bits (RFC 5280 section 4.2.1.3).
#[rustfmt::skip]
pub const KEY_USAGE_BITS: [BitField; 9] = [
    BitField { name: "digitalSignature", param: "keyUsageDigitalSignature", position: 0 },
    BitField { name: "nonRepudiation", param: "keyUsageNonRepudiation", position: 1 },
    BitField { name: "keyEncipherment", param: "keyUsageKeyEncipherment", position: 2 },
    BitField { name: "dataEncipherment", param: "keyUsageDataEncipherment", position: 3 },
    BitField { name: "keyAgreement", param: "keyUsageKeyAgreement", position: 4 },
    BitField { name: "keyCertSign", param: "keyUsageKeyCertSign", position: 5 },
    BitField { name: "cRLSign", param: "keyUsageCrlSign", position: 6 },
    BitField { name: "encipherOnly", param: "keyUsageEncipherOnly", position: 7 },
    BitField { name: "decipherOnly", param: "keyUsageDecipherOnly", position: 8 },
];

/// Read the expected value of every bit.
pub(crate) fn expected_bits(
    params: &ConstraintParams,
    fields: &[BitField],
) -> Result<Vec<Option<bool>>> {
    fields.iter().map(|f| params.bool(f.param)).collect()
}

/// Compare configured bits with `actual`; the first mismatch is reported.
pub(crate) fn check_bits(
    extension: &'static str,
    fields: &[BitField],
    expected: &[Option<bool>],
    actual: &BitArray,
) -> Result<()> {
    for (field, expected) in fields.iter().zip(expected) {
        let Some(expected) = *expected else { continue };
        if actual.get(field.position) != expected {
            return Err(IssuanceError::BitMismatch {
                extension,
                bit: field.name,
                expected,
            });
        }
    }
    Ok(())
}

pub(crate) fn describe_bits(fields: &[BitField], expected: &[Option<bool>]) -> String {
    fields
        .iter()
        .zip(expected)
        .map(|(f, e)| format!("{}={}", f.name, describe_opt(e)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Key Usage configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyUsageConstraint {
    /// Required criticality.
    pub critical: Option<bool>,
    /// Expected value per bit, indexed like [`KEY_USAGE_BITS`].
    pub bits: Vec<Option<bool>>,
}

impl PolicyConstraint for KeyUsageConstraint {
    const CONFIG_NAMES: &'static [&'static str] = &[
        "keyUsageCritical",
        "keyUsageDigitalSignature",
        "keyUsageNonRepudiation",
        "keyUsageKeyEncipherment",
        "keyUsageDataEncipherment",
        "keyUsageKeyAgreement",
        "keyUsageKeyCertSign",
        "keyUsageCrlSign",
        "keyUsageEncipherOnly",
        "keyUsageDecipherOnly",
    ];

    fn from_params(params: &ConstraintParams) -> Result<Self> {
        Ok(Self {
            critical: params.bool("keyUsageCritical")?,
            bits: expected_bits(params, &KEY_USAGE_BITS)?,
        })
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Result<()> {
        let ext = require_extension(ctx.template, oids::KEY_USAGE, self.critical)?;
        let ExtensionPayload::KeyUsage(actual) = &ext.payload else {
            return Err(IssuanceError::extension_decode(
                "Key Usage payload is not decoded",
            ));
        };
        check_bits("Key Usage", &KEY_USAGE_BITS, &self.bits, actual)
    }

    fn describe(&self) -> String {
        format!(
            "Key Usage: critical {}, {}",
            describe_opt(&self.critical),
            describe_bits(&KEY_USAGE_BITS, &self.bits)
        )
    }
}
