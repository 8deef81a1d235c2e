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

//! Netscape certificate type extension constraint.

use super::extension::require_extension;
use super::key_usage::{check_bits, describe_bits, expected_bits, BitField};
use super::{describe_opt, ConstraintParams, PolicyConstraint, ValidationContext};
use crate::error::{IssuanceError, Result};
use crate::oids;
use crate::template::ExtensionPayload;

/// Netscape certificate type bits; position 4 is reserved.
#[rustfmt::skip]
pub const NS_CERT_TYPE_BITS: [BitField; 7] = [
    BitField { name: "sslClient", param: "nsCertSSLClient", position: 0 },
    BitField { name: "sslServer", param: "nsCertSSLServer", position: 1 },
    BitField { name: "email", param: "nsCertEmail", position: 2 },
    BitField { name: "objectSigning", param: "nsCertObjectSigning", position: 3 },
    BitField { name: "sslCA", param: "nsCertSSLCA", position: 5 },
    BitField { name: "emailCA", param: "nsCertEmailCA", position: 6 },
    BitField { name: "objectSigningCA", param: "nsCertObjectSigningCA", position: 7 },
];

/// Netscape certificate type configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsCertTypeConstraint {
    /// Required criticality.
    pub critical: Option<bool>,
    /// Expected value per bit, indexed like [`NS_CERT_TYPE_BITS`].
    pub bits: Vec<Option<bool>>,
}

impl PolicyConstraint for NsCertTypeConstraint {
    const CONFIG_NAMES: &'static [&'static str] = &[
        "nsCertCritical",
        "nsCertSSLClient",
        "nsCertSSLServer",
        "nsCertEmail",
        "nsCertObjectSigning",
        "nsCertSSLCA",
        "nsCertEmailCA",
        "nsCertObjectSigningCA",
    ];

    fn from_params(params: &ConstraintParams) -> Result<Self> {
        Ok(Self {
            critical: params.bool("nsCertCritical")?,
            bits: expected_bits(params, &NS_CERT_TYPE_BITS)?,
        })
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Result<()> {
        let ext = require_extension(ctx.template, oids::NS_CERT_TYPE, self.critical)?;
        let ExtensionPayload::NsCertType(actual) = &ext.payload else {
            return Err(IssuanceError::extension_decode(
                "Netscape certificate type payload is not decoded",
            ));
        };
        check_bits("Netscape Certificate Type", &NS_CERT_TYPE_BITS, &self.bits, actual)
    }

    fn describe(&self) -> String {
        format!(
            "Netscape Certificate Type: critical {}, {}",
            describe_opt(&self.critical),
            describe_bits(&NS_CERT_TYPE_BITS, &self.bits)
        )
    }
}
