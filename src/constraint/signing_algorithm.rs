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

//! Signing algorithm allow-list constraint.
//!
//! `signingAlgsAllowed` is a comma-separated list of algorithm names
//! (matched case-insensitively) or dotted OIDs. When unset, every known
//! signing algorithm is allowed.

use std::str::FromStr;
use std::sync::OnceLock;

use const_oid::ObjectIdentifier;

use super::{ConstraintParams, PolicyConstraint, ValidationContext};
use crate::error::{IssuanceError, Result};
use crate::oids;

/// Known signing algorithms.
pub const SIGNING_ALGORITHMS: [(&str, ObjectIdentifier); 11] = [
    ("MD5withRSA", oids::MD5_WITH_RSA),
    ("SHA1withRSA", oids::SHA1_WITH_RSA),
    ("SHA256withRSA", oids::SHA256_WITH_RSA),
    ("SHA384withRSA", oids::SHA384_WITH_RSA),
    ("SHA512withRSA", oids::SHA512_WITH_RSA),
    ("RSASSA-PSS", oids::RSASSA_PSS),
    ("SHA1withEC", oids::ECDSA_WITH_SHA1),
    ("SHA256withEC", oids::ECDSA_WITH_SHA256),
    ("SHA384withEC", oids::ECDSA_WITH_SHA384),
    ("SHA512withEC", oids::ECDSA_WITH_SHA512),
    ("Ed25519", oids::ED25519),
];

/// Default allow-list: every known signing algorithm.
pub fn default_allowed() -> &'static [ObjectIdentifier] {
    static DEFAULT: OnceLock<Vec<ObjectIdentifier>> = OnceLock::new();
    DEFAULT.get_or_init(|| SIGNING_ALGORITHMS.iter().map(|(_, oid)| *oid).collect())
}

/// Name of a known algorithm.
pub fn algorithm_name(oid: &ObjectIdentifier) -> Option<&'static str> {
    SIGNING_ALGORITHMS
        .iter()
        .find(|(_, known)| known == oid)
        .map(|(name, _)| *name)
}

fn resolve(entry: &str) -> Result<ObjectIdentifier> {
    if let Some((_, oid)) = SIGNING_ALGORITHMS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(entry))
    {
        return Ok(*oid);
    }
    ObjectIdentifier::from_str(entry).map_err(|_| {
        IssuanceError::config(format!("unknown signing algorithm '{}'", entry))
    })
}

/// Signing algorithm configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningAlgorithmConstraint {
    /// Explicit allow-list; `None` uses [`default_allowed`].
    pub allowed: Option<Vec<ObjectIdentifier>>,
}

impl SigningAlgorithmConstraint {
    fn allowed(&self) -> &[ObjectIdentifier] {
        self.allowed.as_deref().unwrap_or_else(|| default_allowed())
    }
}

impl PolicyConstraint for SigningAlgorithmConstraint {
    const CONFIG_NAMES: &'static [&'static str] = &["signingAlgsAllowed"];

    fn from_params(params: &ConstraintParams) -> Result<Self> {
        let allowed = params
            .list("signingAlgsAllowed")
            .map(|entries| entries.iter().map(|e| resolve(e)).collect::<Result<Vec<_>>>())
            .transpose()?;
        Ok(Self { allowed })
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Result<()> {
        let alg = ctx
            .template
            .signature_algorithm
            .as_ref()
            .ok_or_else(|| IssuanceError::AlgorithmNotFound("no signing algorithm set".into()))?;

        if self.allowed().contains(&alg.oid) {
            return Ok(());
        }

        let algorithm =
            algorithm_name(&alg.oid).map_or_else(|| alg.oid.to_string(), String::from);
        Err(IssuanceError::AlgorithmNotAllowed { algorithm })
    }

    fn describe(&self) -> String {
        let names: Vec<String> = self
            .allowed()
            .iter()
            .map(|oid| algorithm_name(oid).map_or_else(|| oid.to_string(), String::from))
            .collect();
        format!("Signing algorithm must be one of: {}", names.join(","))
    }
}
