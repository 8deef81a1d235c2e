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

//! Public key type and size constraint.
//!
//! `keyType` is `RSA`, `EC` or `Ed25519`. `keyParameters` lists RSA modulus
//! sizes in bits and/or curve names (`nistp256`, `nistp384`, `nistp521`,
//! `ed25519`).

use std::fmt;

use const_oid::ObjectIdentifier;
use der::asn1::Uint;
use der::{Decode, Sequence};
use spki::SubjectPublicKeyInfoOwned;

use super::{describe_opt, ConstraintParams, PolicyConstraint, ValidationContext};
use crate::decode::signature::ec_curve;
use crate::error::{IssuanceError, Result};
use crate::oids;

/// PKCS#1 RSA public key.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct RsaPublicKey {
    modulus: Uint,
    public_exponent: Uint,
}

/// Key algorithm families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// RSA.
    Rsa,
    /// Elliptic curve (ECDSA).
    Ec,
    /// Ed25519.
    Ed25519,
}

impl KeyType {
    fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "rsa" => Ok(Self::Rsa),
            "ec" => Ok(Self::Ec),
            "ed25519" => Ok(Self::Ed25519),
            _ => Err(IssuanceError::config(format!("unknown keyType '{}'", value))),
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rsa => "RSA",
            Self::Ec => "EC",
            Self::Ed25519 => "Ed25519",
        };
        write!(f, "{}", name)
    }
}

const CURVES: [(&str, ObjectIdentifier); 3] = [
    ("nistp256", oids::SECP256R1),
    ("nistp384", oids::SECP384R1),
    ("nistp521", oids::SECP521R1),
];

/// Type and parameter of a template key, e.g. `(Rsa, "2048")`.
pub fn key_profile(spki: &SubjectPublicKeyInfoOwned) -> Result<(KeyType, String)> {
    let alg = spki.algorithm.oid;
    if alg == oids::RSA_ENCRYPTION {
        let key = RsaPublicKey::from_der(spki.subject_public_key.raw_bytes())
            .map_err(|e| IssuanceError::KeyNotAllowed(format!("invalid RSA key: {}", e)))?;
        return Ok((KeyType::Rsa, rsa_bits(&key.modulus).to_string()));
    }
    if alg == oids::EC_PUBLIC_KEY {
        let curve = ec_curve(spki)
            .ok_or_else(|| IssuanceError::KeyNotAllowed("EC key without curve".to_string()))?;
        let name = CURVES
            .iter()
            .find(|(_, oid)| *oid == curve)
            .map_or_else(|| curve.to_string(), |(name, _)| name.to_string());
        return Ok((KeyType::Ec, name));
    }
    if alg == oids::ED25519 {
        return Ok((KeyType::Ed25519, "ed25519".to_string()));
    }
    Err(IssuanceError::KeyNotAllowed(format!(
        "unsupported key algorithm {}",
        alg
    )))
}

fn rsa_bits(modulus: &Uint) -> usize {
    let bytes = modulus.as_bytes();
    match bytes.first() {
        Some(first) => bytes.len() * 8 - first.leading_zeros() as usize,
        None => 0,
    }
}

fn check_parameter(entry: &str) -> Result<String> {
    let entry = entry.to_ascii_lowercase();
    let known = entry == "ed25519"
        || CURVES.iter().any(|(name, _)| *name == entry)
        || entry.parse::<u32>().is_ok();
    if known {
        Ok(entry)
    } else {
        Err(IssuanceError::config(format!(
            "unknown keyParameters entry '{}'",
            entry
        )))
    }
}

/// Key configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyConstraint {
    /// Required key family.
    pub key_type: Option<KeyType>,
    /// Allowed sizes or curves, lowercase.
    pub parameters: Option<Vec<String>>,
}

impl PolicyConstraint for KeyConstraint {
    const CONFIG_NAMES: &'static [&'static str] = &["keyType", "keyParameters"];

    fn from_params(params: &ConstraintParams) -> Result<Self> {
        Ok(Self {
            key_type: params.get("keyType").map(KeyType::parse).transpose()?,
            parameters: params
                .list("keyParameters")
                .map(|entries| entries.iter().map(|e| check_parameter(e)).collect())
                .transpose()?,
        })
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Result<()> {
        if self.key_type.is_none() && self.parameters.is_none() {
            return Ok(());
        }
        let (key_type, parameter) = key_profile(&ctx.template.public_key)?;

        if let Some(expected) = self.key_type {
            if key_type != expected {
                return Err(IssuanceError::KeyNotAllowed(format!(
                    "key type {} is not {}",
                    key_type, expected
                )));
            }
        }

        if let Some(allowed) = &self.parameters {
            if !allowed.contains(&parameter) {
                return Err(IssuanceError::KeyNotAllowed(format!(
                    "{} key parameter {} is not one of {}",
                    key_type,
                    parameter,
                    allowed.join(",")
                )));
            }
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "Key type {}, parameters {}",
            describe_opt(&self.key_type),
            describe_opt(&self.parameters.as_ref().map(|p| p.join(",")))
        )
    }
}
