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

//! Verification of request self-signatures and signature proofs of possession.
//!
//! Supported combinations:
//!
//! | Signature algorithm | Key |
//! |---------------------|-----|
//! | sha1/sha256/sha384/sha512WithRSAEncryption | RSA |
//! | ecdsa-with-SHA256 / SHA384 | P-256, P-384 |
//! | Ed25519 | Ed25519 |

use const_oid::ObjectIdentifier;
use der::asn1::BitString;
use der::{Decode, Encode};
use ring::signature::{self, UnparsedPublicKey, VerificationAlgorithm};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::error::{IssuanceError, Result};
use crate::oids;

/// Named curve of an EC public key, from its algorithm parameters.
pub fn ec_curve(spki: &SubjectPublicKeyInfoOwned) -> Option<ObjectIdentifier> {
    let params = spki.algorithm.parameters.as_ref()?;
    let der = params.to_der().ok()?;
    ObjectIdentifier::from_der(&der).ok()
}

fn select_algorithm(
    algorithm: &ObjectIdentifier,
    spki: &SubjectPublicKeyInfoOwned,
) -> Result<&'static dyn VerificationAlgorithm> {
    let key_alg = spki.algorithm.oid;
    let unsupported = || {
        IssuanceError::SignatureInvalid(format!(
            "unsupported signature algorithm {} for key type {}",
            algorithm, key_alg
        ))
    };

    if key_alg == oids::RSA_ENCRYPTION {
        return match *algorithm {
            a if a == oids::SHA1_WITH_RSA => {
                Ok(&signature::RSA_PKCS1_1024_8192_SHA1_FOR_LEGACY_USE_ONLY)
            }
            a if a == oids::SHA256_WITH_RSA => Ok(&signature::RSA_PKCS1_2048_8192_SHA256),
            a if a == oids::SHA384_WITH_RSA => Ok(&signature::RSA_PKCS1_2048_8192_SHA384),
            a if a == oids::SHA512_WITH_RSA => Ok(&signature::RSA_PKCS1_2048_8192_SHA512),
            _ => Err(unsupported()),
        };
    }

    if key_alg == oids::EC_PUBLIC_KEY {
        let curve = ec_curve(spki).ok_or_else(unsupported)?;
        let p256 = curve == oids::SECP256R1;
        let p384 = curve == oids::SECP384R1;
        return match *algorithm {
            a if a == oids::ECDSA_WITH_SHA256 && p256 => Ok(&signature::ECDSA_P256_SHA256_ASN1),
            a if a == oids::ECDSA_WITH_SHA384 && p256 => Ok(&signature::ECDSA_P256_SHA384_ASN1),
            a if a == oids::ECDSA_WITH_SHA256 && p384 => Ok(&signature::ECDSA_P384_SHA256_ASN1),
            a if a == oids::ECDSA_WITH_SHA384 && p384 => Ok(&signature::ECDSA_P384_SHA384_ASN1),
            _ => Err(unsupported()),
        };
    }

    if key_alg == oids::ED25519 && *algorithm == oids::ED25519 {
        return Ok(&signature::ED25519);
    }

    Err(unsupported())
}

/// Verify `sig` over `message` with the subject public key `spki`.
///
/// Fails with [`IssuanceError::SignatureInvalid`].
pub fn verify(
    spki: &SubjectPublicKeyInfoOwned,
    algorithm: &AlgorithmIdentifierOwned,
    message: &[u8],
    sig: &BitString,
) -> Result<()> {
    let verifier = select_algorithm(&algorithm.oid, spki)?;

    let key = spki
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| IssuanceError::SignatureInvalid("public key has unused bits".into()))?;
    let sig = sig
        .as_bytes()
        .ok_or_else(|| IssuanceError::SignatureInvalid("signature has unused bits".into()))?;

    UnparsedPublicKey::new(verifier, key)
        .verify(message, sig)
        .map_err(|_| IssuanceError::SignatureInvalid("signature does not verify".into()))
}
