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

//! Object identifiers used during request decoding and policy enforcement.

use const_oid::ObjectIdentifier;

// ============================================================================
// Certificate extensions
// ============================================================================

/// id-ce-keyUsage (2.5.29.15)
pub const KEY_USAGE: ObjectIdentifier = const_oid::db::rfc5280::ID_CE_KEY_USAGE;

/// id-ce-basicConstraints (2.5.29.19)
pub const BASIC_CONSTRAINTS: ObjectIdentifier = const_oid::db::rfc5280::ID_CE_BASIC_CONSTRAINTS;

/// id-ce-extKeyUsage (2.5.29.37)
pub const EXTENDED_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.37");

/// id-ce-subjectAltName (2.5.29.17)
pub const SUBJECT_ALT_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.17");

/// netscape-cert-type (2.16.840.1.113730.1.1)
pub const NS_CERT_TYPE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.113730.1.1");

// ============================================================================
// PKCS#10 attributes
// ============================================================================

/// PKCS#9 extensionRequest (1.2.840.113549.1.9.14)
pub const EXTENSION_REQUEST: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.14");

/// Microsoft certificate extensions attribute (1.3.6.1.4.1.311.2.1.14)
pub const MS_CERT_EXTENSIONS: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.14");

// ============================================================================
// Name attributes
// ============================================================================

/// commonName (2.5.4.3)
pub const CN: ObjectIdentifier = const_oid::db::rfc4519::CN;

/// countryName (2.5.4.6)
pub const C: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");

/// localityName (2.5.4.7)
pub const L: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");

/// stateOrProvinceName (2.5.4.8)
pub const ST: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");

/// organizationName (2.5.4.10)
pub const O: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");

/// organizationalUnitName (2.5.4.11)
pub const OU: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");

/// emailAddress (1.2.840.113549.1.9.1)
pub const EMAIL: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.1");

/// userId (0.9.2342.19200300.100.1.1)
pub const UID: ObjectIdentifier = ObjectIdentifier::new_unwrap("0.9.2342.19200300.100.1.1");

// ============================================================================
// Public key algorithms and curves
// ============================================================================

/// rsaEncryption (1.2.840.113549.1.1.1)
pub const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

/// id-ecPublicKey (1.2.840.10045.2.1)
pub const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

/// id-Ed25519 (1.3.101.112)
pub const ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");

/// secp256r1 / NIST P-256 (1.2.840.10045.3.1.7)
pub const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");

/// secp384r1 / NIST P-384 (1.3.132.0.34)
pub const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

/// secp521r1 / NIST P-521 (1.3.132.0.35)
pub const SECP521R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");

// ============================================================================
// Signature algorithms
// ============================================================================

/// md5WithRSAEncryption (1.2.840.113549.1.1.4)
pub const MD5_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.4");

/// sha1WithRSAEncryption (1.2.840.113549.1.1.5)
pub const SHA1_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");

/// RSASSA-PSS (1.2.840.113549.1.1.10)
pub const RSASSA_PSS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.10");

/// sha256WithRSAEncryption (1.2.840.113549.1.1.11)
pub const SHA256_WITH_RSA: ObjectIdentifier = const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION;

/// sha384WithRSAEncryption (1.2.840.113549.1.1.12)
pub const SHA384_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");

/// sha512WithRSAEncryption (1.2.840.113549.1.1.13)
pub const SHA512_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");

/// ecdsa-with-SHA1 (1.2.840.10045.4.1)
pub const ECDSA_WITH_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.1");

/// ecdsa-with-SHA256 (1.2.840.10045.4.3.2)
pub const ECDSA_WITH_SHA256: ObjectIdentifier = const_oid::db::rfc5912::ECDSA_WITH_SHA_256;

/// ecdsa-with-SHA384 (1.2.840.10045.4.3.3)
pub const ECDSA_WITH_SHA384: ObjectIdentifier = const_oid::db::rfc5912::ECDSA_WITH_SHA_384;

/// ecdsa-with-SHA512 (1.2.840.10045.4.3.4)
pub const ECDSA_WITH_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");
